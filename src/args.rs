use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lora_packet::PeerNode;

#[derive(Parser, Debug)]
#[command(
    name = "lora-ingest",
    about = "Ingests records received by the lora receiver node, handing them off as node state"
)]
pub struct ArgsParser {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// follow the receiver's output and ingest every record
    Run {
        #[command(flatten)]
        args: RunArgs,
    },
    /// print the records of a binary capture as json, one per line
    Decode {
        #[arg(help = "file of concatenated binary records")]
        file: PathBuf,
        #[arg(
            long,
            help = "every record is preceded by the 3 byte address it was sent to (fixed transmission)"
        )]
        addressed: bool,
    },
    /// append one record to a file, the way the transmitter sends it
    Encode {
        #[command(flatten)]
        args: EncodeArgs,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long, short, help = "config filepath")]
    pub config: PathBuf,
    #[arg(long, help = "file to ingest from (overrides `source.file` in the config)")]
    pub file: Option<PathBuf>,
    #[arg(long, help = "read the file from the beginning instead of only following new data")]
    pub from_start: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[arg(long, short, help = "file to append the record to")]
    pub out: PathBuf,
    #[arg(long, allow_negative_numbers = true)]
    pub pressure: f32,
    #[arg(long, allow_negative_numbers = true)]
    pub temperature: f32,
    #[arg(long, allow_negative_numbers = true)]
    pub altitude: f32,
    #[arg(long, allow_negative_numbers = true)]
    pub current_ma: f32,
    #[arg(long, allow_negative_numbers = true)]
    pub load_voltage: f32,
    #[arg(long, allow_negative_numbers = true)]
    pub power_mw: f32,
    #[arg(
        long,
        value_parser = parse_peer,
        conflicts_with = "text",
        help = "prefix the record with the target address `ADDH:ADDL@CHAN` (hex), as handed to the radio in fixed transmission mode"
    )]
    pub to: Option<PeerNode>,
    #[arg(long, help = "write the receiver's text form instead of the binary record")]
    pub text: bool,
}

/// parses `ADDH:ADDL@CHAN`, each part one hex byte (the `Display` form of `PeerNode`)
pub fn parse_peer(s: &str) -> Result<PeerNode, String> {
    let (addr, chan) = s
        .split_once('@')
        .ok_or_else(|| format!("expected ADDH:ADDL@CHAN, got `{s}`"))?;
    let (addh, addl) = addr
        .split_once(':')
        .ok_or_else(|| format!("expected ADDH:ADDL@CHAN, got `{s}`"))?;
    let byte = |part: &str| {
        let digits = part.strip_prefix("0x").unwrap_or(part);
        // from_str_radix would take a leading `+`
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("invalid byte `{part}`: not hex"));
        }
        u8::from_str_radix(digits, 16).map_err(|e| format!("invalid byte `{part}`: {e}"))
    };
    Ok(PeerNode::new(byte(addh)?, byte(addl)?, byte(chan)?))
}
