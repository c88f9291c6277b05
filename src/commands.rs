use std::path::PathBuf;

use anyhow::{Context, Result};
use lora_packet::{message, peer, MessagePacket, PeerNode};
use serde_json::json;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, select, signal::ctrl_c};

use crate::{
    args::{Cmd, EncodeArgs, RunArgs},
    config,
    consumer::{api::ApiConsumer, jsonl::JsonLinesConsumer, RecordConsumer},
    ingest::Ingestor,
    source,
};

pub async fn delegate(cmd: Cmd) -> Result<()> {
    match cmd {
        Cmd::Run { args } => run(args).await,
        Cmd::Decode { file, addressed } => decode(file, addressed).await,
        Cmd::Encode { args } => encode(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    info!("Reading configuration from {:?}", args.config);
    if !args.config.exists() {
        error!("Configuration file does not exist!");
        bail!("Configuration file does not exist!");
    }
    let mut cfg = config::open(args.config).await?;
    if let Some(file) = args.file {
        cfg.source.file = file;
    }
    cfg.source.from_start |= args.from_start;

    if !cfg.source.file.exists() {
        bail!("ingest file {:?} does not exist", cfg.source.file);
    }
    info!(
        "Ingesting from {:?} ({:?}) as node {}",
        cfg.source.file, cfg.source.format, cfg.node
    );

    let mut consumers: Vec<Box<dyn RecordConsumer>> = vec![];
    if let Some(api_cfg) = &cfg.api {
        info!("Posting node state to {}", api_cfg.endpoint);
        let api = ApiConsumer::connect(api_cfg).await?;
        api.ping().await.context("failed to ping api server")?;
        api.post_node()
            .await
            .context("failed to create new node entry in api server")?;
        consumers.push(Box::new(api));
    }
    if let Some(path) = &cfg.output.path {
        info!("Writing node state to {path:?}");
        consumers.push(Box::new(JsonLinesConsumer::open(path).await?));
    }
    if consumers.is_empty() {
        warn!("No api or output configured, records will only be logged");
    }

    let (tx, rx) = flume::bounded(64);
    let follower = tokio::spawn(source::follow(
        cfg.source.clone(),
        cfg.ingest.max_buffer,
        tx,
    ));
    let mut ingestor = Ingestor::new(
        cfg.node,
        cfg.source.file.clone(),
        cfg.ingest.max_errors,
        consumers,
    );

    let result = select! {
        res = ingestor.run(rx) => res,
        res = ctrl_c() => {
            if res.is_err() {
                error!("Failed to listen for ctrl_c signal - shutting down");
            }
            info!("shutdown triggered");
            Ok(())
        }
    };
    if let Err(e) = &result {
        error!("Ingestor exited with error: {e:?}");
    }

    follower.abort();
    ingestor.close().await;
    result
}

/// prints every record in `file` as a json line.
///
/// json has no NaN or infinity, serde_json writes those readings as `null`.
/// such records are still printed, with a warning.
async fn decode(file: PathBuf, addressed: bool) -> Result<()> {
    let bytes = tokio::fs::read(&file).await?;
    let stride = if addressed {
        peer::SIZE + message::SIZE
    } else {
        message::SIZE
    };

    let mut records = bytes.chunks_exact(stride);
    let mut count = 0usize;
    for raw in &mut records {
        let (to, packet) = if addressed {
            (
                Some(PeerNode::read_from_prefix(raw)?),
                MessagePacket::read_from_prefix(&raw[peer::SIZE..])?,
            )
        } else {
            (None, MessagePacket::read_from_prefix(raw)?)
        };
        if !packet.is_finite() {
            warn!("record {count} holds NaN or infinite readings, printed as null");
        }
        let line = match to {
            Some(to) => json!({ "to": to, "packet": packet }),
            None => serde_json::to_value(packet)?,
        };
        println!("{line}");
        count += 1;
    }

    let rest = records.remainder().len();
    if rest != 0 {
        warn!("{rest} trailing byte(s) in {file:?} do not make up a complete record");
    }
    info!("Decoded {count} record(s) from {file:?}");
    Ok(())
}

async fn encode(args: EncodeArgs) -> Result<()> {
    let packet = MessagePacket::new(
        args.pressure,
        args.temperature,
        args.altitude,
        args.current_ma,
        args.load_voltage,
        args.power_mw,
    );

    let mut buf = vec![];
    if args.text {
        buf.extend_from_slice(packet.to_string().as_bytes());
    } else {
        if let Some(to) = args.to {
            buf.extend_from_slice(&to.to_bytes());
        }
        buf.extend_from_slice(&packet.to_bytes());
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.out)
        .await?;
    file.write_all(&buf).await?;
    file.flush().await?;

    match args.to {
        Some(to) => info!("Wrote {} bytes for {to} to {:?}", buf.len(), args.out),
        None => info!("Wrote {} bytes to {:?}", buf.len(), args.out),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    fn args(out: PathBuf, to: Option<PeerNode>, text: bool) -> EncodeArgs {
        EncodeArgs {
            out,
            pressure: 1013.25,
            temperature: 22.5,
            altitude: 120.0,
            current_ma: 150.0,
            load_voltage: 3.7,
            power_mw: 555.0,
            to,
            text,
        }
    }

    #[tokio::test]
    async fn encode_then_decode() {
        let out = std::env::temp_dir().join(format!("lora-ingest-{}-encode.bin", std::process::id()));
        let _ = tokio::fs::remove_file(&out).await;
        let to = PeerNode::new(0x01, 0x02, 0x17);

        encode(args(out.clone(), Some(to), false)).await.unwrap();
        encode(args(out.clone(), Some(to), false)).await.unwrap();

        let bytes = tokio::fs::read(&out).await.unwrap();
        assert_eq!(bytes.len(), 2 * (peer::SIZE + message::SIZE));
        assert_eq!(&bytes[..3], &[0x01, 0x02, 0x17]);
        let raw = <&[u8; message::SIZE]>::try_from(&bytes[3..27]).unwrap();
        assert_eq!(
            MessagePacket::from_bytes(raw),
            MessagePacket::new(1013.25, 22.5, 120.0, 150.0, 3.7, 555.0)
        );

        decode(out.clone(), true).await.unwrap();
        tokio::fs::remove_file(&out).await.unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn decode_flags_non_finite() {
        let out = std::env::temp_dir().join(format!("lora-ingest-{}-nan.bin", std::process::id()));
        let msg = MessagePacket::new(f32::NAN, 22.5, 120.0, 150.0, 3.7, f32::NEG_INFINITY);
        tokio::fs::write(&out, msg.to_bytes()).await.unwrap();

        decode(out.clone(), false).await.unwrap();
        assert!(logs_contain("record 0 holds NaN or infinite readings"));
        tokio::fs::remove_file(&out).await.unwrap();
    }

    #[tokio::test]
    async fn encode_text() {
        let out = std::env::temp_dir().join(format!("lora-ingest-{}-encode.txt", std::process::id()));
        let _ = tokio::fs::remove_file(&out).await;

        encode(args(out.clone(), None, true)).await.unwrap();

        let text = tokio::fs::read_to_string(&out).await.unwrap();
        assert_eq!(
            crate::parse::parse_buffer(&text),
            Some(MessagePacket::new(1013.25, 22.5, 120.0, 150.0, 3.7, 555.0))
        );
        tokio::fs::remove_file(&out).await.unwrap();
    }
}
