#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate tracing;
#[macro_use]
extern crate anyhow;

use clap::Parser;
use tokio::runtime;

mod args;
mod commands;
mod config;
mod consumer;
mod ingest;
mod log;
mod parse;
mod source;
mod state;

use args::ArgsParser;

fn main() -> anyhow::Result<()> {
    let args = ArgsParser::parse();
    log::init_logging()?;

    debug!("Launching async runtime");
    let runtime = runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(commands::delegate(args.cmd))
}
