use anyhow::Result;
use chitty_cli::{cli::ClientArgs, client, logging::init_tracing};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ClientArgs::parse();
    // Chat goes to stdout, so keep the log quiet unless asked.
    init_tracing("warn", args.log_file.as_deref())?;

    client::run(args).await
}
