use anyhow::{Context, Result};
use chitty::ChittyServer;
use chitty_cli::{cli::ServerArgs, logging::init_tracing};
use clap::Parser;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_tracing("info", args.log_file.as_deref())?;

    let bind_addr = args.bind_addr();
    let server = ChittyServer::builder()
        .name(&args.name)
        .bind(&bind_addr)
        .build()
        .await
        .with_context(|| format!("failed to listen on {bind_addr}"))?;

    let addr = server.local_addr()?;
    info!(name = %args.name, %addr, "listening");

    server
        .run_until(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(?error, "ctrl-c handler failed");
            }
        })
        .await?;

    Ok(())
}
