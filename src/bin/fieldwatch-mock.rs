use clap::Parser;
use fieldwatch::logging::{init_tracing, LogOptions};
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "fieldwatch-mock", about = "Mock field backend for local runs")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(LogOptions {
        json: cli.log_json,
        ..LogOptions::default()
    })?;
    fieldwatch::mock::serve(cli.bind).await
}
