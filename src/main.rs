use clap::Parser;
use tracing_subscriber::EnvFilter;

use patrisim::api::{Cli, Command};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("PATRISIM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve { port } => {
            if let Err(e) = patrisim::api::run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Run(args) => {
            if let Err(e) = patrisim::api::run_cli(args) {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}
