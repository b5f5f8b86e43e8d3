use clap::Parser;
use uniclipboard_share_lib::bootstrap;
use uniclipboard_share_lib::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(err) = bootstrap::tracing::init_tracing_subscriber() {
        eprintln!("Failed to initialize tracing: {err:#}");
    }

    bootstrap::run(cli).await
}
