use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = perk_client::cli::run_from_env().await {
        error!(kind = ?err.kind, "command failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    Ok(())
}
