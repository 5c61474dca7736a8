use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mimic_server::config::ServerConfig;
use mimic_server::imposter::ImposterManager;

#[derive(Parser, Debug)]
#[command(name = "mimic-server")]
struct Args {
    /// Imposter definitions to bring up at boot (YAML or JSON).
    #[arg(short, long)]
    config: Option<String>,
    /// Allow stubs with injected response logic.
    #[arg(long)]
    allow_injection: bool,
    /// Record incoming requests on every imposter.
    #[arg(long)]
    record_requests: bool,
    /// Log filter, e.g. "info" or "mimic_server=debug".
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let manager = ImposterManager::new(args.allow_injection, args.record_requests);

    if let Some(ref path) = args.config {
        let config = ServerConfig::from_file(path)?;
        for imposter in config.imposters {
            match manager.create_imposter(imposter).await {
                Ok(handle) => info!(port = handle.port(), "imposter started"),
                Err(e) => error!(error = %e, "failed to start imposter"),
            }
        }
    }

    info!("mimic-server taking orders, ctrl-c to stop");
    tokio::signal::ctrl_c().await.ok();

    manager.delete_all();
    Ok(())
}
