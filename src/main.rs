use clap::Parser;
use tracing::info;

use vigil::Server;
use vigil::service::{self, ServiceConfig};

#[derive(Debug, Parser)]
#[command(version, about = "HTTP service with structured request logging")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    vigil::telemetry::init()?;

    let config = ServiceConfig::from_env(args.port);
    info!(
        service.name = %config.name,
        service.environment = %config.environment,
        service.region = %config.region,
        service.port = config.port,
        "STARTING_SERVICE"
    );

    Server::bind(config.addr()).serve(service::router()).await?;
    Ok(())
}
