use anyhow::Result;
use clap::Parser;
use creative_prompt_api::app::App;
use creative_prompt_api::models::Config;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "creative-prompt-api")]
#[command(about = "Serve the creative persona chat API")]
struct CliArgs {
    /// Address to bind, overrides HOST.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "creative_prompt_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let mut config = Config::from_env()?;
    if let Some(host) = args.host {
        config.app.host = host;
    }
    if let Some(port) = args.port {
        config.app.port = port;
    }

    info!("Starting {} v{}", config.app.name, config.app.version);

    match App::new(config) {
        Ok(app) => {
            if let Err(e) = app.serve().await {
                error!("Server error: {}", e);
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    }
}
