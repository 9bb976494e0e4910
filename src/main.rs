use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ygg_identity::{config::ServerConfig, context::AppContext, crypto, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ygg_identity=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("YGG_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));
    let config = ServerConfig::read_or_create(&config_path)?;

    // The signing key must exist before anything is served
    let signing_key = crypto::ensure_key(&config.state_directory).await?;
    tracing::info!("Signing key fingerprint: {}", signing_key.fingerprint_hex());

    let ctx = AppContext::new(config, signing_key).await?;

    server::serve(ctx).await?;

    Ok(())
}
