use std::sync::Arc;

use lines_bot::bot::Bot;
use lines_bot::config::BotConfig;
use lines_bot::resolver::{HttpResolver, LineResolver};
use lines_bot::transport::{MatrixTransport, Transport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("📎 Lines bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Homeserver: {}", config.homeserver);
    eprintln!("   Resolver: {}", config.resolver_url);
    eprintln!("   Storage: {}", config.storage_path.display());
    eprintln!(
        "   Auto-join: {}\n",
        if config.auto_join { "enabled" } else { "disabled" }
    );

    let transport: Arc<dyn Transport> = Arc::new(MatrixTransport::from_config(&config).await?);
    let resolver: Arc<dyn LineResolver> = Arc::new(HttpResolver::new(config.resolver_url.clone()));

    let mut bot = Bot::new(transport, resolver);
    if config.auto_join {
        bot.attach_auto_join();
    }

    Arc::new(bot)
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
