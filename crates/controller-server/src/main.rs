//! Controller hub server.

use std::future;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use controller_server::game_loop::run_game_loop;
use controller_server::{run_server, Hub, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(ServerConfig::from_env()?);

    info!("Starting controller hub...");

    let hub = Arc::new(Hub::new(&config));

    let game_loop = tokio::spawn(run_game_loop(
        Arc::clone(&hub),
        config.lobby_rules(),
        config.tick,
    ));

    // An inert listener (port taken) must not end the process
    let listener = async {
        run_server(Arc::clone(&config), Arc::clone(&hub)).await?;
        future::pending::<anyhow::Result<()>>().await
    };

    let result = tokio::select! {
        result = listener => result,
        signal = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            signal.map_err(anyhow::Error::from)
        }
    };

    game_loop.abort();
    result
}
