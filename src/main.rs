use anyhow::Result;
use helmsman::application::system::Application;
use helmsman::config::Config;
use helmsman::infrastructure::display::NoopDisplay;
use helmsman::infrastructure::mock::{MockBrokerage, MockQuotes};
use helmsman::infrastructure::quotes::RetryingQuoteAdapter;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .with_target(false)
        .init();

    info!("starting helmsman");
    let config = Config::from_env()?;

    // Adapter wiring. The mock pair keeps the daemon runnable without live
    // credentials; real adapters implement the same traits.
    let brokerage = Arc::new(MockBrokerage::default());
    let quotes = Arc::new(RetryingQuoteAdapter::new(MockQuotes::default()));
    let display = Arc::new(NoopDisplay);

    let app = Application::build(config, brokerage, quotes, display).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn({
        let app = Arc::new(app);
        async move { app.run(shutdown_rx).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("termination signal received, shutting down");
    let _ = shutdown_tx.send(true);
    runner.await??;

    info!("goodbye");
    Ok(())
}
