use slate_config::SlateConfig;
use slate_engine::SlateEngine;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => SlateConfig::load(path)?,
        None => SlateConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(?config, "slate starting");

    let mut engine = SlateEngine::new(&config)?;
    engine.run();

    Ok(())
}
