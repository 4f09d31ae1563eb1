use flint_config::FlintConfig;
use flint_engine::FlintEngine;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => FlintConfig::load(path)?,
        None => FlintConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(?config, "flint starting");

    let mut engine = FlintEngine::new(&config)?;
    engine.run();

    Ok(())
}
