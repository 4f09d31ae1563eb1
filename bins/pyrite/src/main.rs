use pyrite_config::PyriteConfig;
use pyrite_engine::PyriteEngine;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => PyriteConfig::load(path)?,
        None => PyriteConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(?config, "pyrite starting");

    let mut engine = PyriteEngine::new(config)?;
    engine.run();

    Ok(())
}
