use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use fifocast_core::{logging, Config, Error};

use fifocast::server::FifocastServer;

/// Relay a raw PCM byte stream from a named pipe to any number of HTTP
/// clients as a live WAV stream.
#[derive(Parser, Debug)]
#[command(name = "fifocast", version, about)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, env = "FIFOCAST_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Named pipe to read from (overrides the config file)
    pipe: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let mut config = Config::load(cli.config.as_deref().and_then(|p| p.to_str()))?;
    if let Some(pipe) = cli.pipe {
        config.pipe.path = pipe;
    }

    // 2. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("fifocast starting...");
    info!("HTTP address: {}", config.http_address());
    info!("Pipe path: {}", config.pipe.path.display());

    // 4. The pipe must exist at startup. A path that vanishes later is a
    // transient reconnect condition, but a missing path here is fatal.
    if !config.pipe.path.exists() {
        return Err(Error::PipeMissing(config.pipe.path).into());
    }

    // 5. Start the server (owns the reader task and process lifecycle)
    FifocastServer::new(config).run().await
}
