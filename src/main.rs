//! RangeCrop CLI
//!
//! Mark frame ranges and crop rectangles on a folder of videos, then export
//! cropped and uncropped clips, first-frame stills and caption files.
//!
//! # Usage
//!
//! ```bash
//! rangecrop folder ./clips
//! rangecrop ranges add clip.mp4 --start 00:05 --end 00:09 --crop 100,0,720,720
//! rangecrop export -o ./dataset --cropped --image --caption --trigger "ohwx"
//! ```

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info};

use rangecrop_cli::adapters::TomlConfigAdapter;
use rangecrop_cli::app::DefaultAppContainer;
use rangecrop_cli::cli::{commands, Cli};
use rangecrop_cli::utils::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = TomlConfigAdapter::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config)?;

    let logging = init_logging(&config.logging).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;
    logging.log_system_info();

    let container = DefaultAppContainer::new(config).context("Failed to initialize")?;

    match commands::run(cli, &container).await {
        Ok(()) => {
            info!("rangecrop completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}
