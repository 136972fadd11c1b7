//! CLI module for rangecrop
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::adapters::AppConfig;
use crate::domain::errors::DomainError;
use crate::utils::logging::{LogFormat, LogLevel};

pub mod args;
pub mod commands;

pub use args::*;

/// Cut cropped clips, stills and captions out of video ranges
#[derive(Parser, Debug)]
#[command(name = "rangecrop")]
#[command(about = "Define ranges and crops on videos, then batch-export clips, stills and captions")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Session file
    #[arg(long, global = true)]
    pub session: Option<PathBuf>,

    /// Logging level
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format: pretty, compact or json
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a folder into the session
    Folder(FolderArgs),
    /// Duplicate a video entry
    Duplicate(DuplicateArgs),
    /// Include or exclude an entry from exports
    Select(SelectArgs),
    /// Show frame count, size and frame rate of a video
    Inspect(InspectArgs),
    /// Edit ranges
    #[command(subcommand)]
    Ranges(RangesCommand),
    /// Export clips, stills and captions for the selected videos
    Export(ExportArgs),
    /// Caption one exported artifact
    Caption(CaptionArgs),
    /// Play a video or range headlessly
    Preview(PreviewArgs),
    /// Re-encode every video in the folder to a frame rate
    ConvertFps(ConvertFpsArgs),
}

impl Cli {
    /// Apply flags that override configuration values
    pub fn apply_overrides(&self, config: &mut AppConfig) -> Result<(), DomainError> {
        if let Some(session) = &self.session {
            config.session.file = session.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.parse::<LogLevel>()?;
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.parse::<LogFormat>()?;
        }

        let subject = match &self.command {
            Commands::Export(args) => args.subject.as_ref(),
            Commands::Caption(args) => args.subject.as_ref(),
            _ => None,
        };
        if let Some(subject) = subject {
            config.caption.subject = Some(subject.clone());
        }
        Ok(())
    }
}
