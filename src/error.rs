//! Run-level errors.
//!
//! Row-level problems never show up here: they are `DropReason`s counted in
//! `ReconstructionStats`. Anything in this enum aborts the run.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("Input database not found at {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Unsupported output format for {}: only .org files can be written", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Settings file already exists at {} (use --force to overwrite)", .0.display())]
    ConfigExists(PathBuf),

    #[error("No config directory on this platform; pass --config")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, Error>;
