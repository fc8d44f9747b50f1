use std::path::PathBuf;

use thiserror::Error;

use crate::provision::PlatformError;

#[derive(Error, Debug)]
pub enum MigratorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Config(Vec<String>),

    #[error("Target category not found: {0}")]
    ContainerNotFound(String),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Another run holds the lock at {} (remove it if no run is active)", .0.display())]
    RunLocked(PathBuf),
}

pub type Result<T> = std::result::Result<T, MigratorError>;
