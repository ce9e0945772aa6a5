use thiserror::Error;

use crate::ready::ReadyStage;

/// Errors from the host layer
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Modem error: {0}")]
    Modem(#[from] sim800::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Module not ready: {stage} failed after {attempts} attempts")]
    NotReady { stage: ReadyStage, attempts: u32 },
}

pub type Result<T> = std::result::Result<T, HostError>;
