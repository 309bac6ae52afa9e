use std::path::PathBuf;

use thiserror::Error;

/// Reasons a run is rejected before any device is contacted
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read hosts file {path}: {reason}")]
    UnreadableHostsFile { path: PathBuf, reason: String },
    #[error("Group '{0}' has no hosts")]
    EmptyGroup(String),
    #[error("Line {line} of {path}: host listed before any [group] header")]
    HostOutsideGroup { path: PathBuf, line: usize },
    #[error("Line {line} of {path}: malformed group header '{header}'")]
    BadGroupHeader {
        path: PathBuf,
        line: usize,
        header: String,
    },
    #[error("At least two hosts must be specified (got {0})")]
    NotEnoughHosts(usize),
    #[error("Unable to resolve {host}: {reason}")]
    Unresolvable { host: String, reason: String },
    #[error("Invalid value for {key}: {value}")]
    InvalidSetting { key: &'static str, value: String },
}

/// Per-host failure while talking to a device
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeviceError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("command rejected: {0}")]
    Command(String),
}

impl DeviceError {
    /// Short label used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceError::Authentication(_) => "authentication",
            DeviceError::Connection(_) => "connection",
            DeviceError::Command(_) => "command",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DeviceError::Authentication(m) | DeviceError::Connection(m) | DeviceError::Command(m) => m,
        }
    }
}
