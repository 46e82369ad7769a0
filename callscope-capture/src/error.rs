use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture source '{source_name}' rejected filter: {reason}")]
    Filter { source_name: String, reason: String },

    #[error("Capture device '{0}' not found")]
    DeviceNotFound(String),

    #[error("Cannot open capture file {path}: {reason}")]
    File { path: PathBuf, reason: String },

    #[error("Cannot archive to {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("Capture manager was already started")]
    AlreadyStarted,

    #[error("Failed to spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("pcap error: {0}")]
    Pcap(#[from] pcap::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
