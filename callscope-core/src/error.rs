use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid rtpmap attribute: {0}")]
    InvalidRtpmap(String),
}
