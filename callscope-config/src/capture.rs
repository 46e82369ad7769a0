//! Packet capture configuration.
//!
//! Selects which capture sources and sinks the manager is built with:
//! - Live capture on a device (pcap)
//! - Replay of one or more pcap files
//! - A UDP listener receiving mirrored signaling
//!
//! plus the TLS decryption parameters handed to sources that need them.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Packet capture configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CaptureConfig {
    /// Device for live capture.
    #[validate(custom(function = validation::validate_interface))]
    #[serde(default)]
    pub device: Option<String>,

    /// Pcap files to replay, in order.
    #[serde(default)]
    pub input_files: Vec<PathBuf>,

    /// Address to receive mirrored packets on.
    #[serde(default)]
    pub listen: Option<SocketAddr>,

    /// Pcap file every captured packet is archived to.
    #[serde(default)]
    pub output_file: Option<PathBuf>,

    /// Address every captured packet is forwarded to.
    #[serde(default)]
    pub forward: Option<SocketAddr>,

    /// Capture filter applied to all sources at startup.
    #[validate(custom(function = validation::validate_filter))]
    #[serde(default)]
    pub filter: Option<String>,

    /// Run in promiscuous mode?
    #[serde(default = "default_promiscuous")]
    pub promiscuous: bool,

    /// Bytes captured per frame.
    #[validate(range(min = 64, max = 262144))]
    #[serde(default = "default_snaplen", deserialize_with = "deserialize_size")]
    pub snaplen: usize,

    /// How long a source may block waiting for packets (milliseconds).
    #[validate(range(min = 1, max = 5000))]
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u32,

    /// Server whose TLS signaling should be decrypted.
    #[serde(default)]
    pub tls_server: Option<SocketAddr>,

    /// Private key used for TLS decryption.
    #[serde(default)]
    pub keyfile: Option<PathBuf>,
}

fn default_promiscuous() -> bool {
    true
}

fn default_snaplen() -> usize {
    65535
}

fn default_poll_timeout() -> u32 {
    100
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Num(usize),
    Str(String),
}

/// Accepts plain numbers or human sizes such as `"64KiB"`.
fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match SizeValue::deserialize(deserializer)? {
        SizeValue::Num(n) => Ok(n),
        SizeValue::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

fn parse_size(value: &str) -> Result<usize, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (num_part, unit_part) = value.split_at(split);

    let number: f64 = num_part
        .parse()
        .map_err(|_| format!("Invalid size: {value}"))?;
    let multiplier = match unit_part.trim().to_lowercase().as_str() {
        "" | "b" => 1.0,
        "kb" | "kib" => 1024.0,
        "mb" | "mib" => 1024.0 * 1024.0,
        _ => return Err(format!("Unknown size unit in {value}")),
    };
    Ok((number * multiplier) as usize)
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            input_files: Vec::new(),
            listen: None,
            output_file: None,
            forward: None,
            filter: None,
            promiscuous: default_promiscuous(),
            snaplen: default_snaplen(),
            poll_timeout_ms: default_poll_timeout(),
            tls_server: None,
            keyfile: None,
        }
    }
}

impl CaptureConfig {
    /// Whether at least one capture source is configured.
    pub fn has_sources(&self) -> bool {
        self.device.is_some() || !self.input_files.is_empty() || self.listen.is_some()
    }
}
