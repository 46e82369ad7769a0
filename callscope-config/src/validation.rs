//! Custom validation functions for configuration.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref INTERFACE_NAME: Regex =
        Regex::new(r"^[a-zA-Z0-9_.:\-]+$").expect("interface pattern is valid");
}

/// Validate that an interface name is something libpcap could open.
pub fn validate_interface(name: &str) -> Result<(), ValidationError> {
    if !name.is_empty() && name.len() <= 15 && INTERFACE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_interface"))
    }
}

/// Validate that a capture filter is not blank.
///
/// Syntax is checked by each source when the filter is applied.
pub fn validate_filter(filter: &str) -> Result<(), ValidationError> {
    if filter.trim().is_empty() {
        Err(ValidationError::new("empty_filter"))
    } else {
        Ok(())
    }
}

/// Validate a tracing level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_names() {
        assert!(validate_interface("eth0").is_ok());
        assert!(validate_interface("any").is_ok());
        assert!(validate_interface("br-1f2e3d").is_ok());
        assert!(validate_interface("").is_err());
        assert!(validate_interface("eth0; rm -rf").is_err());
        assert!(validate_interface("averyveryverylongname0").is_err());
    }

    #[test]
    fn blank_filters_are_rejected() {
        assert!(validate_filter("udp port 5060").is_ok());
        assert!(validate_filter("   ").is_err());
    }

    #[test]
    fn log_levels() {
        assert!(validate_log_level("DEBUG").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }
}
