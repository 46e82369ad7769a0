//! Configuration errors, naming the layer and key that caused them.

use std::path::PathBuf;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid configuration:\n{}", format_validation_errors(.0))]
    Validation(#[source] ValidationErrors),

    /// A value in one layer (file, environment, defaults) has the wrong shape.
    #[error("Cannot read '{key}' from {origin}: {source}")]
    Parsing {
        origin: String,
        key: String,
        #[source]
        source: figment::Error,
    },
}

impl From<figment::Error> for ConfigError {
    fn from(source: figment::Error) -> Self {
        let origin = match &source.metadata {
            Some(meta) => match &meta.source {
                Some(location) => format!("{} {location}", meta.name),
                None => meta.name.to_string(),
            },
            None => "merged configuration".to_string(),
        };
        let key = source
            .path
            .iter()
            .skip_while(|segment| segment.as_str() == "default")
            .cloned()
            .collect::<Vec<_>>()
            .join(".");

        ConfigError::Parsing {
            origin,
            key,
            source,
        }
    }
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
    use std::fmt::Write;

    let mut output = String::new();
    for (field, errors) in errors.field_errors() {
        let _ = writeln!(output, "Field '{}':", field);
        for error in errors {
            let message = match &error.message {
                Some(msg) => msg.to_string(),
                None => error.code.to_string(),
            };
            let _ = writeln!(output, "  - {}", message);
        }
    }
    output
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors)
    }
}
