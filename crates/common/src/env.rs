//! Small helpers for reading typed configuration overrides from the environment.

use thiserror::Error;

/// A variable was set but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("environment variable {name}={value:?} is not a valid {expected}")]
pub struct EnvError {
    pub name: String,
    pub value: String,
    pub expected: &'static str,
}

/// Trimmed value, `None` when unset or blank.
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_u64(name: &str) -> Result<Option<u64>, EnvError> {
    match env_string(name) {
        None => Ok(None),
        Some(raw) => raw.parse::<u64>().map(Some).map_err(|_| EnvError {
            name: name.to_string(),
            value: raw,
            expected: "unsigned integer",
        }),
    }
}

/// Accepts `1/0`, `true/false`, `yes/no`, `on/off` (case-insensitive).
pub fn env_bool(name: &str) -> Result<Option<bool>, EnvError> {
    match env_string(name) {
        None => Ok(None),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(EnvError {
                name: name.to_string(),
                value: raw,
                expected: "boolean",
            }),
        },
    }
}
