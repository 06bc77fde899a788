use thiserror::Error;

/// Top-level error type for the autosave crate
#[derive(Debug, Error)]
pub enum AutoSaveError {
    #[error("Invalid field path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No tokio runtime available to schedule flushes")]
    NoRuntime,

    #[error("Flush failed for {failed} of {total} sessions: {details}")]
    FlushAll {
        failed: usize,
        total: usize,
        details: String,
    },
}

pub type AutoSaveResult<T> = Result<T, AutoSaveError>;

/// Failure of the single network write issued by a flush
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("HTTP {code}: {message}")]
    Http { code: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rejected by the writer itself, message is shown to the user as-is
    #[error("{0}")]
    Rejected(String),
}

impl From<reqwest::Error> for WriteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WriteError::Transport(format!("request timed out: {}", err))
        } else {
            WriteError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Env(#[from] common::EnvError),
}
