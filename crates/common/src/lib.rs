pub mod env;
pub mod structured_logging;

pub use env::{env_bool, env_string, env_u64, EnvError};
pub use structured_logging::{
    init_structured_logging,
    ExecutionContext,
    FlushMetrics,
    JsonFormatter,
    LoggingConfig,
    StructuredLogEntry,
};
