use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use crate::env::{env_bool, env_string};

/// One JSON log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredLogEntry {
    /// ISO 8601
    pub timestamp: String,
    pub level: String,
    /// Module that emitted the event
    pub target: String,
    pub message: String,
    /// Remaining event fields (record_id, section, ...)
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ExecutionContext>,
    /// Flush metrics, when the event carries them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<FlushMetrics>,
}

/// Process-level context attached to every JSON log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub app_version: String,
    pub hostname: String,
    pub pid: u32,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
        }
    }
}

/// Metrics of one flush, taken from the `duration_ms` and `items_count` fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushMetrics {
    pub duration_ms: Option<u64>,
    pub items_count: Option<u64>,
}

/// Layer that prints each tracing event as one JSON object on stderr.
///
/// stdout stays reserved for command output.
pub struct JsonFormatter {
    include_context: bool,
}

impl JsonFormatter {
    pub fn new(include_context: bool) -> Self {
        Self { include_context }
    }

    fn build_entry(&self, event: &Event<'_>) -> StructuredLogEntry {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let performance = visitor.extract_flush_metrics();

        StructuredLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level: level_name(event.metadata().level()).to_string(),
            target: event.metadata().target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
            context: self.include_context.then(ExecutionContext::default),
            performance,
        }
    }
}

impl<S> Layer<S> for JsonFormatter
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let entry = self.build_entry(event);
        if let Ok(json) = serde_json::to_string(&entry) {
            let _ = writeln!(io::stderr(), "{}", json);
        }
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: HashMap<String, Value>,
}

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(
                field.name().to_string(),
                Value::String(format!("{:?}", value)),
            );
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields
                .insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), Value::Number(value.into()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), Value::Bool(value));
    }
}

impl JsonVisitor {
    fn extract_flush_metrics(&self) -> Option<FlushMetrics> {
        let metrics = FlushMetrics {
            duration_ms: self.fields.get("duration_ms").and_then(Value::as_u64),
            items_count: self.fields.get("items_count").and_then(Value::as_u64),
        };

        if metrics.duration_ms.is_some() || metrics.items_count.is_some() {
            Some(metrics)
        } else {
            None
        }
    }
}

/// Structured logging settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Used when RUST_LOG is not set
    pub level: Level,
    pub json_output: bool,
    /// Non-JSON output only
    pub color_output: bool,
    pub include_context: bool,
    pub include_line_numbers: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_output: false,
            color_output: true,
            include_context: true,
            include_line_numbers: cfg!(debug_assertions),
        }
    }
}

impl LoggingConfig {
    /// Reads `AUTOSAVE_LOG_JSON` and `AUTOSAVE_LOG_LEVEL` on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(Some(json)) = env_bool("AUTOSAVE_LOG_JSON") {
            config.json_output = json;
        }
        if let Some(level) = env_string("AUTOSAVE_LOG_LEVEL") {
            if let Ok(level) = level.parse::<Level>() {
                config.level = level;
            }
        }
        config
    }
}

/// Installs the global subscriber; logs go to stderr. A second call fails.
pub fn init_structured_logging(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    if config.json_output {
        let subscriber = Registry::default()
            .with(env_filter)
            .with(JsonFormatter::new(config.include_context));

        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_line_number(config.include_line_numbers)
            .with_ansi(config.color_output && io::stderr().is_terminal());

        let subscriber = Registry::default().with(env_filter).with(fmt_layer);

        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_flattens_fields() {
        let mut fields = HashMap::new();
        fields.insert("record_id".to_string(), Value::String("r-1".to_string()));

        let entry = StructuredLogEntry {
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            level: "INFO".to_string(),
            target: "autosave::saver".to_string(),
            message: "flush completed".to_string(),
            fields,
            context: None,
            performance: Some(FlushMetrics {
                duration_ms: Some(12),
                items_count: Some(3),
            }),
        };

        let json: Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["record_id"], "r-1");
        assert_eq!(json["performance"]["items_count"], 3);
        assert!(json.get("context").is_none());
    }

    #[test]
    fn test_visitor_extracts_flush_metrics() {
        let mut visitor = JsonVisitor::default();
        visitor
            .fields
            .insert("duration_ms".to_string(), Value::Number(40u64.into()));

        let metrics = visitor.extract_flush_metrics().unwrap();
        assert_eq!(metrics.duration_ms, Some(40));
        assert_eq!(metrics.items_count, None);

        assert!(JsonVisitor::default().extract_flush_metrics().is_none());
    }

    #[test]
    fn test_execution_context_defaults() {
        let ctx = ExecutionContext::default();
        assert_eq!(ctx.pid, std::process::id());
        assert!(!ctx.app_version.is_empty());
    }
}
