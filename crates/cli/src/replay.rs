//! Timed edit scripts for the `replay` command.
//!
//! ```text
//! {"at_ms": 0,   "path": "claimantInfo.firstName", "value": "John"}
//! {"at_ms": 150, "path": "amount", "value": 20}
//! {"at_ms": 900, "flush": true}
//! {"at_ms": 950, "disabled": true}
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::warn;

use autosave::AutoSaver;

/// Upper bound on waiting for the detached teardown write.
const TEARDOWN_WAIT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Edit { path: String, value: Value },
    Flush,
    SetDisabled(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub at: Duration,
    pub action: Action,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    at_ms: u64,
    path: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    flush: bool,
    disabled: Option<bool>,
}

impl RawStep {
    fn into_step(self) -> Result<ScriptStep> {
        let action = match (self.path, self.flush, self.disabled) {
            (Some(path), false, None) => Action::Edit {
                path,
                value: self.value,
            },
            (None, true, None) => Action::Flush,
            (None, false, Some(disabled)) => Action::SetDisabled(disabled),
            _ => bail!("step must have exactly one of `path`, `flush` or `disabled`"),
        };
        Ok(ScriptStep {
            at: Duration::from_millis(self.at_ms),
            action,
        })
    }
}

/// Blank lines and `#` comments are skipped; offsets must not decrease.
pub fn parse_script(raw: &str) -> Result<Vec<ScriptStep>> {
    let mut steps: Vec<ScriptStep> = Vec::new();

    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let step = serde_json::from_str::<RawStep>(line)
            .map_err(anyhow::Error::from)
            .and_then(RawStep::into_step)
            .with_context(|| format!("invalid script step on line {}", index + 1))?;

        if let Some(previous) = steps.last() {
            if step.at < previous.at {
                bail!(
                    "line {}: at_ms {} is earlier than the previous step",
                    index + 1,
                    step.at.as_millis()
                );
            }
        }
        steps.push(step);
    }

    Ok(steps)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySummary {
    pub steps: usize,
    pub unsaved_at_exit: bool,
}

/// Applies every step at its offset, then disposes the session and waits
/// (bounded) for the teardown write to land.
pub async fn run_replay(saver: &AutoSaver, steps: &[ScriptStep]) -> ReplaySummary {
    let start = Instant::now();

    for step in steps {
        sleep_until(start + step.at).await;
        match &step.action {
            Action::Edit { path, value } => {
                if let Err(e) = saver.save_field(path.clone(), value.clone()) {
                    warn!(path = %path, error = %e, "edit rejected");
                }
            }
            Action::Flush => {
                // failure is visible through the status
                let _ = saver.flush_now().await;
            }
            Action::SetDisabled(disabled) => saver.set_disabled(*disabled),
        }
    }

    saver.dispose();

    let deadline = Instant::now() + TEARDOWN_WAIT;
    while saver.has_unsaved_changes() && Instant::now() < deadline {
        sleep(Duration::from_millis(10)).await;
    }

    ReplaySummary {
        steps: steps.len(),
        unsaved_at_exit: saver.has_unsaved_changes(),
    }
}
