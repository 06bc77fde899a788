use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

use autosave::{
    AutoSaveConfig, AutoSaver, HttpSectionWriter, InvalidationBus, SaveStatus, SectionKey,
    SectionWriter,
};
use common::{init_structured_logging, LoggingConfig};

mod replay;
mod writers;

use replay::{parse_script, run_replay};
use writers::{CountingWriter, StdoutWriter};

#[derive(Parser)]
#[command(name = "autosave")]
#[command(about = "Debounced section auto-save: replay edit scripts against a report API")]
#[command(version)]
struct Cli {
    /// Print logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replays a JSONL edit script through one auto-save session
    Replay {
        /// Script file, one `{"at_ms": .., "path": .., "value": ..}` step per line
        script: PathBuf,
        /// Report API base URL; prints patches to stdout when omitted
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long, default_value = "demo-report")]
        record: String,
        #[arg(long, default_value = "claimant")]
        section: String,
        /// Overrides the configured debounce window
        #[arg(long)]
        debounce_ms: Option<u64>,
        /// TOML config file (AUTOSAVE_* env vars apply on top)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    logging.json_output |= cli.json_logs;
    init_structured_logging(logging)?;

    match cli.command {
        Commands::Replay {
            script,
            endpoint,
            record,
            section,
            debounce_ms,
            config,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(ms) = debounce_ms {
                config = config.with_debounce_ms(ms);
            }
            config.validate()?;

            let inner: Arc<dyn SectionWriter> = match endpoint {
                Some(url) => {
                    config.endpoint.base_url = url;
                    Arc::new(HttpSectionWriter::new(&config.endpoint)?)
                }
                None => Arc::new(StdoutWriter),
            };
            let writer = Arc::new(CountingWriter::new(inner));

            let raw = std::fs::read_to_string(&script)
                .with_context(|| format!("failed to read script {}", script.display()))?;
            let steps = parse_script(&raw)?;

            let saver = AutoSaver::new(
                SectionKey::new(record, section),
                &config,
                writer.clone(),
                Arc::new(InvalidationBus::default()),
            )?;

            let summary = run_replay(&saver, &steps).await;
            let status = saver.status();

            let label = match status.status {
                SaveStatus::Error => style(status.status.to_string()).red().bold(),
                SaveStatus::Saved => style(status.status.to_string()).green().bold(),
                _ => style(status.status.to_string()).dim(),
            };
            eprintln!(
                "{} steps={} writes={} failed={} status={}",
                style("[autosave]").cyan(),
                summary.steps,
                writer.writes(),
                writer.failures(),
                label
            );
            if let Some(error) = status.error {
                eprintln!("{} {}", style("last error:").red(), error);
            }
            if summary.unsaved_at_exit {
                eprintln!(
                    "{}",
                    style("teardown write did not finish before exit").yellow()
                );
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<AutoSaveConfig> {
    let base = match path {
        Some(path) => AutoSaveConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AutoSaveConfig::default(),
    };
    Ok(base.with_env_overrides()?)
}
