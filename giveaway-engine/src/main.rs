//! Giveaway engine CLI
//!
//! Drives the qualification and execution engines from local files:
//! - `availability`: which filters a tier/platform pair may use
//! - `preview`: evaluate a filter configuration against a participant file
//! - `draw`: pre-scan, qualify, select and seal winners

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use giveaway_common::events::EventBus;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use giveaway_engine::execution::{DrawExecutor, ExecutionRateLimiter, InMemoryDrawLedger};
use giveaway_engine::filters::{resolve_availability, EvaluationContext, Evaluator, FilterConfiguration};
use giveaway_engine::model::{CapabilityDescriptor, Draw, Participant, Platform, Tier};
use giveaway_engine::prescan::{ExactCount, PreScanGuard, SourceRef};
use giveaway_engine::preview::{PreviewEngine, PreviewOptions};
use giveaway_engine::selection::{SelectionMode, SelectionRequest};
use giveaway_engine::EngineConfig;

/// Owner recorded on draws created from the command line
const CLI_OWNER: &str = "cli";

/// Log level until the config file has been read
const DEFAULT_LOG_LEVEL: &str = "info";

/// Command-line arguments for giveaway-engine
#[derive(Parser, Debug)]
#[command(name = "giveaway-engine")]
#[command(about = "Qualify participants and draw verifiable giveaway winners")]
#[command(version)]
struct Args {
    /// Engine config file (TOML)
    #[arg(short, long, global = true, env = "GIVEAWAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print filter availability for a tier and platform
    Availability {
        #[arg(short, long, default_value = "free")]
        tier: Tier,

        #[arg(short, long, default_value = "file_import")]
        platform: Platform,
    },

    /// Evaluate filters against participants without drawing
    Preview {
        /// Filter configuration (JSON)
        #[arg(short, long)]
        filters: PathBuf,

        /// Participant list (JSON array)
        #[arg(short, long)]
        participants: PathBuf,

        /// Seed for reproducible random comment selection
        #[arg(short, long)]
        seed: Option<String>,

        /// Handle of the post author, for auto-mention handling
        #[arg(long)]
        post_author: Option<String>,

        /// Evaluate only the first N participants
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run a full draw and print the sealed result
    Draw {
        /// Filter configuration (JSON)
        #[arg(short, long)]
        filters: PathBuf,

        /// Participant list (JSON array)
        #[arg(short, long)]
        participants: PathBuf,

        /// Number of winners
        #[arg(short, long, default_value = "1")]
        winners: usize,

        #[arg(short, long, default_value = "crypto-random")]
        mode: SelectionMode,

        /// Seed (fisher-yates only)
        #[arg(short, long)]
        seed: Option<String>,

        #[arg(short, long, default_value = "premium")]
        tier: Tier,

        #[arg(long, default_value = "file_import")]
        platform: Platform,

        /// Handle of the post author, for auto-mention handling
        #[arg(long)]
        post_author: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Installed before config loading so its warnings are visible
    let (filter, filter_handle) = reload::Layer::new(EnvFilter::new(log_directives(
        std::env::var("RUST_LOG").ok(),
        DEFAULT_LOG_LEVEL,
    )));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = EngineConfig::load(args.config.as_deref()).context("Failed to load engine config")?;
    filter_handle
        .reload(EnvFilter::new(log_directives(
            std::env::var("RUST_LOG").ok(),
            &config.logging.level,
        )))
        .context("Failed to apply configured log level")?;

    info!("Starting giveaway-engine v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Availability { tier, platform } => {
            let descriptor = CapabilityDescriptor::for_platform(platform);
            print_json(&resolve_availability(&descriptor, tier))
        }
        Command::Preview {
            filters,
            participants,
            seed,
            post_author,
            limit,
        } => {
            let filters = read_filters(&filters)?;
            let participants = read_participants(&participants)?;
            let ctx = EvaluationContext { post_author };
            let options = PreviewOptions {
                max_participants: limit,
                seed,
                ..PreviewOptions::from_config(&config.evaluation)
            };

            let events = EventBus::new(100);
            log_events(&events);
            let engine = PreviewEngine::new(Evaluator::new(config.evaluation.clone())).with_events(events);

            let cancel = cancel_on_ctrl_c();
            let result = engine
                .preview(None, &filters, &participants, &ctx, &options, Some(&cancel))
                .await
                .context("Preview failed")?;
            print_json(&result)
        }
        Command::Draw {
            filters,
            participants: participants_path,
            winners,
            mode,
            seed,
            tier,
            platform,
            post_author,
        } => {
            let filters = read_filters(&filters)?;
            let participants = read_participants(&participants_path)?;
            let sealed = run_draw(
                &config,
                DrawArgs {
                    filters,
                    participants,
                    source: SourceRef::File(participants_path.display().to_string()),
                    selection: SelectionRequest {
                        winner_count: winners,
                        mode,
                        seed,
                    },
                    tier,
                    platform,
                    ctx: EvaluationContext { post_author },
                },
            )
            .await?;
            print_json(&sealed)
        }
    }
}

struct DrawArgs {
    filters: FilterConfiguration,
    participants: Vec<Participant>,
    source: SourceRef,
    selection: SelectionRequest,
    tier: Tier,
    platform: Platform,
    ctx: EvaluationContext,
}

/// DRAFT → CONFIGURED → READY → executed, using the file row count as pre-scan
async fn run_draw(config: &EngineConfig, args: DrawArgs) -> Result<Draw> {
    let limits = config.limits.clone();
    let mut draw = Draw::new(CLI_OWNER, args.tier, args.platform);
    info!(draw_id = %draw.id, tier = %args.tier, platform = %args.platform, "Draw created");

    draw.configure(args.filters).context("Invalid filter configuration")?;
    draw.set_context(args.ctx)?;
    draw.set_selection(args.selection).context("Invalid selection request")?;
    draw.set_source(args.source.clone())?;

    let guard = PreScanGuard::new(ExactCount(args.participants.len() as u64), limits.clone());
    let scan = guard.scan(&args.source, args.tier, None).await?;
    scan.ensure_within_limit().context("Pre-scan rejected the source")?;
    draw.record_pre_scan(scan)?;
    draw.import_participants(args.participants, &limits)
        .context("Participant import failed")?;
    draw.mark_ready(&limits).context("Draw is not ready")?;

    let events = EventBus::new(100);
    log_events(&events);
    let ledger = Arc::new(InMemoryDrawLedger::new(config.execution.processing_lease()));
    let executor = DrawExecutor::new(
        Evaluator::new(config.evaluation.clone()),
        ledger,
        config.execution.clone(),
        limits,
        events,
    )
    .with_rate_limit(ExecutionRateLimiter::per_hour(config.execution.max_executions_per_hour)?);

    let sealed = executor.execute(draw).await.context("Draw execution failed")?;
    Ok(sealed)
}

fn read_filters(path: &Path) -> Result<FilterConfiguration> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read filters {}", path.display()))?;
    FilterConfiguration::from_json(&content)
        .with_context(|| format!("Invalid filter configuration in {}", path.display()))
}

fn read_participants(path: &Path) -> Result<Vec<Participant>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read participants {}", path.display()))?;
    let participants: Vec<Participant> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid participant list in {}", path.display()))?;
    info!(count = participants.len(), "Loaded participants from {}", path.display());
    Ok(participants)
}

/// `RUST_LOG` wins over the config file level
fn log_directives(rust_log: Option<String>, configured: &str) -> String {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Mirror audit events into the debug log
fn log_events(events: &EventBus) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(?event, "Draw event"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            child.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_overrides_configured_level() {
        assert_eq!(log_directives(Some("giveaway_engine=trace".into()), "warn"), "giveaway_engine=trace");
        assert_eq!(log_directives(None, "warn"), "warn");
        assert_eq!(log_directives(Some("  ".into()), "debug"), "debug");
    }
}
