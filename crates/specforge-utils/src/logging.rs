//! Logging and observability infrastructure for specforge
//!
//! Structured logging via `tracing`. Every mutation of project state is
//! logged with `project_id` and `phase` fields; absorbed dependency failures
//! (git push, LLM escalation) are logged at `warn`; caller validation
//! refusals at `debug`.

use std::io::IsTerminal;
use tracing::{Level, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "SPECFORGE_LOG";

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, single line per event
    #[default]
    Compact,
    /// One JSON object per event, for log shippers
    Json,
}

fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("specforge=debug,info")
            } else {
                EnvFilter::try_new("specforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// `verbose` raises specforge crates to `debug` and adds span close events.
/// Fails if a global subscriber is already installed.
pub fn init_tracing(verbose: bool, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let filter = env_filter(verbose);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true)
                        .with_target(true),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            let span_events = if verbose {
                FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            };
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(use_color())
                        .with_target(verbose)
                        .with_thread_ids(false)
                        .with_line_number(false)
                        .with_file(false)
                        .with_span_events(span_events)
                        .compact(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Span wrapping every mutation of a single project.
pub fn project_span(project_id: &str, operation: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "project_operation",
        project_id = %project_id,
        operation = %operation,
    )
}

/// Log a completed forward transition.
pub fn log_phase_transition(project_id: &str, from: &str, to: &str, version: u64) {
    info!(
        project_id = %project_id,
        from = %from,
        to = %to,
        snapshot_version = version,
        "Phase advanced"
    );
}

/// Log a completed rollback.
pub fn log_rollback(project_id: &str, target: &str, discarded: usize) {
    info!(
        project_id = %project_id,
        target = %target,
        discarded_phases = discarded,
        "Project rolled back"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_initialization_is_single_shot() {
        let _ = init_tracing(false, LogFormat::Compact);
        // Only one global subscriber can exist per process.
        assert!(init_tracing(true, LogFormat::Json).is_err());
    }

    #[test]
    fn test_project_span_creation() {
        let span = project_span("p-1", "advance");
        let _entered = span.enter();
        log_phase_transition("p-1", "ANALYSIS", "STACK_SELECTION", 1);
        log_rollback("p-1", "ANALYSIS", 3);
    }
}
