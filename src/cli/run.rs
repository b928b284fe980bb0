//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Initializes logging
//! - Builds CliArgs and discovers Config
//! - Creates the tokio runtime and the orchestrator handle
//! - Dispatches to command handlers
//! - Handles all error output

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use super::args::{Cli, Commands};
use super::commands::{self, CommandFailed};

use specforge_config::{CliArgs, Config};
use specforge_gate::{ApproveRequest, RejectRequest};
use specforge_orchestrator::OrchestratorHandle;
use specforge_utils::error::SpecforgeError;
use specforge_utils::exit_codes::ExitCode;
use specforge_utils::logging::{LogFormat, init_tracing};

fn cli_args(cli: &Cli) -> CliArgs {
    CliArgs {
        config_path: cli.config.clone(),
        state_dir: cli.state_dir.clone(),
        max_rollback_depth: cli.max_rollback_depth,
        git_enabled: cli.no_git.then_some(false),
        repo_path: cli.repo.clone(),
        llm_provider: cli.llm_provider.clone(),
        llm_model: cli.llm_model.clone(),
    }
}

/// Main CLI execution function.
///
/// This function handles ALL output including errors. It returns `Result<(), ExitCode>`:
/// - On success: returns `Ok(())` after printing any output
/// - On error: prints the error to stderr and returns the mapped `ExitCode`
///
/// main.rs only calls `std::process::exit(code.as_i32())` on error; it does NOT print.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    // Fails only when a subscriber is already installed (embedded use).
    let _ = init_tracing(cli.verbose, format);

    let config = match Config::discover(&cli_args(&cli)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("✗ Failed to load configuration: {err:#}");
            return Err(ExitCode::INVALID_INPUT);
        }
    };
    debug!(state_dir = %config.orchestrator.state_dir.display(), "Configuration loaded");

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    match rt.block_on(execute(config, cli.command, cli.json)) {
        Ok(()) => Ok(()),
        Err(error) => Err(report(&error)),
    }
}

async fn execute(config: Config, command: Commands, json: bool) -> Result<()> {
    // Built inside the runtime so the lock sweeper can start.
    let handle = OrchestratorHandle::from_config(config)?;
    let outcome = dispatch(&handle, command, json).await;
    handle.shutdown();
    outcome
}

async fn dispatch(handle: &OrchestratorHandle, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Init { slug, name } => {
            commands::execute_init_command(handle, &slug, name.as_deref(), json).await
        }
        Commands::Status { id } => commands::execute_status_command(handle, &id, json).await,
        Commands::List => commands::execute_list_command(handle, json).await,
        Commands::Advance {
            id,
            artifacts,
            agent,
            metadata,
            duration_ms,
        } => {
            let request = commands::build_advance_request(
                &id,
                &artifacts,
                &metadata,
                agent.as_deref(),
                duration_ms,
            );
            commands::execute_advance_command(handle, request, json).await
        }
        Commands::Record { id, phase } => {
            commands::execute_record_command(handle, &id, &phase, json).await
        }
        Commands::Rollback { id, phase } => {
            commands::execute_rollback_command(handle, &id, &phase, json).await
        }
        Commands::Preview { id, phase } => {
            commands::execute_preview_command(handle, &id, &phase, json).await
        }
        Commands::Gates { id } => commands::execute_gates_command(handle, &id, json).await,
        Commands::Approve {
            id,
            gate,
            approved_by,
            notes,
            score,
        } => {
            let request = ApproveRequest {
                project_id: id,
                gate_name: gate,
                approved_by,
                notes,
                constitutional_score: score,
            };
            commands::execute_approve_command(handle, request, json).await
        }
        Commands::Reject {
            id,
            gate,
            rejected_by,
            reason,
        } => {
            let request = RejectRequest {
                project_id: id,
                gate_name: gate,
                rejected_by,
                reason,
            };
            commands::execute_reject_command(handle, request, json).await
        }
        Commands::Classify { phase, message } => {
            commands::execute_classify_command(&phase, &message, json)
        }
        Commands::Analyze { errors, history } => {
            commands::execute_analyze_command(handle, &errors, history.as_deref(), json).await
        }
        Commands::Remediate { id, phase, errors } => {
            commands::execute_remediate_command(handle, &id, &phase, &errors, json).await
        }
    }
}

/// Print `error` to stderr and pick the exit code.
fn report(error: &anyhow::Error) -> ExitCode {
    if let Some(failed) = error.downcast_ref::<CommandFailed>() {
        eprintln!("✗ {}", failed.message);
        return ExitCode::from_kind(failed.kind);
    }
    if let Some(specforge_error) = error.downcast_ref::<SpecforgeError>() {
        eprint!("{}", specforge_error.display_for_user());
        return specforge_error.to_exit_code();
    }

    eprintln!("✗ Unexpected error: {error:#}");
    eprintln!("\n  Run with --verbose for more detailed output");
    ExitCode::INTERNAL
}
