//! Command implementations for the specforge CLI
//!
//! Every command goes through `OrchestratorHandle` and renders the
//! returned [`OperationResult`] either as human-readable text or, with
//! `--json`, as a JCS envelope on stdout.
//!
//! ## Module Structure
//!
//! - `project`: init, status, list
//! - `phase`: advance, record, rollback, preview
//! - `gate`: gates, approve, reject
//! - `analysis`: classify, analyze, remediate

mod analysis;
mod gate;
mod phase;
mod project;

pub(crate) use analysis::{execute_analyze_command, execute_classify_command, execute_remediate_command};
pub(crate) use gate::{execute_approve_command, execute_gates_command, execute_reject_command};
pub(crate) use phase::{
    build_advance_request, execute_advance_command, execute_preview_command, execute_record_command,
    execute_rollback_command,
};
pub(crate) use project::{execute_init_command, execute_list_command, execute_status_command};

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;

use specforge_orchestrator::OperationResult;
use specforge_utils::canonicalization::emit_jcs;
use specforge_utils::error::{ConfigError, SpecforgeError};
use specforge_utils::types::ErrorKind;

/// An operation that returned an unsuccessful [`OperationResult`].
///
/// The envelope has already been rendered; `run` only reports the message
/// and maps `kind` to the exit code.
#[derive(Debug, Error)]
#[error("{message}")]
pub(crate) struct CommandFailed {
    pub kind: ErrorKind,
    pub message: String,
}

/// Render `result`, calling `human` for successful data in text mode.
pub(crate) fn emit<T: Serialize>(
    result: OperationResult<T>,
    json: bool,
    human: impl FnOnce(&T),
) -> Result<()> {
    if json {
        let out = emit_jcs(&result).context("Failed to emit result JSON")?;
        println!("{out}");
    } else if let (true, Some(data)) = (result.success, &result.data) {
        human(data);
    }

    if result.success {
        return Ok(());
    }
    Err(CommandFailed {
        kind: result.error_kind.unwrap_or(ErrorKind::Internal),
        message: result
            .error
            .unwrap_or_else(|| "operation failed".to_string()),
    }
    .into())
}

/// Render a caller mistake detected before reaching the handle.
pub(crate) fn emit_input_error(error: SpecforgeError, json: bool) -> Result<()> {
    emit::<()>(OperationResult::from_error(&error), json, |_| {})
}

pub(crate) fn invalid_argument(key: &str, value: impl Into<String>) -> SpecforgeError {
    SpecforgeError::Config(ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    })
}

/// Split `KEY=VALUE`; both sides must be non-empty.
pub(crate) fn split_pair<'a>(flag: &str, raw: &'a str) -> Result<(&'a str, &'a str), SpecforgeError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() && !value.is_empty() => {
            Ok((key.trim(), value))
        }
        _ => Err(invalid_argument(
            flag,
            format!("expected KEY=VALUE, got '{raw}'"),
        )),
    }
}
