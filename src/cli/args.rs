//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and the subcommand enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// specforge - phase orchestration for spec-driven planning pipelines
#[derive(Debug, Parser)]
#[command(name = "specforge")]
#[command(about = "Drive projects through the specforge planning pipeline")]
#[command(long_about = r#"
specforge moves a project through a fixed pipeline of planning phases,
snapshotting every completed phase so it can be rolled back later.

EXAMPLES:
  # Create a project
  specforge init acme-portal --name "Acme Portal"

  # Complete the current phase with two artifacts
  specforge advance acme-portal --artifact analysis.md=./analysis.md \
      --metadata classification=saas

  # Approve the blocking stack gate, then leave STACK_SELECTION
  specforge approve acme-portal stack_approved --by cto@example.com
  specforge advance acme-portal --artifact stack.json=./stack.json \
      --metadata stack_choice=rust-axum

  # See what a rollback would discard, then do it
  specforge preview acme-portal ANALYSIS
  specforge rollback acme-portal ANALYSIS

  # Classify a validation failure and trace its root cause
  specforge classify SPEC_PM "Requirement REQ-12 is not mapped to any user story"
  specforge analyze --error "unexpected token } in JSON" --history history.json

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > config file > defaults
  Config file is discovered by searching upward from CWD for .specforge/config.toml
  Use --config to specify an explicit config file path

PHASES:
  ANALYSIS → STACK_SELECTION → SPEC → DEPENDENCIES → SOLUTIONING → VALIDATE → DONE
  Leaving STACK_SELECTION requires the stack_approved gate
  Reaching DONE tags the spec branch with handoff-v<version>

EXIT CODES:
  0 success, 1 internal, 2 invalid input, 3 not found, 4 conflict,
  9 project lock held, 70 dependency failure
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding project state (default: .specforge)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Maximum rollbacks allowed per project
    #[arg(long, global = true)]
    pub max_rollback_depth: Option<u32>,

    /// Disable git integration for this invocation
    #[arg(long, global = true)]
    pub no_git: bool,

    /// Repository that receives spec branches (default: current directory)
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    /// LLM provider for root-cause escalation (none, anthropic)
    #[arg(long, global = true)]
    pub llm_provider: Option<String>,

    /// Model used for root-cause escalation
    #[arg(long, global = true)]
    pub llm_model: Option<String>,

    /// Emit canonical JSON (JCS) result envelopes on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a project at ANALYSIS and initialize its gates
    ///
    /// EXAMPLES:
    ///   specforge init acme-portal
    ///   specforge init "Acme Portal"   (id becomes acme-portal)
    Init {
        /// Project slug; also used as the project id after slugification
        slug: String,

        /// Display name (defaults to the slug)
        #[arg(long)]
        name: Option<String>,
    },

    /// Show a project's phase, gates, history and snapshots
    Status {
        /// Project id
        id: String,
    },

    /// List all projects
    List,

    /// Complete the current phase and move to the next one
    ///
    /// EXAMPLES:
    ///   specforge advance acme-portal --artifact analysis.md=./analysis.md
    ///   specforge advance acme-portal --metadata stack_choice=rust-axum
    Advance {
        /// Project id
        id: String,

        /// Artifact to record, as NAME=PATH (repeatable)
        #[arg(long = "artifact", value_name = "NAME=PATH")]
        artifacts: Vec<String>,

        /// Agent that produced the artifacts (defaults to the phase's agent)
        #[arg(long)]
        agent: Option<String>,

        /// Metadata to merge, as KEY=VALUE; VALUE is parsed as JSON when possible (repeatable)
        #[arg(long = "metadata", value_name = "KEY=VALUE")]
        metadata: Vec<String>,

        /// Wall-clock duration of the phase, recorded in the commit message
        #[arg(long, default_value_t = 0)]
        duration_ms: u64,
    },

    /// Snapshot the current artifacts of a phase without advancing
    Record {
        /// Project id
        id: String,

        /// Phase whose stored artifacts are snapshotted
        phase: String,
    },

    /// Restore a completed phase's snapshot, discarding everything after it
    ///
    /// EXAMPLES:
    ///   specforge preview acme-portal SPEC
    ///   specforge rollback acme-portal SPEC
    Rollback {
        /// Project id
        id: String,

        /// Completed phase to return to
        phase: String,
    },

    /// Show what a rollback would restore and discard, without changing anything
    Preview {
        /// Project id
        id: String,

        /// Completed phase to inspect
        phase: String,
    },

    /// List a project's approval gates
    Gates {
        /// Project id
        id: String,
    },

    /// Approve a gate
    Approve {
        /// Project id
        id: String,

        /// Gate name (stack_approved, prd_approved, architecture_approved, handoff_acknowledged)
        gate: String,

        /// Stakeholder approving the gate
        #[arg(long = "by")]
        approved_by: String,

        /// Free-form approval notes
        #[arg(long)]
        notes: Option<String>,

        /// Constitutional compliance score in [0, 1]
        #[arg(long)]
        score: Option<f64>,
    },

    /// Reject a gate
    Reject {
        /// Project id
        id: String,

        /// Gate name
        gate: String,

        /// Stakeholder rejecting the gate
        #[arg(long = "by")]
        rejected_by: String,

        /// Reason for the rejection (required)
        #[arg(long)]
        reason: Option<String>,
    },

    /// Classify a validation failure and suggest which agent to re-run
    Classify {
        /// Step that failed validation (e.g. SPEC_PM)
        phase: String,

        /// Validation error message
        message: String,
    },

    /// Trace a set of validation errors back to their originating phase
    Analyze {
        /// Validation error (repeatable)
        #[arg(long = "error", value_name = "MESSAGE", required = true)]
        errors: Vec<String>,

        /// JSON file holding the phase history array
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Classify, pick a strategy and trace the root cause for a project's failed validation
    Remediate {
        /// Project id
        id: String,

        /// Step that failed validation
        phase: String,

        /// Validation error (repeatable)
        #[arg(long = "error", value_name = "MESSAGE", required = true)]
        errors: Vec<String>,
    },
}
