//! Human approval gates
//!
//! Four fixed checkpoints guard the pipeline. Only `stack_approved` is
//! blocking: the orchestrator refuses to leave STACK_SELECTION until it is
//! approved. The others record stakeholder sign-off without stopping work.

mod service;
mod types;

pub use service::ApprovalGateService;
pub use specforge_store::GateStatus;
pub use types::{
    ApproveRequest, GATE_DEFINITIONS, GateDefinition, GateName, ProjectGate, RejectRequest,
};
