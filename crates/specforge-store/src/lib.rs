//! Persistence for the orchestration core
//!
//! [`ProjectStore`] is the contract the orchestrator, gate service and
//! rollback logic consume. [`MemoryStore`] backs tests and embedded use;
//! [`FileStore`] keeps one canonical JSON document per project on disk.

mod file;
mod memory;
pub mod model;
mod store;

pub use file::{FileStore, PROJECTS_DIR};
pub use memory::MemoryStore;
pub use model::{GateRecord, GateStatus, PhaseSnapshot, Project, ProjectDocument, slugify};
pub use specforge_utils::error::StoreError;
pub use store::{DocumentBackend, ProjectStore};
