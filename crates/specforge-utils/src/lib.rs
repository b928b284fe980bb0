//! Foundation types shared by every specforge crate: the canonical phase
//! order, the error taxonomy, exit codes, logging setup and canonical JSON.

pub mod atomic_write;
pub mod canonicalization;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
