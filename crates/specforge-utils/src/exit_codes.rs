//! Exit code constants and error kind mapping for specforge.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `INVALID_INPUT` | Invalid phase, gate name, argument or configuration |
//! | 3 | `NOT_FOUND` | Project or snapshot does not exist |
//! | 4 | `CONFLICT` | Blocked gate, terminal phase, rollback depth exceeded |
//! | 9 | `LOCK_HELD` | Another request holds the project lock |
//! | 70 | `DEPENDENCY_FAILURE` | Git, LLM or storage dependency failed |

use crate::types::ErrorKind;

/// Exit codes matching the documented exit code table.
///
/// # Example
///
/// ```rust
/// use specforge_utils::exit_codes::ExitCode;
/// use specforge_utils::types::ErrorKind;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::from_kind(ErrorKind::Locked), ExitCode::LOCK_HELD);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Invalid input - bad phase, gate name, argument or configuration
    pub const INVALID_INPUT: ExitCode = ExitCode(2);

    /// Not found - project or snapshot does not exist
    pub const NOT_FOUND: ExitCode = ExitCode(3);

    /// Conflict - request refused by current project state
    pub const CONFLICT: ExitCode = ExitCode(4);

    /// Lock held - another request is mutating the same project
    pub const LOCK_HELD: ExitCode = ExitCode(9);

    /// Dependency failure - git, LLM or storage failed
    pub const DEPENDENCY_FAILURE: ExitCode = ExitCode(70);

    /// Get the numeric exit code value.
    ///
    /// Use this with `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Map an error kind to its exit code.
    #[must_use]
    pub const fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Validation => Self::INVALID_INPUT,
            ErrorKind::NotFound => Self::NOT_FOUND,
            ErrorKind::Conflict => Self::CONFLICT,
            ErrorKind::Locked => Self::LOCK_HELD,
            ErrorKind::Dependency => Self::DEPENDENCY_FAILURE,
            ErrorKind::Internal => Self::INTERNAL,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_distinct_code() {
        let kinds = [
            ErrorKind::Validation,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::Locked,
            ErrorKind::Dependency,
            ErrorKind::Internal,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|k| ExitCode::from_kind(*k).as_i32()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0));
    }
}
