use serde::{Deserialize, Serialize};
use std::fmt;

/// Version-control capability, resolved once per [`GitIntegration`](crate::GitIntegration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitMode {
    /// Repository with a reachable remote: commit, push, tag and push tags.
    FullIntegration,
    /// Repository without a reachable remote: commit and tag locally.
    LocalOnly,
    /// Not a repository, disabled by configuration, or detection failed.
    Disabled,
}

impl GitMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullIntegration => "full_integration",
            Self::LocalOnly => "local_only",
            Self::Disabled => "disabled",
        }
    }

    /// Whether local repository operations (branch, commit, tag) are allowed.
    #[must_use]
    pub const fn can_commit(self) -> bool {
        match self {
            Self::FullIntegration | Self::LocalOnly => true,
            Self::Disabled => false,
        }
    }

    /// Whether pushes to the remote are attempted.
    #[must_use]
    pub const fn can_push(self) -> bool {
        match self {
            Self::FullIntegration => true,
            Self::LocalOnly | Self::Disabled => false,
        }
    }
}

impl fmt::Display for GitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
