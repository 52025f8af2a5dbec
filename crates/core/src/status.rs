//! Session lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a detection session.
///
/// The only legal transitions are `Processing -> Completed` and
/// `Processing -> Error`. Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Processing,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }

    /// `true` for `Completed` and `Error`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Processing)
    }

    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        self == SessionStatus::Processing && next.is_terminal()
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
