use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one index maintainer.
///
/// ```text
/// Idle ─► Initializing ─► Initialized ─► Monitoring
///              │                              │
///              └────────► Error ◄─────────────┘
///                           │                 │
///                           └─► Disposing ◄───┘ ─► Disposed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Idle,
    Initializing,
    Initialized,
    Monitoring,
    Error,
    Disposing,
    Disposed,
}

impl IndexStatus {
    pub const fn can_transition_to(self, next: IndexStatus) -> bool {
        use IndexStatus::*;
        matches!(
            (self, next),
            (Idle | Disposed, Initializing)
                | (Initializing, Initialized)
                | (Initialized, Monitoring)
                | (Initializing | Initialized | Monitoring, Error)
                | (Initializing | Initialized | Monitoring | Error, Disposing)
                | (Disposing, Disposed)
        )
    }

    /// Only a stopped maintainer may be (re)started or reconfigured.
    pub const fn is_stopped(self) -> bool {
        matches!(self, IndexStatus::Idle | IndexStatus::Disposed)
    }

    pub const fn is_serving(self) -> bool {
        matches!(self, IndexStatus::Initialized | IndexStatus::Monitoring)
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexStatus::Idle => "idle",
            IndexStatus::Initializing => "initializing",
            IndexStatus::Initialized => "initialized",
            IndexStatus::Monitoring => "monitoring",
            IndexStatus::Error => "error",
            IndexStatus::Disposing => "disposing",
            IndexStatus::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::IndexStatus::*;

    #[test]
    fn happy_path_transitions() {
        assert!(Idle.can_transition_to(Initializing));
        assert!(Initializing.can_transition_to(Initialized));
        assert!(Initialized.can_transition_to(Monitoring));
        assert!(Monitoring.can_transition_to(Disposing));
        assert!(Disposing.can_transition_to(Disposed));
        assert!(Disposed.can_transition_to(Initializing));
    }

    #[test]
    fn failures_and_illegal_moves() {
        assert!(Initializing.can_transition_to(Error));
        assert!(Monitoring.can_transition_to(Error));
        assert!(Error.can_transition_to(Disposing));
        assert!(!Error.can_transition_to(Initializing));
        assert!(!Monitoring.can_transition_to(Initializing));
        assert!(!Idle.can_transition_to(Monitoring));
        assert!(!Idle.can_transition_to(Disposing));
        assert!(!Disposed.can_transition_to(Monitoring));
    }

    #[test]
    fn only_idle_and_disposed_are_stopped() {
        for status in [Initializing, Initialized, Monitoring, Error, Disposing] {
            assert!(!status.is_stopped());
        }
        assert!(Idle.is_stopped());
        assert!(Disposed.is_stopped());
    }
}
