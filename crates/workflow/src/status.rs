//! Action status machine.

use thiserror::Error;

/// The lifecycle state of an action.
///
/// ```text
/// PENDING ──start──► RUNNING ──ok──────────────► SUCCESS
///    │                  ├──err (low severity)──► WARNING
///    │                  ├──err (normal)────────► FAILURE
///    │                  └──skip────────────────► SKIPPED
///    ├──skip (scheduler, strict ancestor)──────► SKIPPED
///    └──disable────────────────────────────────► OMITTED
/// ```
///
/// Transitions out of a terminal state are forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionStatus {
    /// Created, not yet scheduled.
    Pending,
    /// Handler is executing.
    Running,
    /// Finished cleanly.
    Success,
    /// Failed with low severity.
    Warning,
    /// Failed.
    Failure,
    /// Skipped, either by its handler or by the scheduler after a
    /// strict ancestor failed or was skipped.
    Skipped,
    /// Disabled during the interactive plan phase; never ran.
    Omitted,
}

impl ActionStatus {
    /// Returns `true` once the action can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Warning | Self::Failure | Self::Skipped | Self::Omitted
        )
    }

    /// Returns `true` for the one status that makes the whole run fail.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }

    /// Whether `self → to` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Omitted)
                | (Self::Pending, Self::Skipped)
                | (
                    Self::Running,
                    Self::Success | Self::Warning | Self::Failure | Self::Skipped
                )
        )
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Failure => "FAILURE",
            Self::Skipped => "SKIPPED",
            Self::Omitted => "OMITTED",
        };
        write!(f, "{text}")
    }
}

/// An illegal status transition.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid transition from {from} to {to}")]
pub struct TransitionError {
    /// Status at the moment of the attempt.
    pub from: ActionStatus,
    /// The rejected target status.
    pub to: ActionStatus,
}

/// How a handler failure is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    /// Failure produces FAILURE and fails the run.
    #[default]
    Normal,
    /// Failure produces WARNING and does not fail the run.
    Low,
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            other => Err(format!(
                "unknown severity {other:?} (expected \"normal\" or \"low\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ActionStatus::Success.is_terminal());
        assert!(ActionStatus::Warning.is_terminal());
        assert!(ActionStatus::Failure.is_terminal());
        assert!(ActionStatus::Skipped.is_terminal());
        assert!(ActionStatus::Omitted.is_terminal());

        assert!(!ActionStatus::Pending.is_terminal());
        assert!(!ActionStatus::Running.is_terminal());
    }

    #[test]
    fn only_failure_fails_the_run() {
        assert!(ActionStatus::Failure.is_failure());
        for status in [
            ActionStatus::Success,
            ActionStatus::Warning,
            ActionStatus::Skipped,
            ActionStatus::Omitted,
        ] {
            assert!(!status.is_failure(), "{status} must not fail the run");
        }
    }

    #[test]
    fn legal_transitions() {
        assert!(ActionStatus::Pending.can_transition_to(ActionStatus::Running));
        assert!(ActionStatus::Pending.can_transition_to(ActionStatus::Omitted));
        assert!(ActionStatus::Pending.can_transition_to(ActionStatus::Skipped));
        assert!(ActionStatus::Running.can_transition_to(ActionStatus::Success));
        assert!(ActionStatus::Running.can_transition_to(ActionStatus::Warning));
        assert!(ActionStatus::Running.can_transition_to(ActionStatus::Failure));
        assert!(ActionStatus::Running.can_transition_to(ActionStatus::Skipped));
    }

    #[test]
    fn terminal_states_are_frozen() {
        for from in [
            ActionStatus::Success,
            ActionStatus::Warning,
            ActionStatus::Failure,
            ActionStatus::Skipped,
            ActionStatus::Omitted,
        ] {
            for to in [
                ActionStatus::Pending,
                ActionStatus::Running,
                ActionStatus::Success,
                ActionStatus::Failure,
            ] {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn disable_is_only_legal_from_pending() {
        assert!(!ActionStatus::Running.can_transition_to(ActionStatus::Omitted));
        assert!(!ActionStatus::Success.can_transition_to(ActionStatus::Omitted));
    }

    #[test]
    fn display_is_uppercase() {
        assert_eq!(ActionStatus::Pending.to_string(), "PENDING");
        assert_eq!(ActionStatus::Omitted.to_string(), "OMITTED");
    }

    #[test]
    fn severity_parsing() {
        assert_eq!("normal".parse::<Severity>().unwrap(), Severity::Normal);
        assert_eq!("low".parse::<Severity>().unwrap(), Severity::Low);
        assert!("high".parse::<Severity>().is_err());
    }
}
