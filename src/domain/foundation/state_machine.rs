//! State machine trait for status enums.
//!
//! Provides a consistent interface for validating and performing state
//! transitions of lifecycle statuses such as the web services session.

use super::ClientError;

/// Trait for status enums that represent state machines.
///
/// Implementors define valid state transitions and get validated
/// transition methods for free.
///
/// # Example
///
/// ```ignore
/// let next = SessionStatus::Unauthenticated.transition_to(SessionStatus::Challenged)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ClientError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ClientError::validation(format!(
                "cannot transition from {:?} to {:?}",
                self, target
            )))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Door {
        Open,
        Closed,
        Locked,
        Welded,
    }

    impl StateMachine for Door {
        fn can_transition_to(&self, target: &Self) -> bool {
            use Door::*;
            matches!(
                (self, target),
                (Open, Closed) | (Closed, Open) | (Closed, Locked) | (Locked, Closed) | (Locked, Welded)
            )
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use Door::*;
            match self {
                Open => vec![Closed],
                Closed => vec![Open, Locked],
                Locked => vec![Closed, Welded],
                Welded => vec![],
            }
        }
    }

    #[test]
    fn transition_to_succeeds_for_valid_transition() {
        assert_eq!(Door::Open.transition_to(Door::Closed).unwrap(), Door::Closed);
    }

    #[test]
    fn transition_to_fails_with_validation_error() {
        let err = Door::Open.transition_to(Door::Locked).unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
        assert!(err.to_string().contains("Open"));
    }

    #[test]
    fn is_terminal_only_for_states_without_exits() {
        assert!(Door::Welded.is_terminal());
        assert!(!Door::Locked.is_terminal());
    }
}
