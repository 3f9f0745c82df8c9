//! State machine trait for status enums.
//!
//! Gives intent and membership statuses one table-driven interface for
//! validating transitions.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors list their legal edges once in `valid_transitions`;
/// `can_transition_to` and `transition_to` derive from that table.
///
/// # Example
///
/// ```ignore
/// let next = IntentStatus::Initiated.transition_to(IntentStatus::PaidPendingVerification)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug + 'static {
    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> &'static [Self];

    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
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
    enum Light {
        Red,
        Green,
        Off,
    }

    impl StateMachine for Light {
        fn valid_transitions(&self) -> &'static [Self] {
            match self {
                Light::Red => &[Light::Green, Light::Off],
                Light::Green => &[Light::Red],
                Light::Off => &[],
            }
        }
    }

    #[test]
    fn transition_follows_table() {
        assert_eq!(Light::Red.transition_to(Light::Green), Ok(Light::Green));
        assert!(Light::Green.transition_to(Light::Off).is_err());
    }

    #[test]
    fn terminal_state_has_no_edges() {
        assert!(Light::Off.is_terminal());
        assert!(!Light::Red.is_terminal());
    }
}
