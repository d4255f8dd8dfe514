use crate::error::ReviewError;
use crate::proposal::ProposalStatus;

/// Validates a status transition.
///
/// `Processing -> Pending` is the rollback edge taken when an apply fails.
pub fn validate_transition(from: ProposalStatus, to: ProposalStatus) -> Result<(), ReviewError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(ReviewError::IllegalTransition { from, to })
    }
}

/// Statuses reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: ProposalStatus) -> Vec<ProposalStatus> {
    use ProposalStatus::{Approved, Pending, Processing, Rejected};
    match from {
        Pending => vec![Processing],
        Processing => vec![Approved, Rejected, Pending],
        Approved | Rejected => vec![],
    }
}

fn allowed(from: ProposalStatus, to: ProposalStatus) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_processing_leaves_pending() {
        assert!(validate_transition(ProposalStatus::Pending, ProposalStatus::Processing).is_ok());
        assert!(validate_transition(ProposalStatus::Pending, ProposalStatus::Approved).is_err());
        assert!(validate_transition(ProposalStatus::Pending, ProposalStatus::Rejected).is_err());
    }

    #[test]
    fn rollback_edge() {
        assert!(validate_transition(ProposalStatus::Processing, ProposalStatus::Pending).is_ok());
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [ProposalStatus::Approved, ProposalStatus::Rejected] {
            assert!(allowed_transitions(terminal).is_empty());
            for to in ProposalStatus::ALL {
                assert!(validate_transition(terminal, to).is_err());
            }
        }
    }
}
