// libs/booking-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{BookingError, SessionStatus};

/// Guards session status transitions. Sessions are soft-retired, so both
/// `completed` and `cancelled` are terminal; rows never leave the store.
pub struct SessionLifecycleService;

impl SessionLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: &SessionStatus,
        new_status: &SessionStatus,
    ) -> Result<(), BookingError> {
        debug!("Validating status transition from {:?} to {:?}", current_status, new_status);

        let valid_transitions = self.get_valid_transitions(current_status);

        if !valid_transitions.contains(new_status) {
            warn!("Invalid status transition attempted: {:?} -> {:?}", current_status, new_status);
            return Err(BookingError::InvalidStatusTransition(*current_status));
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: &SessionStatus) -> Vec<SessionStatus> {
        match current_status {
            SessionStatus::Scheduled => vec![
                SessionStatus::Completed,
                SessionStatus::Cancelled,
            ],
            // Terminal states - no transitions allowed
            SessionStatus::Completed => vec![],
            SessionStatus::Cancelled => vec![],
        }
    }
}

impl Default for SessionLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn scheduled_can_complete_or_cancel() {
        let lifecycle = SessionLifecycleService::new();
        assert!(lifecycle
            .validate_status_transition(&SessionStatus::Scheduled, &SessionStatus::Completed)
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(&SessionStatus::Scheduled, &SessionStatus::Cancelled)
            .is_ok());
    }

    #[test]
    fn terminal_states_reject_everything() {
        let lifecycle = SessionLifecycleService::new();
        for terminal in [SessionStatus::Completed, SessionStatus::Cancelled] {
            for target in [
                SessionStatus::Scheduled,
                SessionStatus::Completed,
                SessionStatus::Cancelled,
            ] {
                assert_matches!(
                    lifecycle.validate_status_transition(&terminal, &target),
                    Err(BookingError::InvalidStatusTransition(_))
                );
            }
        }
    }
}
