//! Legal trip lifecycle.
//!
//! ```text
//! PENDING --assign--> ASSIGNED --accept--> ACCEPTED --start--> IN_PROGRESS --finish--> COMPLETED
//!    ^                 |  ^                   |
//!    +--reject/unassign+  +-----reassign------+
//!
//! PENDING | ASSIGNED | ACCEPTED --cancel--> CANCELLED
//! ```

use std::fmt;

use crate::error::AppError;
use crate::models::trip::TripState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripEvent {
    Assign,
    Accept,
    Reject,
    Reassign,
    Unassign,
    Start,
    Finish,
    Cancel,
}

impl TripEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            TripEvent::Assign => "assign",
            TripEvent::Accept => "accept",
            TripEvent::Reject => "reject",
            TripEvent::Reassign => "reassign",
            TripEvent::Unassign => "unassign",
            TripEvent::Start => "start",
            TripEvent::Finish => "finish",
            TripEvent::Cancel => "cancel",
        }
    }
}

impl fmt::Display for TripEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn next_state(current: TripState, event: TripEvent) -> Option<TripState> {
    use TripState::*;

    match event {
        TripEvent::Assign => match current {
            Pending => Some(Assigned),
            Assigned | Accepted | InProgress | Completed | Cancelled => None,
        },
        TripEvent::Accept => match current {
            Assigned => Some(Accepted),
            Pending | Accepted | InProgress | Completed | Cancelled => None,
        },
        TripEvent::Reject => match current {
            Assigned => Some(Pending),
            Pending | Accepted | InProgress | Completed | Cancelled => None,
        },
        TripEvent::Reassign => match current {
            Assigned | Accepted => Some(Assigned),
            Pending | InProgress | Completed | Cancelled => None,
        },
        TripEvent::Unassign => match current {
            Assigned | Accepted => Some(Pending),
            Pending | InProgress | Completed | Cancelled => None,
        },
        TripEvent::Start => match current {
            Accepted => Some(InProgress),
            Pending | Assigned | InProgress | Completed | Cancelled => None,
        },
        TripEvent::Finish => match current {
            InProgress => Some(Completed),
            Pending | Assigned | Accepted | Completed | Cancelled => None,
        },
        TripEvent::Cancel => match current {
            Pending | Assigned | Accepted => Some(Cancelled),
            InProgress | Completed | Cancelled => None,
        },
    }
}

/// Resolves the target state or fails with `InvalidTransition`.
pub fn ensure(current: TripState, event: TripEvent) -> Result<TripState, AppError> {
    next_state(current, event).ok_or_else(|| {
        AppError::InvalidTransition(format!("cannot {event} a trip in state {current:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::{ensure, next_state, TripEvent};
    use crate::models::trip::TripState;

    const ALL_STATES: [TripState; 6] = [
        TripState::Pending,
        TripState::Assigned,
        TripState::Accepted,
        TripState::InProgress,
        TripState::Completed,
        TripState::Cancelled,
    ];

    const ALL_EVENTS: [TripEvent; 8] = [
        TripEvent::Assign,
        TripEvent::Accept,
        TripEvent::Reject,
        TripEvent::Reassign,
        TripEvent::Unassign,
        TripEvent::Start,
        TripEvent::Finish,
        TripEvent::Cancel,
    ];

    #[test]
    fn happy_path_reaches_completed() {
        let mut state = TripState::Pending;
        for event in [
            TripEvent::Assign,
            TripEvent::Accept,
            TripEvent::Start,
            TripEvent::Finish,
        ] {
            state = ensure(state, event).unwrap();
        }
        assert_eq!(state, TripState::Completed);
    }

    #[test]
    fn terminal_states_accept_no_event() {
        for state in [TripState::Completed, TripState::Cancelled] {
            for event in ALL_EVENTS {
                assert_eq!(next_state(state, event), None, "{state:?} on {event}");
            }
        }
    }

    #[test]
    fn pending_only_leaves_via_assign_or_cancel() {
        let reachable: Vec<_> = ALL_EVENTS
            .iter()
            .filter_map(|event| next_state(TripState::Pending, *event).map(|to| (*event, to)))
            .collect();

        assert_eq!(
            reachable,
            vec![
                (TripEvent::Assign, TripState::Assigned),
                (TripEvent::Cancel, TripState::Cancelled),
            ]
        );
    }

    #[test]
    fn reassign_from_accepted_returns_to_assigned() {
        assert_eq!(
            next_state(TripState::Accepted, TripEvent::Reassign),
            Some(TripState::Assigned)
        );
        assert_eq!(
            next_state(TripState::Assigned, TripEvent::Reassign),
            Some(TripState::Assigned)
        );
        assert_eq!(next_state(TripState::InProgress, TripEvent::Reassign), None);
    }

    #[test]
    fn in_progress_cannot_be_cancelled_or_unassigned() {
        assert_eq!(next_state(TripState::InProgress, TripEvent::Cancel), None);
        assert_eq!(next_state(TripState::InProgress, TripEvent::Unassign), None);
        assert_eq!(next_state(TripState::InProgress, TripEvent::Reject), None);
    }

    #[test]
    fn invalid_transition_names_event_and_state() {
        let err = ensure(TripState::Completed, TripEvent::Accept).unwrap_err();
        assert_eq!(err.reason(), "invalid_transition");
        assert!(err.to_string().contains("accept"));
        assert!(err.to_string().contains("Completed"));
    }

    #[test]
    fn every_state_has_a_defined_answer_for_every_event() {
        let legal = ALL_STATES
            .iter()
            .flat_map(|state| ALL_EVENTS.iter().map(move |event| (*state, *event)))
            .filter(|(state, event)| next_state(*state, *event).is_some())
            .count();

        // 1 assign + 1 accept + 1 reject + 2 reassign + 2 unassign + 1 start + 1 finish + 3 cancel
        assert_eq!(legal, 12);
    }
}
