//! Post-commit notifications.
//!
//! Engine operations queue an intent once their transaction has returned. A
//! full or closed queue is logged and dropped; it never undoes the dispatch
//! change that produced it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::trip::Trip;
use crate::state::AppState;

const SCHEDULE_FORMAT: &str = "%d/%m/%Y %H:%M";

#[derive(Debug, Clone)]
pub struct NotificationIntent {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub trip_id: Uuid,
    pub message: String,
}

pub fn trip_assigned(state: &AppState, trip: &Trip, driver_id: Uuid) -> NotificationIntent {
    NotificationIntent {
        recipient_id: driver_id,
        kind: NotificationKind::TripAssigned,
        trip_id: trip.id,
        message: format!(
            "New trip assigned: {} on {}",
            route_label(state, trip),
            schedule_label(trip.scheduled_for)
        ),
    }
}

pub fn trip_accepted(state: &AppState, trip: &Trip) -> NotificationIntent {
    NotificationIntent {
        recipient_id: trip.requested_by,
        kind: NotificationKind::TripAccepted,
        trip_id: trip.id,
        message: format!(
            "Your trip {} on {} was accepted by the driver",
            route_label(state, trip),
            schedule_label(trip.scheduled_for)
        ),
    }
}

fn route_label(state: &AppState, trip: &Trip) -> String {
    state
        .fleet
        .route(trip.route_id)
        .map(|route| route.name)
        .unwrap_or_else(|_| trip.route_id.to_string())
}

fn schedule_label(at: DateTime<Utc>) -> String {
    at.format(SCHEDULE_FORMAT).to_string()
}

/// Queues an intent without waiting. Returns whether it was accepted.
pub fn emit(state: &AppState, intent: NotificationIntent) -> bool {
    let recipient_id = intent.recipient_id;
    let trip_id = intent.trip_id;

    match state.notification_tx.try_send(intent) {
        Ok(()) => {
            state.metrics.notifications_pending.inc();
            true
        }
        Err(TrySendError::Full(_)) => {
            warn!(%recipient_id, %trip_id, "notification queue full; dropping notification");
            false
        }
        Err(TrySendError::Closed(_)) => {
            warn!(%recipient_id, %trip_id, "notification queue closed; dropping notification");
            false
        }
    }
}

pub async fn run_notification_dispatcher(
    state: Arc<AppState>,
    mut notification_rx: mpsc::Receiver<NotificationIntent>,
) {
    info!("notification dispatcher started");

    while let Some(intent) = notification_rx.recv().await {
        state.metrics.notifications_pending.dec();
        deliver(&state, intent);
    }

    warn!("notification dispatcher stopped: queue channel closed");
}

pub fn deliver(state: &AppState, intent: NotificationIntent) -> Notification {
    let notification = Notification {
        id: Uuid::new_v4(),
        recipient_id: intent.recipient_id,
        kind: intent.kind,
        trip_id: intent.trip_id,
        message: intent.message,
        created_at: Utc::now(),
        read: false,
    };

    state
        .inbox
        .entry(notification.recipient_id)
        .or_default()
        .push(notification.clone());

    if state
        .notification_events_tx
        .send(notification.clone())
        .is_err()
    {
        debug!(notification_id = %notification.id, "no websocket subscribers");
    }

    info!(
        notification_id = %notification.id,
        recipient_id = %notification.recipient_id,
        trip_id = %notification.trip_id,
        kind = ?notification.kind,
        "notification delivered"
    );

    notification
}

/// The recipient's notifications, newest first.
pub fn inbox_of(state: &AppState, recipient_id: Uuid, unread_only: bool) -> Vec<Notification> {
    let mut notifications: Vec<Notification> = state
        .inbox
        .get(&recipient_id)
        .map(|entry| {
            entry
                .value()
                .iter()
                .filter(|notification| !unread_only || !notification.read)
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notifications
}

pub fn mark_read(
    state: &AppState,
    caller_id: Uuid,
    notification_id: Uuid,
) -> Result<Notification, AppError> {
    if let Some(mut entry) = state.inbox.get_mut(&caller_id) {
        if let Some(notification) = entry.iter_mut().find(|n| n.id == notification_id) {
            notification.read = true;
            return Ok(notification.clone());
        }
    }

    Err(missing_from_inbox(state, notification_id))
}

/// Returns how many notifications changed from unread to read.
pub fn mark_all_read(state: &AppState, caller_id: Uuid) -> usize {
    let Some(mut entry) = state.inbox.get_mut(&caller_id) else {
        return 0;
    };

    let mut marked = 0;
    for notification in entry.iter_mut().filter(|n| !n.read) {
        notification.read = true;
        marked += 1;
    }

    debug!(%caller_id, marked, "notifications marked read");
    marked
}

pub fn delete_notification(
    state: &AppState,
    caller_id: Uuid,
    notification_id: Uuid,
) -> Result<(), AppError> {
    if let Some(mut entry) = state.inbox.get_mut(&caller_id) {
        let before = entry.len();
        entry.retain(|n| n.id != notification_id);
        if entry.len() < before {
            info!(%caller_id, %notification_id, "notification deleted");
            return Ok(());
        }
    }

    Err(missing_from_inbox(state, notification_id))
}

// Callers must not hold an inbox guard here.
fn missing_from_inbox(state: &AppState, notification_id: Uuid) -> AppError {
    let owned_elsewhere = state
        .inbox
        .iter()
        .any(|entry| entry.value().iter().any(|n| n.id == notification_id));

    if owned_elsewhere {
        AppError::Forbidden(format!("notification {notification_id} belongs to another user"))
    } else {
        AppError::NotFound(format!("notification {notification_id} not found"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::{
        delete_notification, deliver, emit, inbox_of, mark_all_read, mark_read, trip_accepted,
        trip_assigned, NotificationIntent,
    };
    use crate::models::notification::NotificationKind;
    use crate::models::trip::{Trip, TripState};
    use crate::state::AppState;

    fn trip(route_id: Uuid) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            hotel_id: Uuid::new_v4(),
            route_id,
            requested_by: Uuid::new_v4(),
            requested_at: Utc::now(),
            scheduled_for: Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap(),
            state: TripState::Assigned,
        }
    }

    #[test]
    fn messages_name_route_and_schedule() {
        let (state, _rx) = AppState::new(8, 8, true);
        let hotel = state.fleet.register_hotel("Harbour").unwrap();
        let route = state
            .fleet
            .register_route(hotel.id, "Airport", "Lobby", "Terminal 2")
            .unwrap();
        let trip = trip(route.id);
        let driver = Uuid::new_v4();

        let assigned = trip_assigned(&state, &trip, driver);
        assert_eq!(assigned.recipient_id, driver);
        assert_eq!(assigned.kind, NotificationKind::TripAssigned);
        assert!(assigned.message.contains("Airport"));
        assert!(assigned.message.contains("01/05/2026 09:30"));

        let accepted = trip_accepted(&state, &trip);
        assert_eq!(accepted.recipient_id, trip.requested_by);
        assert_eq!(accepted.kind, NotificationKind::TripAccepted);
    }

    #[test]
    fn full_queue_drops_without_error() {
        let (state, _rx) = AppState::new(1, 8, true);
        let intent = NotificationIntent {
            recipient_id: Uuid::new_v4(),
            kind: NotificationKind::TripAssigned,
            trip_id: Uuid::new_v4(),
            message: "hello".to_string(),
        };

        assert!(emit(&state, intent.clone()));
        assert!(!emit(&state, intent));
        assert_eq!(state.metrics.notifications_pending.get(), 1);
    }

    #[tokio::test]
    async fn delivered_notifications_land_in_inbox_and_stream() {
        let (state, mut rx) = AppState::new(8, 8, true);
        let mut events = state.notification_events_tx.subscribe();
        let recipient = Uuid::new_v4();

        emit(
            &state,
            NotificationIntent {
                recipient_id: recipient,
                kind: NotificationKind::TripAssigned,
                trip_id: Uuid::new_v4(),
                message: "trip for you".to_string(),
            },
        );

        let intent = rx.recv().await.unwrap();
        let delivered = deliver(&state, intent);

        let inbox = inbox_of(&state, recipient, false);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, delivered.id);
        assert!(!inbox[0].read);
        assert_eq!(events.recv().await.unwrap().id, delivered.id);
        assert!(inbox_of(&state, Uuid::new_v4(), false).is_empty());
    }

    fn delivered_to(state: &AppState, recipient_id: Uuid, count: usize) -> Vec<Uuid> {
        (0..count)
            .map(|i| {
                deliver(
                    state,
                    NotificationIntent {
                        recipient_id,
                        kind: NotificationKind::TripAssigned,
                        trip_id: Uuid::new_v4(),
                        message: format!("trip {i}"),
                    },
                )
                .id
            })
            .collect()
    }

    #[test]
    fn read_flags_filter_the_inbox() {
        let (state, _rx) = AppState::new(8, 8, true);
        let recipient = Uuid::new_v4();
        let ids = delivered_to(&state, recipient, 3);

        let marked = mark_read(&state, recipient, ids[0]).unwrap();
        assert!(marked.read);

        let unread = inbox_of(&state, recipient, true);
        assert_eq!(unread.len(), 2);
        assert!(unread.iter().all(|n| n.id != ids[0]));

        assert_eq!(mark_all_read(&state, recipient), 2);
        assert_eq!(mark_all_read(&state, recipient), 0);
        assert!(inbox_of(&state, recipient, true).is_empty());
        assert_eq!(inbox_of(&state, recipient, false).len(), 3);
    }

    #[test]
    fn only_the_recipient_may_touch_a_notification() {
        let (state, _rx) = AppState::new(8, 8, true);
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let id = delivered_to(&state, owner, 1)[0];
        delivered_to(&state, other, 1);

        let err = mark_read(&state, other, id).unwrap_err();
        assert_eq!(err.reason(), "forbidden");
        let err = delete_notification(&state, other, id).unwrap_err();
        assert_eq!(err.reason(), "forbidden");
        let err = mark_read(&state, owner, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.reason(), "not_found");

        delete_notification(&state, owner, id).unwrap();
        assert!(inbox_of(&state, owner, false).is_empty());
        let err = delete_notification(&state, owner, id).unwrap_err();
        assert_eq!(err.reason(), "not_found");
        assert_eq!(inbox_of(&state, other, false).len(), 1);
    }
}
