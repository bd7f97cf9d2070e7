use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::engine::notify::NotificationIntent;
use crate::fleet::Fleet;
use crate::models::notification::Notification;
use crate::observability::metrics::Metrics;
use crate::store::DispatchStore;

pub struct AppState {
    pub fleet: Fleet,
    pub store: DispatchStore,
    /// Delivered notifications, keyed by recipient.
    pub inbox: DashMap<Uuid, Vec<Notification>>,
    pub notification_tx: mpsc::Sender<NotificationIntent>,
    pub notification_events_tx: broadcast::Sender<Notification>,
    pub auto_assign: bool,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        notification_queue_size: usize,
        event_buffer_size: usize,
        auto_assign: bool,
    ) -> (Self, mpsc::Receiver<NotificationIntent>) {
        let (notification_tx, notification_rx) = mpsc::channel(notification_queue_size);
        let (notification_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        (
            Self {
                fleet: Fleet::new(),
                store: DispatchStore::new(),
                inbox: DashMap::new(),
                notification_tx,
                notification_events_tx,
                auto_assign,
                metrics: Metrics::new(),
            },
            notification_rx,
        )
    }
}
