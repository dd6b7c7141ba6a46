//! Per-event broadcast channels.
//!
//! One `tokio::sync::broadcast` channel per event room, created lazily on
//! first subscribe or first publish. Publishing to a room with no
//! subscribers is a no-op rather than an error.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use festa_core::models::Notification;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Default)]
pub struct EventBroadcaster {
    rooms: Arc<RwLock<HashMap<Uuid, broadcast::Sender<Notification>>>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to an event room, creating the channel if needed.
    pub async fn subscribe(&self, event_id: Uuid) -> broadcast::Receiver<Notification> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(event_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish a notification to an event room. Best-effort: a room with no
    /// live subscribers silently drops the message.
    pub async fn publish(&self, event_id: Uuid, notification: Notification) {
        let sender = {
            let rooms = self.rooms.read().await;
            rooms.get(&event_id).cloned()
        };

        match sender {
            Some(sender) => {
                let receivers = sender.send(notification.clone()).unwrap_or(0);
                tracing::debug!(
                    event_id = %event_id,
                    kind = notification.kind(),
                    receivers,
                    "Published notification"
                );
            }
            None => {
                tracing::trace!(
                    event_id = %event_id,
                    kind = notification.kind(),
                    "No room for event, notification dropped"
                );
            }
        }
    }

    /// Drop a room's channel once the event is over. Existing receivers see
    /// a closed channel.
    pub async fn close_room(&self, event_id: Uuid) {
        self.rooms.write().await.remove(&event_id);
    }

    /// Number of live subscribers for an event room.
    pub async fn subscriber_count(&self, event_id: Uuid) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(&event_id).map_or(0, |s| s.receiver_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(media_id: Uuid, percentage: i32) -> Notification {
        Notification::ProcessingProgress {
            media_id,
            stage: festa_core::models::ProcessingStage::GeneratingVariants,
            percentage,
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let broadcaster = EventBroadcaster::new();
        broadcaster
            .publish(Uuid::new_v4(), progress(Uuid::new_v4(), 10))
            .await;
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_publish_order() {
        let broadcaster = EventBroadcaster::new();
        let event_id = Uuid::new_v4();
        let media_id = Uuid::new_v4();

        let mut rx = broadcaster.subscribe(event_id).await;
        broadcaster.publish(event_id, progress(media_id, 10)).await;
        broadcaster.publish(event_id, progress(media_id, 45)).await;

        assert_eq!(rx.recv().await.unwrap(), progress(media_id, 10));
        assert_eq!(rx.recv().await.unwrap(), progress(media_id, 45));
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let broadcaster = EventBroadcaster::new();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();

        let mut rx_a = broadcaster.subscribe(room_a).await;
        let mut rx_b = broadcaster.subscribe(room_b).await;

        broadcaster.publish(room_a, progress(Uuid::new_v4(), 70)).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscriber_count() {
        let broadcaster = EventBroadcaster::new();
        let event_id = Uuid::new_v4();
        assert_eq!(broadcaster.subscriber_count(event_id).await, 0);

        let _rx1 = broadcaster.subscribe(event_id).await;
        let _rx2 = broadcaster.subscribe(event_id).await;
        assert_eq!(broadcaster.subscriber_count(event_id).await, 2);
    }
}
