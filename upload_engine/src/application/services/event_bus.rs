// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Publish/subscribe hub for `UploadEvent`s, backed by a `tokio::sync::broadcast`
//! channel. Subscribers may join late (they only see events published after
//! they subscribe) and must tolerate out-of-order delivery of progress events
//! within a single tick; the bus itself makes no ordering guarantee beyond
//! "published in the order `publish` was called".

use tokio::sync::broadcast;
use upload_engine_domain::UploadEvent;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<UploadEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventBus { sender }
    }

    /// Publishes an event to every current subscriber. A slow subscriber
    /// that falls behind `capacity` events loses the oldest ones (lagged
    /// receivers observe `RecvError::Lagged`, not a blocked publisher); this
    /// keeps the single-threaded cooperative scheduler from ever stalling
    /// on a subscriber that never polls.
    pub fn publish(&self, event: UploadEvent) {
        // No active subscribers is not an error: events are fire-and-forget.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upload_engine_domain::value_objects::FileId;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(UploadEvent::FileUploadStart {
            file_id: FileId::from_parts("a.bin", 10, None, "d"),
            file: upload_engine_domain::value_objects::FileHandle::new("a.bin", 10),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, UploadEvent::FileUploadStart { .. }));
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(UploadEvent::QueueChange { queue_len: 0, active: 0 });
    }

    #[tokio::test]
    async fn late_subscriber_does_not_see_earlier_events() {
        let bus = EventBus::new();
        bus.publish(UploadEvent::QueueChange { queue_len: 1, active: 0 });
        let mut rx = bus.subscribe();
        bus.publish(UploadEvent::QueueChange { queue_len: 2, active: 1 });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, UploadEvent::QueueChange { queue_len: 2, .. }));
    }
}
