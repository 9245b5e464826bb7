//! Event bus for engine notifications.
//!
//! The engine publishes what happened (generations, sales, finalizations,
//! reversals) and the user-facing notices that go with them. Presentation
//! layers subscribe; the engine never waits for them.
//!
//! Uses tokio broadcast channels for fan-out to multiple receivers.

use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use tokendex_domain::ItemId;

/// How long a notice stays visible
pub const NOTICE_TTL: Duration = Duration::from_secs(5);

// =============================================================================
// Notices
// =============================================================================

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Display lifetime; the presentation layer dismisses it after this
    pub ttl: Duration,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            ttl: NOTICE_TTL,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

// =============================================================================
// Event Types
// =============================================================================

/// Events that flow through the engine event bus.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Collection loaded and migrated
    Loaded { item_count: usize, balance: u64 },

    /// New items persisted and paid for
    Generated {
        items: Vec<ItemId>,
        cost: u64,
        balance: u64,
    },

    /// Sale persisted; undo window opened
    SaleExecuted {
        sale_id: Uuid,
        item_count: usize,
        total_value: u64,
        balance: u64,
    },

    /// A newer sale closed this sale's undo window early
    SaleSuperseded { sale_id: Uuid },

    /// Undo window elapsed
    SaleFinalized { sale_id: Uuid, item_count: usize },

    /// Sale undone
    SaleReversed {
        sale_id: Uuid,
        item_count: usize,
        total_value: u64,
        balance: u64,
    },

    /// Message for the user
    Notice(Notice),
}

// =============================================================================
// Event Bus
// =============================================================================

/// Event bus for engine-wide notifications.
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity.
    ///
    /// Capacity determines how many events can be buffered before
    /// slow receivers start missing events (lagging).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    pub fn send(&self, event: EngineEvent) -> usize {
        // No receivers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    /// Publish a notice.
    pub fn notify(&self, notice: Notice) -> usize {
        self.send(EngineEvent::Notice(notice))
    }

    /// Subscribe to events sent after this call.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Receiver for engine events.
pub struct EventReceiver {
    receiver: broadcast::Receiver<EngineEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` if the bus has been dropped.
    /// Returns error description if the receiver lagged (missed events).
    pub async fn recv(&mut self) -> Option<Result<EngineEvent, String>> {
        match self.receiver.recv().await {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::RecvError::Closed) => None,
            Err(broadcast::error::RecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            },
        }
    }

    /// Try to receive an event without blocking.
    ///
    /// Returns `None` if no event is immediately available.
    pub fn try_recv(&mut self) -> Option<Result<EngineEvent, String>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Closed) => None,
            Err(broadcast::error::TryRecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            },
        }
    }

    /// Drain every event that is immediately available.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some(next) = self.try_recv() {
            if let Ok(event) = next {
                events.push(event);
            }
        }
        events
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_send_recv() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        let sale_id = Uuid::now_v7();
        bus.send(EngineEvent::SaleFinalized { sale_id, item_count: 2 });

        match receiver.recv().await.unwrap().unwrap() {
            EngineEvent::SaleFinalized { sale_id: id, item_count } => {
                assert_eq!(id, sale_id);
                assert_eq!(item_count, 2);
            },
            other => panic!("Expected SaleFinalized, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_event_bus_multiple_receivers() {
        let bus = EventBus::new(10);
        let mut receiver1 = bus.subscribe();
        let mut receiver2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        bus.notify(Notice::success("Sale undone successfully!"));

        let event1 = receiver1.recv().await.unwrap().unwrap();
        let event2 = receiver2.recv().await.unwrap().unwrap();
        assert!(matches!(event1, EngineEvent::Notice(_)));
        assert!(matches!(event2, EngineEvent::Notice(_)));
    }

    #[test]
    fn test_event_bus_no_receivers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.notify(Notice::warning("nobody listening")), 0);
    }

    #[test]
    fn test_notice_ttl() {
        let notice = Notice::error("boom");
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.ttl, Duration::from_secs(5));
    }

    #[test]
    fn test_drain_collects_pending_events() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.notify(Notice::success("one"));
        bus.notify(Notice::success("two"));

        assert_eq!(receiver.drain().len(), 2);
        assert!(receiver.try_recv().is_none());
    }
}
