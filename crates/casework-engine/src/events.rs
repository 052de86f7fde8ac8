//! Status-change event delivery.
//!
//! The instance tracker publishes a [`TaskStatusChanged`] after each commit.
//! Delivery is a `tokio::sync::broadcast` channel: publishing never blocks,
//! and a slow or failing observer cannot hold up or undo the update it is
//! told about.

use std::sync::Arc;

use async_trait::async_trait;
use casework_types::TaskStatusChanged;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default number of undelivered events a slow subscriber may fall behind by.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Sink for committed status changes.
///
/// Implementations must return promptly; they run on the caller's path
/// right after the commit.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &TaskStatusChanged);
}

/// Failure reported by a [`StatusObserver`]. Logged, never propagated.
#[derive(Debug, Error)]
#[error("{observer}: {message}")]
pub struct ObserverError {
    pub observer: String,
    pub message: String,
}

/// Fire-and-forget consumer of status changes (e.g. an external task mirror).
#[async_trait]
pub trait StatusObserver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn observe(&self, event: &TaskStatusChanged) -> Result<(), ObserverError>;
}

/// Broadcast bus for [`TaskStatusChanged`] events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TaskStatusChanged>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New receiver seeing every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskStatusChanged> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Run `observer` on its own task for every future event.
    ///
    /// Must be called from within a tokio runtime. The task ends when the
    /// bus is dropped.
    pub fn spawn_observer(&self, observer: Arc<dyn StatusObserver>) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = observer.observe(&event).await {
                            warn!(
                                observer = observer.name(),
                                event_id = %event.event_id,
                                error = %e,
                                "Status observer failed (ignored)"
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(observer = observer.name(), skipped, "Status observer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!(observer = observer.name(), "Status observer stopped");
        })
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: &TaskStatusChanged) {
        match self.sender.send(event.clone()) {
            Ok(receivers) => debug!(event_id = %event.event_id, receivers, "Status change published"),
            Err(_) => debug!(event_id = %event.event_id, "Status change published with no subscribers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_types::TaskStatus;
    use parking_lot::Mutex;

    fn event(task: &str) -> TaskStatusChanged {
        TaskStatusChanged::new("inst", "fam", task, TaskStatus::NotStarted, TaskStatus::Completed)
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let bus = EventBus::new(4);
        bus.publish(&event("t1"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_in_order() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.publish(&event("t1"));
        bus.publish(&event("t2"));
        assert_eq!(rx.try_recv().unwrap().task_id, "t1");
        assert_eq!(rx.try_recv().unwrap().task_id, "t2");
        assert!(rx.try_recv().is_err());
    }

    struct Recording {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl StatusObserver for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn observe(&self, event: &TaskStatusChanged) -> Result<(), ObserverError> {
            self.seen.lock().push(event.task_id.clone());
            if self.fail {
                return Err(ObserverError {
                    observer: "recording".into(),
                    message: "mirror unavailable".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failing_observer_keeps_receiving() {
        let bus = EventBus::new(8);
        let observer = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            fail: true,
        });
        let handle = bus.spawn_observer(observer.clone());

        bus.publish(&event("t1"));
        bus.publish(&event("t2"));
        drop(bus);
        handle.await.unwrap();

        assert_eq!(*observer.seen.lock(), vec!["t1", "t2"]);
    }
}
