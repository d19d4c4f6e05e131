//! I define the post-commit event dispatcher and the handler
//! trait for projections.
//!

use std::sync::Arc;

use async_trait::async_trait;
use kosha_space::event::EventRecord;
use tracing::{debug, error};

/// A type-erased handler error.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A projection handler, invoked for each committed event
/// record.
///
/// Commit is at-least-once with respect to handlers: a handler
/// may observe a record more than once across process
/// restarts, and MUST be idempotent. Handlers run on the
/// committing task, and must not acquire locks the committer
/// may hold.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Name of the handler, for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this handler is interested in given event type.
    fn is_interested_in(&self, event_type: &str) -> bool;

    /// Apply given record to the projection.
    async fn handle(&self, record: &EventRecord) -> Result<(), HandlerError>;
}

/// The event dispatcher: invokes registered handlers
/// synchronously, in registration order.
///
/// Handler failures are logged and swallowed; they never roll
/// back, nor fail, the originating commit.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field(
                "handlers",
                &self.handlers.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl EventDispatcher {
    /// Create a new dispatcher with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register given handler. Handlers run in registration
    /// order.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Dispatch given committed records to all interested
    /// handlers.
    pub async fn dispatch(&self, records: &[EventRecord]) {
        for record in records {
            for handler in &self.handlers {
                if !handler.is_interested_in(&record.event_type) {
                    continue;
                }
                debug!(
                    "Dispatching {} event {} to handler {}.",
                    record.event_type,
                    record.event_id,
                    handler.name()
                );
                if let Err(e) = handler.handle(record).await {
                    error!(
                        "Handler {} failed on event {}. {}",
                        handler.name(),
                        record.event_id,
                        e
                    );
                }
            }
        }
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------

#[cfg(test)]
mod tests {
    use kosha_space::{event::DomainEvent, OpaqueId};
    use tokio::sync::Mutex;

    use super::*;

    struct Recording {
        name: &'static str,
        seen: Arc<Mutex<Vec<(&'static str, String)>>>,
    }

    #[async_trait]
    impl EventHandler for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_interested_in(&self, event_type: &str) -> bool {
            event_type == "resource_deleted"
        }

        async fn handle(&self, record: &EventRecord) -> Result<(), HandlerError> {
            self.seen
                .lock()
                .await
                .push((self.name, record.event_id.to_string()));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn is_interested_in(&self, _event_type: &str) -> bool {
            true
        }

        async fn handle(&self, _record: &EventRecord) -> Result<(), HandlerError> {
            Err("projection unavailable".into())
        }
    }

    fn sample_record() -> EventRecord {
        EventRecord::new(&DomainEvent::ResourceDeleted {
            id: OpaqueId::generate(),
            parent_id: None,
        })
    }

    #[tokio::test]
    async fn handlers_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Arc::new(Recording {
            name: "first",
            seen: seen.clone(),
        }));
        dispatcher.register(Arc::new(Recording {
            name: "second",
            seen: seen.clone(),
        }));

        let record = sample_record();
        dispatcher.dispatch(std::slice::from_ref(&record)).await;

        let seen = seen.lock().await;
        assert_eq!(
            *seen,
            vec![
                ("first", record.event_id.to_string()),
                ("second", record.event_id.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failures_do_not_stop_later_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Arc::new(Failing));
        dispatcher.register(Arc::new(Recording {
            name: "after-failing",
            seen: seen.clone(),
        }));

        dispatcher.dispatch(&[sample_record()]).await;
        assert_eq!(seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn uninterested_handlers_are_skipped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Arc::new(Recording {
            name: "selective",
            seen: seen.clone(),
        }));

        let record = EventRecord::new(&DomainEvent::UserDeleted {
            id: OpaqueId::generate(),
        });
        dispatcher.dispatch(&[record]).await;
        assert!(seen.lock().await.is_empty());
    }
}
