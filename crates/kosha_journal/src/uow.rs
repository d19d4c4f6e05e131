//! I define the unit of work: the transactional boundary that
//! collects the domain events of one request and commits them
//! atomically, dispatching to projections afterwards.
//!

use std::sync::Arc;

use kosha_space::event::{DomainEvent, EventRecord};
use tracing::debug;

use crate::{dispatch::EventDispatcher, store::EventStore, EventStoreError};

/// A unit of work over the event journal.
///
/// Events registered on the unit are appended to the log in
/// registration order, under a single transaction, when
/// [`commit`](Self::commit) is called. Only after a successful
/// append are the projection handlers invoked. Dropping the
/// unit (or calling [`rollback`](Self::rollback)) discards the
/// registered events with no external side effect.
#[derive(Debug)]
pub struct UnitOfWork {
    store: EventStore,
    dispatcher: Arc<EventDispatcher>,
    pending: Vec<EventRecord>,
}

impl UnitOfWork {
    /// Register given domain event.
    pub fn register(&mut self, event: &DomainEvent) {
        self.pending.push(EventRecord::new(event));
    }

    /// Number of registered, uncommitted events.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Commit the registered events: append them to the log
    /// under one transaction, then dispatch them synchronously
    /// to the projection handlers. Handler failures are logged
    /// but never fail the commit. Returns the committed
    /// records, carrying their assigned sequences.
    pub async fn commit(mut self) -> Result<Vec<EventRecord>, EventStoreError> {
        self.store.append(&mut self.pending).await?;
        self.dispatcher.dispatch(&self.pending).await;
        debug!("Committed {} events.", self.pending.len());
        Ok(self.pending)
    }

    /// Discard the registered events.
    pub fn rollback(self) {
        debug!("Rolled back {} registered events.", self.pending.len());
        // Dropping discards.
    }
}

/// A factory yielding one [`UnitOfWork`] per request.
#[derive(Debug, Clone)]
pub struct UnitOfWorkFactory {
    store: EventStore,
    dispatcher: Arc<EventDispatcher>,
}

impl UnitOfWorkFactory {
    /// Create a new factory over given store and dispatcher.
    pub fn new(store: EventStore, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Begin a fresh unit of work.
    pub fn begin(&self) -> UnitOfWork {
        UnitOfWork {
            store: self.store.clone(),
            dispatcher: self.dispatcher.clone(),
            pending: Vec::new(),
        }
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use claims::assert_ok;
    use kosha_space::OpaqueId;
    use tokio::sync::Mutex;

    use super::*;
    use crate::{
        dispatch::{EventHandler, HandlerError},
        store::tests::{deleted_event, test_store},
    };

    struct Counting {
        count: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl EventHandler for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn is_interested_in(&self, _event_type: &str) -> bool {
            true
        }

        async fn handle(&self, _record: &EventRecord) -> Result<(), HandlerError> {
            *self.count.lock().await += 1;
            Ok(())
        }
    }

    async fn factory_with_counter() -> (UnitOfWorkFactory, EventStore, Arc<Mutex<usize>>) {
        let store = test_store().await;
        let count = Arc::new(Mutex::new(0));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Arc::new(Counting {
            count: count.clone(),
        }));
        (
            UnitOfWorkFactory::new(store.clone(), Arc::new(dispatcher)),
            store,
            count,
        )
    }

    #[tokio::test]
    async fn commit_appends_then_dispatches() {
        let (factory, store, count) = factory_with_counter().await;
        let aggregate_id = OpaqueId::generate();

        let mut uow = factory.begin();
        uow.register(&deleted_event(aggregate_id));
        uow.register(&deleted_event(aggregate_id));

        let committed = assert_ok!(uow.commit().await);
        assert_eq!(committed.len(), 2);
        assert_eq!(*count.lock().await, 2);

        let replayed = store.load_since(aggregate_id, 0).await.unwrap();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0].sequence, 1);
        assert_eq!(replayed[1].sequence, 2);
    }

    #[tokio::test]
    async fn rollback_leaves_no_trace() {
        let (factory, store, count) = factory_with_counter().await;
        let aggregate_id = OpaqueId::generate();

        let mut uow = factory.begin();
        uow.register(&deleted_event(aggregate_id));
        assert_eq!(uow.pending_len(), 1);
        uow.rollback();

        assert_eq!(*count.lock().await, 0);
        assert!(store.load_since(aggregate_id, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_commits_interleave_without_sequence_clashes() {
        let (factory, store, _count) = factory_with_counter().await;
        let aggregate_id = OpaqueId::generate();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let factory = factory.clone();
            handles.push(tokio::spawn(async move {
                let mut uow = factory.begin();
                uow.register(&deleted_event(aggregate_id));
                uow.commit().await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let replayed = store.load_since(aggregate_id, 0).await.unwrap();
        assert_eq!(
            replayed.iter().map(|r| r.sequence).collect::<Vec<_>>(),
            (1..=8).collect::<Vec<i64>>()
        );
    }
}
