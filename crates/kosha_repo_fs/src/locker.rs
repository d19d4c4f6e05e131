//! I define an in-process advisory locker over names, used to
//! serialize access to individual resource ids.
//!

use std::{hash::Hash, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// An in-process advisory locker over names.
///
/// The lock table is striped by the name's hash through the
/// backing dashmap, so uncontended names don't serialize on a
/// global mutex. Entries are evicted once a name has no
/// holders or waiters; it cannot lock a name across
/// processes.
#[derive(Debug)]
pub struct NameLocker<Name>
where
    Name: Ord + Hash + Clone + Send + Sync + 'static,
{
    lock_table: Arc<DashMap<Name, Arc<RwLock<()>>>>,
}

impl<Name> Default for NameLocker<Name>
where
    Name: Ord + Hash + Clone + Send + Sync + 'static,
{
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// A held lock over a name. Releases (and garbage-collects the
/// table entry, when uncontended) on drop.
#[derive(Debug)]
pub struct NameGuard<Name>
where
    Name: Ord + Hash + Clone + Send + Sync + 'static,
{
    kind: Option<GuardKind>,
    lock: Option<Arc<RwLock<()>>>,
    name: Name,
    lock_table: Arc<DashMap<Name, Arc<RwLock<()>>>>,
}

#[derive(Debug)]
enum GuardKind {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
}

impl<Name> Drop for NameGuard<Name>
where
    Name: Ord + Hash + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        // Release the guard and our ref on the arced lock
        // before attempting eviction.
        self.kind.take();
        self.lock.take();
        NameLocker::evict_if_uncontended(&self.lock_table, &self.name);
    }
}

impl<Name> NameLocker<Name>
where
    Name: Ord + Hash + Clone + Send + Sync + 'static,
{
    /// Create a new locker with an empty lock table.
    pub fn new() -> Self {
        Self {
            lock_table: Arc::new(DashMap::new()),
        }
    }

    /// Get or insert the lock for given name atomically.
    #[inline]
    fn entry(&self, name: Name) -> Arc<RwLock<()>> {
        self.lock_table
            .entry(name)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Acquire a shared lock over given name.
    pub async fn lock_shared(&self, name: Name) -> NameGuard<Name> {
        let lock = self.entry(name.clone());
        let guard = lock.clone().read_owned().await;
        NameGuard {
            kind: Some(GuardKind::Shared(guard)),
            lock: Some(lock),
            name,
            lock_table: self.lock_table.clone(),
        }
    }

    /// Acquire an exclusive lock over given name.
    pub async fn lock_exclusive(&self, name: Name) -> NameGuard<Name> {
        let lock = self.entry(name.clone());
        let guard = lock.clone().write_owned().await;
        NameGuard {
            kind: Some(GuardKind::Exclusive(guard)),
            lock: Some(lock),
            name,
            lock_table: self.lock_table.clone(),
        }
    }

    /// Number of live entries in the lock table.
    pub fn table_len(&self) -> usize {
        self.lock_table.len()
    }

    /// Remove the lock entry for given name, if there is no
    /// contention over it.
    fn evict_if_uncontended(lock_table: &DashMap<Name, Arc<RwLock<()>>>, name: &Name) {
        let mut stash = None;
        lock_table.remove_if_mut(name, |_, lock| {
            // No other strong refs implies no holders.
            if Arc::strong_count(lock) == 1 {
                // No waiters either, if the write lock is free.
                if let Ok(guard) = lock.clone().try_write_owned() {
                    // Keep the guard alive for the duration of
                    // the removal.
                    stash = Some(guard);
                    return true;
                }
            }
            false
        });
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------
