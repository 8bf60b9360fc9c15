//! Process-wide side table from session manager to its compaction runtime config.
//!
//! Entries are keyed by the identity of the session manager's `Arc` allocation, not
//! by anything derived from its contents, so two managers with identical state never
//! share an entry. Each entry holds only a [`Weak`] handle to the manager: the registry
//! never keeps a session manager alive, and entries whose manager has been dropped are
//! treated as absent and swept on the next write. Until that sweep a dead entry still
//! holds the manager's allocation (not its value) through the `Weak`.
//!
//! A `None` session manager (e.g. one not yet initialized during startup) is accepted
//! and ignored by both operations.

use crate::config::CompactionRuntimeConfig;
use log::trace;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Global runtime registry shared by session setup and the compaction handler
pub static RUNTIME_REGISTRY: Lazy<Arc<RuntimeRegistry>> =
    Lazy::new(|| Arc::new(RuntimeRegistry::new()));

/// Store (or with `None`, clear) the runtime config for a session manager
pub fn set_runtime_config<S>(session: Option<&Arc<S>>, config: Option<CompactionRuntimeConfig>)
where
    S: ?Sized + Send + Sync + 'static,
{
    RUNTIME_REGISTRY.set(session, config);
}

/// Look up the runtime config for a session manager
pub fn get_runtime_config<S>(session: Option<&Arc<S>>) -> Option<CompactionRuntimeConfig>
where
    S: ?Sized,
{
    RUNTIME_REGISTRY.get(session)
}

/// Liveness probe over a type-erased weak session handle
trait WeakKey: Send + Sync {
    fn is_alive(&self) -> bool;
}

impl<S: ?Sized + Send + Sync> WeakKey for Weak<S> {
    fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }
}

struct Entry {
    // Holding a Weak keeps the allocation (not the value) reserved, so the address
    // key cannot be reused by another manager while this entry exists.
    owner: Box<dyn WeakKey>,
    config: CompactionRuntimeConfig,
}

#[derive(Default)]
pub struct RuntimeRegistry {
    entries: RwLock<HashMap<usize, Entry>>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<S>(&self, session: Option<&Arc<S>>, config: Option<CompactionRuntimeConfig>)
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let Some(session) = session else {
            trace!("Ignoring runtime config update without a session manager");
            return;
        };
        let key = identity(session);

        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.owner.is_alive());
        match config {
            Some(config) => {
                entries.insert(
                    key,
                    Entry {
                        owner: Box::new(Arc::downgrade(session)),
                        config,
                    },
                );
            }
            None => {
                entries.remove(&key);
            }
        }
    }

    pub fn get<S: ?Sized>(&self, session: Option<&Arc<S>>) -> Option<CompactionRuntimeConfig> {
        let key = identity(session?);
        let entries = self.entries.read();
        entries
            .get(&key)
            .filter(|entry| entry.owner.is_alive())
            .map(|entry| entry.config.clone())
    }

    /// Number of entries whose session manager is still alive
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.owner.is_alive())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn identity<S: ?Sized>(session: &Arc<S>) -> usize {
    Arc::as_ptr(session) as *const () as usize
}
