//! Identity-keyed side table from raised errors to their stacktraces.
//!
//! Errors are `Arc` allocations and are keyed by address. The table only holds
//! a `Weak` to each error, so it never keeps one alive, and the weak count
//! keeps the allocation (and with it the address) reserved for as long as the
//! entry exists. Entries whose error is gone are swept on insertion.

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use crate::stacktrace::Stacktrace;

const MIN_SWEEP: usize = 64;

pub(crate) fn key_of<E: ?Sized>(error: &Arc<E>) -> usize {
    Arc::as_ptr(error).cast::<()>() as usize
}

struct Attachment {
    owner: Box<dyn Fn() -> bool + Send + Sync>,
    stacktrace: Arc<Stacktrace>,
}

impl Attachment {
    fn new<E>(owner: Weak<E>, stacktrace: Stacktrace) -> Self
    where
        E: ?Sized + Send + Sync + 'static,
    {
        Self {
            owner: Box::new(move || owner.strong_count() > 0),
            stacktrace: Arc::new(stacktrace),
        }
    }

    fn is_live(&self) -> bool {
        (self.owner)()
    }
}

#[derive(Default)]
struct Table {
    entries: HashMap<usize, Attachment>,
    next_sweep: usize,
}

#[derive(Default)]
pub(crate) struct Attachments {
    table: Mutex<Table>,
}

impl Attachments {
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn contains(&self, key: usize) -> bool {
        self.lock()
            .entries
            .get(&key)
            .is_some_and(Attachment::is_live)
    }

    /// Attaches `stacktrace` to `error` unless it already has one.
    ///
    /// Returns whether the stacktrace was attached.
    pub(crate) fn attach<E>(&self, error: &Arc<E>, stacktrace: Stacktrace) -> bool
    where
        E: ?Sized + Send + Sync + 'static,
    {
        let mut table = self.lock();
        if table.entries.len() >= table.next_sweep {
            table.entries.retain(|_, attachment| attachment.is_live());
            table.next_sweep = (table.entries.len() * 2).max(MIN_SWEEP);
        }

        let attachment = Attachment::new(Arc::downgrade(error), stacktrace);
        match table.entries.entry(key_of(error)) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live() {
                    return false;
                }
                occupied.insert(attachment);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(attachment);
            }
        }
        true
    }

    pub(crate) fn get(&self, key: usize) -> Option<Arc<Stacktrace>> {
        self.lock()
            .entries
            .get(&key)
            .filter(|attachment| attachment.is_live())
            .map(|attachment| Arc::clone(&attachment.stacktrace))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }
}
