//! The process-wide, thread-identity-partitioned context stack store.

use crate::context::RunContext;
use crate::errors::ContextError;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Per-thread mapping from a context name to its ordered stack of live
/// activations. The last element is the currently active top.
type ThreadStacks = HashMap<String, Vec<Arc<dyn RunContext>>>;

/// Process-wide state mapping a thread identity to that thread's own per-name
/// context stacks.
///
/// Stacks for different threads are fully isolated: every operation keys on
/// the calling thread's identity, so no instance is ever visible to a thread
/// other than the one that pushed it. Creation and removal of a thread's
/// top-level entry are the only cross-thread-visible mutations, and the
/// concurrent map serializes those; pushes and pops touch only the calling
/// thread's own entry.
///
/// Known limitation: a thread that enters a context and terminates without
/// exiting leaves its entry in the store forever, since nothing here observes
/// thread termination.
#[derive(Debug, Default)]
pub struct ContextStackStore {
    threads: DashMap<ThreadId, ThreadStacks>,
}

impl ContextStackStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the calling thread's active top for `name`, or `None`.
    ///
    /// This is the candidate parent for a new entry.
    #[must_use]
    pub fn current_top(&self, name: &str) -> Option<Arc<dyn RunContext>> {
        let thread_id = thread::current().id();
        self.threads
            .get(&thread_id)
            .and_then(|stacks| stacks.get(name).and_then(|stack| stack.last().cloned()))
    }

    /// Pushes a new activation onto the calling thread's stack for `name`.
    ///
    /// The per-thread entry and the per-name stack are created lazily on
    /// first use, so a refused construction never leaves empty bookkeeping
    /// behind.
    pub fn push(&self, name: impl Into<String>, instance: Arc<dyn RunContext>) {
        let thread_id = thread::current().id();
        self.threads
            .entry(thread_id)
            .or_default()
            .entry(name.into())
            .or_default()
            .push(instance);
    }

    /// Pops the calling thread's top activation, enforcing LIFO discipline.
    ///
    /// The stack is keyed by the instance's own name; the entry protocol
    /// guarantees this matches the name it was entered under. Emptied
    /// per-name stacks are removed, and when the thread's map empties its
    /// top-level entry is removed too.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidContextExit`] when the thread has no
    /// store entry at all, and [`ContextError::InvalidParentContext`] when
    /// the per-name stack is absent or empty, or its top is not the same
    /// instance (identity, not structural equality).
    pub fn pop(&self, expected: &Arc<dyn RunContext>) -> Result<(), ContextError> {
        let thread_id = thread::current().id();
        let name = expected.name().to_string();

        let Some(mut entry) = self.threads.get_mut(&thread_id) else {
            return Err(ContextError::InvalidContextExit {
                child: Arc::clone(expected),
            });
        };

        let stacks = entry.value_mut();
        let Some(stack) = stacks.get_mut(&name) else {
            return Err(ContextError::InvalidParentContext {
                parent: None,
                child: Arc::clone(expected),
            });
        };

        match stack.last() {
            None => {
                return Err(ContextError::InvalidParentContext {
                    parent: None,
                    child: Arc::clone(expected),
                });
            }
            Some(top) if !Arc::ptr_eq(top, expected) => {
                return Err(ContextError::InvalidParentContext {
                    parent: Some(Arc::clone(top)),
                    child: Arc::clone(expected),
                });
            }
            Some(_) => {}
        }

        stack.pop();
        let name_empty = stack.is_empty();
        if name_empty {
            stacks.remove(&name);
        }
        let thread_empty = stacks.is_empty();

        // The entry guard must be released before removing the thread's
        // top-level entry, or the map would deadlock against itself.
        drop(entry);
        if thread_empty {
            self.threads.remove_if(&thread_id, |_, stacks| stacks.is_empty());
        }

        Ok(())
    }

    /// Returns the calling thread's stack depth for `name`.
    #[must_use]
    pub fn depth(&self, name: &str) -> usize {
        let thread_id = thread::current().id();
        self.threads
            .get(&thread_id)
            .and_then(|stacks| stacks.get(name).map(Vec::len))
            .unwrap_or(0)
    }

    /// Returns the number of threads with live store entries.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Returns true if no thread has a live store entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}
