//! The run context capability and its parent back-reference cell.

use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// One activation of a named, typed, stack-scoped value on a single thread.
///
/// Concrete context types implement this trait and are constructed only by the
/// entry protocol, through the factory they were registered with. An instance's
/// `name` is immutable for its lifetime; its `parent` is the instance that was
/// top-of-stack for the same name on the same thread when it was constructed,
/// and is severed when the instance is exited.
pub trait RunContext: Send + Sync + fmt::Debug {
    /// Returns the context's name.
    fn name(&self) -> &str;

    /// Returns the parent activation, or `None` for a root activation or an
    /// instance that has already been exited.
    fn parent(&self) -> Option<Arc<dyn RunContext>>;

    /// Severs the parent back-reference. Called by the exit protocol when the
    /// instance is popped, so a removed instance cannot be mistaken for one
    /// that is still active.
    fn clear_parent(&self);

    /// Returns the instance as [`Any`], so callers can downcast the active
    /// context to its concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Checks whether two optional context handles refer to the same instance.
///
/// Identity comparison, not structural equality: two contexts are the same
/// only if they are the same allocation.
#[must_use]
pub fn same_context(a: Option<&Arc<dyn RunContext>>, b: Option<&Arc<dyn RunContext>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// The parent slot a concrete context type embeds to satisfy the
/// `parent`/`clear_parent` contract.
///
/// Holds a weak back-reference: the stack keeps the parent alive while it is
/// active, and the cell is cleared when the owning instance is exited.
#[derive(Debug, Default)]
pub struct ParentCell {
    slot: RwLock<Option<Weak<dyn RunContext>>>,
}

impl ParentCell {
    /// Creates a cell pointing at the given parent, if any.
    #[must_use]
    pub fn new(parent: Option<&Arc<dyn RunContext>>) -> Self {
        Self {
            slot: RwLock::new(parent.map(Arc::downgrade)),
        }
    }

    /// Creates an empty cell for a root activation.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns the parent, upgrading the weak reference.
    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn RunContext>> {
        self.slot.read().as_ref().and_then(Weak::upgrade)
    }

    /// Clears the back-reference.
    pub fn clear(&self) {
        *self.slot.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Probe {
        name: String,
        parent: ParentCell,
    }

    impl RunContext for Probe {
        fn name(&self) -> &str {
            &self.name
        }

        fn parent(&self) -> Option<Arc<dyn RunContext>> {
            self.parent.get()
        }

        fn clear_parent(&self) {
            self.parent.clear();
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_parent_cell_root() {
        let cell = ParentCell::root();
        assert!(cell.get().is_none());
    }

    #[test]
    fn test_parent_cell_points_at_parent() {
        let root: Arc<dyn RunContext> = Arc::new(Probe {
            name: "n".to_string(),
            parent: ParentCell::root(),
        });

        let cell = ParentCell::new(Some(&root));
        let got = cell.get().unwrap();
        assert!(Arc::ptr_eq(&got, &root));

        cell.clear();
        assert!(cell.get().is_none());
    }

    #[test]
    fn test_parent_cell_weak_does_not_keep_parent_alive() {
        let root: Arc<dyn RunContext> = Arc::new(Probe {
            name: "n".to_string(),
            parent: ParentCell::root(),
        });

        let cell = ParentCell::new(Some(&root));
        drop(root);
        assert!(cell.get().is_none());
    }

    #[test]
    fn test_same_context_identity() {
        let a: Arc<dyn RunContext> = Arc::new(Probe {
            name: "n".to_string(),
            parent: ParentCell::root(),
        });
        let b: Arc<dyn RunContext> = Arc::new(Probe {
            name: "n".to_string(),
            parent: ParentCell::root(),
        });

        assert!(same_context(Some(&a), Some(&a.clone())));
        assert!(!same_context(Some(&a), Some(&b)));
        assert!(same_context(None, None));
        assert!(!same_context(Some(&a), None));
    }

    #[test]
    fn test_downcast_through_as_any() {
        let ctx: Arc<dyn RunContext> = Arc::new(Probe {
            name: "probe".to_string(),
            parent: ParentCell::root(),
        });

        let probe = ctx.as_any().downcast_ref::<Probe>().unwrap();
        assert_eq!(probe.name, "probe");
    }
}
