//! The process-wide name-to-type context registry.

use crate::context::{ContextArgs, RunContext};
use crate::errors::{ContextError, ContextRegistrationError};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Factory function type erased over the concrete context type.
type ContextFactory = Box<
    dyn Fn(Option<Arc<dyn RunContext>>, &ContextArgs) -> Result<Arc<dyn RunContext>, ContextError>
        + Send
        + Sync,
>;

/// Binds a concrete context type to its construction logic.
///
/// The registration carries the concrete type's identity, so re-registering a
/// name can distinguish "same type again" (a no-op) from a genuine conflict.
pub struct ContextRegistration {
    type_id: TypeId,
    type_name: &'static str,
    factory: ContextFactory,
}

impl ContextRegistration {
    /// Creates a registration for the context type `C` with the given factory.
    ///
    /// The factory receives the candidate parent (the current top of the
    /// calling thread's stack for the entered name) and the caller's
    /// construction arguments, and may refuse the nesting.
    pub fn new<C, F>(factory: F) -> Self
    where
        C: RunContext + 'static,
        F: Fn(Option<Arc<dyn RunContext>>, &ContextArgs) -> Result<C, ContextError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            factory: Box::new(move |parent, args| {
                factory(parent, args).map(|ctx| Arc::new(ctx) as Arc<dyn RunContext>)
            }),
        }
    }

    /// Returns the Rust type name of the registered context type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Constructs a new instance under the given parent.
    ///
    /// # Errors
    ///
    /// Propagates whatever the context type's own construction logic refuses
    /// with, typically [`ContextError::NestedContext`] or
    /// [`ContextError::ExpandedPermission`].
    pub fn construct(
        &self,
        parent: Option<Arc<dyn RunContext>>,
        args: &ContextArgs,
    ) -> Result<Arc<dyn RunContext>, ContextError> {
        (self.factory)(parent, args)
    }
}

impl std::fmt::Debug for ContextRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRegistration")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Process-wide mapping from a context name to the single concrete type
/// authorized to represent it.
///
/// Entries are never removed; the registry lives for the process lifetime.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    entries: RwLock<HashMap<String, Arc<ContextRegistration>>>,
}

impl ContextRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a context type under a name.
    ///
    /// Re-registering the same name with the same concrete type succeeds and
    /// leaves the registry unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ContextRegistrationError::AlreadyRegistered`] if the name is
    /// bound to a different concrete type.
    pub fn register(
        &self,
        name: impl Into<String>,
        registration: ContextRegistration,
    ) -> Result<(), ContextRegistrationError> {
        let name = name.into();
        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(&name) {
            if existing.type_id == registration.type_id {
                return Ok(());
            }
            return Err(ContextRegistrationError::AlreadyRegistered {
                name,
                existing: existing.type_name,
                requested: registration.type_name,
            });
        }

        entries.insert(name, Arc::new(registration));
        Ok(())
    }

    /// Resolves the registration for a name.
    ///
    /// # Errors
    ///
    /// Returns [`ContextRegistrationError::UnknownContext`] if the name has
    /// never been registered.
    pub fn resolve(&self, name: &str) -> Result<Arc<ContextRegistration>, ContextRegistrationError> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContextRegistrationError::UnknownContext {
                name: name.to_string(),
            })
    }

    /// Returns all registered names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ParentCell, PermissionContext};
    use std::any::Any;

    #[derive(Debug)]
    struct OtherContext {
        name: String,
        parent: ParentCell,
    }

    impl RunContext for OtherContext {
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

    fn other_registration(name: &str) -> ContextRegistration {
        let name = name.to_string();
        ContextRegistration::new::<OtherContext, _>(move |parent, _args| {
            Ok(OtherContext {
                name: name.clone(),
                parent: ParentCell::new(parent.as_ref()),
            })
        })
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = ContextRegistry::new();
        registry
            .register("permissions", PermissionContext::registration("permissions"))
            .unwrap();

        let registration = registry.resolve("permissions").unwrap();
        assert!(registration.type_name().contains("PermissionContext"));
    }

    #[test]
    fn test_reregister_same_type_is_noop() {
        let registry = ContextRegistry::new();
        registry
            .register("permissions", PermissionContext::registration("permissions"))
            .unwrap();
        registry
            .register("permissions", PermissionContext::registration("permissions"))
            .unwrap();

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregister_different_type_fails() {
        let registry = ContextRegistry::new();
        registry
            .register("permissions", PermissionContext::registration("permissions"))
            .unwrap();

        let err = registry
            .register("permissions", other_registration("permissions"))
            .unwrap_err();

        match err {
            ContextRegistrationError::AlreadyRegistered {
                name,
                existing,
                requested,
            } => {
                assert_eq!(name, "permissions");
                assert!(existing.contains("PermissionContext"));
                assert!(requested.contains("OtherContext"));
            }
            other => panic!("expected AlreadyRegistered, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let registry = ContextRegistry::new();
        let err = registry.resolve("missing").unwrap_err();
        assert!(matches!(
            err,
            ContextRegistrationError::UnknownContext { name } if name == "missing"
        ));
    }

    #[test]
    fn test_names_and_emptiness() {
        let registry = ContextRegistry::new();
        assert!(registry.is_empty());

        registry
            .register("alpha", other_registration("alpha"))
            .unwrap();
        registry
            .register("beta", other_registration("beta"))
            .unwrap();

        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_concurrent_registration_single_winner() {
        let registry = Arc::new(ContextRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register("shared", other_registration("shared"))
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(registry.len(), 1);
    }
}
