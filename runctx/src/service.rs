//! The entry/exit protocol over a registry and a stack store.

use crate::context::{same_context, ContextArgs, RunContext};
use crate::errors::{ContextError, ContextRegistrationError, RunContextError};
use crate::registry::{ContextRegistration, ContextRegistry};
use crate::stack::ContextStackStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Drives the entry and exit protocols against a context registry and a
/// thread stack store.
///
/// A process normally uses the shared default instance through the
/// free functions ([`register_context`], [`run_in_context`], [`pop_context`]),
/// but embedders and tests can hold their own service.
#[derive(Debug, Default)]
pub struct ContextService {
    registry: ContextRegistry,
    stacks: ContextStackStore,
}

impl ContextService {
    /// Creates a new service with an empty registry and store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a context type under a name.
    ///
    /// Re-registering the same name with the same concrete type is a no-op.
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
        let type_name = registration.type_name();
        self.registry.register(name.clone(), registration)?;
        debug!(name = %name, context_type = type_name, "registered run context");
        Ok(())
    }

    /// Enters a new activation of the named context on the calling thread.
    ///
    /// Resolves the registered type, constructs a child under the calling
    /// thread's current top for the name (or as a root if none is active),
    /// validates parent identity and name consistency, and pushes it.
    ///
    /// # Errors
    ///
    /// Returns [`ContextRegistrationError::UnknownContext`] for an
    /// unregistered name, [`ContextError::NestedContext`] (or a refinement
    /// such as [`ContextError::ExpandedPermission`]) when the type's own
    /// construction logic refuses, [`ContextError::InvalidParentContext`]
    /// when the constructed child holds an unexpected parent, and
    /// [`ContextError::InvalidChildContextName`] when it reports a different
    /// name than requested. A failed enter leaves the thread's stack at its
    /// pre-call depth.
    pub fn enter(
        &self,
        name: &str,
        args: &ContextArgs,
    ) -> Result<Arc<dyn RunContext>, RunContextError> {
        let registration = self.registry.resolve(name)?;

        let expected_parent = self.stacks.current_top(name);
        let child = registration.construct(expected_parent.clone(), args)?;

        // The factory may have wired up an unexpected or stale parent.
        if !same_context(child.parent().as_ref(), expected_parent.as_ref()) {
            return Err(ContextError::InvalidParentContext {
                parent: expected_parent,
                child,
            }
            .into());
        }
        // The registered name and the type's own name must never diverge, or
        // the exit path would tear down the wrong stack.
        if child.name() != name {
            return Err(ContextError::InvalidChildContextName {
                parent: expected_parent,
                child,
                expected_name: name.to_string(),
            }
            .into());
        }

        self.stacks.push(name, Arc::clone(&child));
        trace!(name = %name, depth = self.stacks.depth(name), "entered run context");
        Ok(child)
    }

    /// Exits an activation, which must be the calling thread's current top
    /// for its name.
    ///
    /// Pops the instance and severs its parent back-reference; emptied
    /// per-name and per-thread bookkeeping is torn down.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidContextExit`] when nothing was ever
    /// entered on this thread, and [`ContextError::InvalidParentContext`]
    /// when the instance is not the current top (LIFO discipline).
    pub fn exit(&self, instance: &Arc<dyn RunContext>) -> Result<(), ContextError> {
        self.stacks.pop(instance)?;
        instance.clear_parent();
        trace!(name = %instance.name(), depth = self.stacks.depth(instance.name()), "exited run context");
        Ok(())
    }

    /// Returns the calling thread's active top for `name`, or `None`.
    #[must_use]
    pub fn current(&self, name: &str) -> Option<Arc<dyn RunContext>> {
        self.stacks.current_top(name)
    }

    /// Enters the named context and returns a guard that exits it on drop.
    ///
    /// # Errors
    ///
    /// Fails exactly as [`ContextService::enter`] does.
    pub fn scope(
        self: &Arc<Self>,
        name: &str,
        args: &ContextArgs,
    ) -> Result<ContextScope, RunContextError> {
        let context = self.enter(name, args)?;
        Ok(ContextScope {
            service: Arc::clone(self),
            context,
            exited: false,
        })
    }

    /// Returns the calling thread's stack depth for `name`.
    #[must_use]
    pub fn depth(&self, name: &str) -> usize {
        self.stacks.depth(name)
    }

    /// Returns the registry this service resolves names against.
    #[must_use]
    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    /// Returns the stack store this service mutates.
    #[must_use]
    pub fn stacks(&self) -> &ContextStackStore {
        &self.stacks
    }
}

/// A scoped activation that exits on every scope-exit path, including panics.
///
/// Dropping the guard exits the context; an exit failure on the drop path
/// (always a LIFO violation elsewhere on the thread) is logged and swallowed.
/// Call [`ContextScope::exit`] to surface the error instead.
#[derive(Debug)]
pub struct ContextScope {
    service: Arc<ContextService>,
    context: Arc<dyn RunContext>,
    exited: bool,
}

impl ContextScope {
    /// Returns the activation this scope guards.
    #[must_use]
    pub fn context(&self) -> &Arc<dyn RunContext> {
        &self.context
    }

    /// Exits the scope now, surfacing any exit error.
    ///
    /// # Errors
    ///
    /// Fails exactly as [`ContextService::exit`] does.
    pub fn exit(mut self) -> Result<(), ContextError> {
        self.exited = true;
        self.service.exit(&self.context)
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        if let Err(err) = self.service.exit(&self.context) {
            warn!(name = %self.context.name(), error = %err, "failed to exit run context scope");
        }
    }
}

// Shared default service
static GLOBAL_SERVICE: RwLock<Option<Arc<ContextService>>> = RwLock::new(None);

/// Gets the shared default context service.
pub fn context_service() -> Arc<ContextService> {
    let read = GLOBAL_SERVICE.read();
    if let Some(ref service) = *read {
        return Arc::clone(service);
    }
    drop(read);

    let mut write = GLOBAL_SERVICE.write();
    Arc::clone(write.get_or_insert_with(|| Arc::new(ContextService::new())))
}

/// Drops the shared default service, so the next access starts fresh.
///
/// Not safe to call while other threads hold live contexts on the old
/// service; intended for embedder startup and teardown.
pub fn clear_context_service() {
    *GLOBAL_SERVICE.write() = None;
}

/// Registers a context type on the default service.
///
/// # Errors
///
/// Fails exactly as [`ContextService::register`] does.
pub fn register_context(
    name: impl Into<String>,
    registration: ContextRegistration,
) -> Result<(), ContextRegistrationError> {
    context_service().register(name, registration)
}

/// Enters a named context on the default service.
///
/// # Errors
///
/// Fails exactly as [`ContextService::enter`] does.
pub fn run_in_context(
    name: &str,
    args: &ContextArgs,
) -> Result<Arc<dyn RunContext>, RunContextError> {
    context_service().enter(name, args)
}

/// Exits a context on the default service.
///
/// # Errors
///
/// Fails exactly as [`ContextService::exit`] does.
pub fn pop_context(instance: &Arc<dyn RunContext>) -> Result<(), ContextError> {
    context_service().exit(instance)
}

/// Returns the calling thread's active top for `name` on the default service.
#[must_use]
pub fn current_context(name: &str) -> Option<Arc<dyn RunContext>> {
    context_service().current(name)
}

/// Opens a scoped activation on the default service.
///
/// # Errors
///
/// Fails exactly as [`ContextService::enter`] does.
pub fn context_scope(name: &str, args: &ContextArgs) -> Result<ContextScope, RunContextError> {
    context_service().scope(name, args)
}
