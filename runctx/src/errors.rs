//! Error types for run context operations.
//!
//! Two families: registry misuse ([`ContextRegistrationError`]) and
//! stack/lifecycle misuse ([`ContextError`]), with [`RunContextError`] as the
//! umbrella for operations that can fail either way. Every variant carries the
//! structured data a caller needs to diagnose the violation; nothing is retried
//! internally, since stack-discipline violations indicate caller logic errors.

use crate::context::{ContextArgs, RunContext};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// The umbrella error type for run context operations.
#[derive(Debug, Error)]
pub enum RunContextError {
    /// A registry misuse error occurred.
    #[error("{0}")]
    Registration(#[from] ContextRegistrationError),

    /// A stack or lifecycle misuse error occurred.
    #[error("{0}")]
    Context(#[from] ContextError),
}

/// Errors raised by the context registry.
#[derive(Debug, Clone, Error)]
pub enum ContextRegistrationError {
    /// The name is already bound to a different concrete type.
    #[error("attempted to register context `{name}` as type {requested}, but it is already registered as {existing}")]
    AlreadyRegistered {
        /// The context name being registered.
        name: String,
        /// The Rust type name already bound to `name`.
        existing: &'static str,
        /// The Rust type name of the rejected registration.
        requested: &'static str,
    },

    /// The name has never been registered.
    #[error("no such registered context named `{name}`")]
    UnknownContext {
        /// The unregistered context name.
        name: String,
    },
}

/// Errors raised by the entry and exit protocols.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The constructed child's parent, or the exit-time stack top, does not
    /// match the expected instance.
    #[error("current run context ({parent:?}) is not the parent of run context ({child:?})")]
    InvalidParentContext {
        /// The instance the stack says should be involved, if any.
        parent: Option<Arc<dyn RunContext>>,
        /// The instance that failed validation.
        child: Arc<dyn RunContext>,
    },

    /// The constructed child reports a different name than the one entered.
    #[error("expected child context named `{expected_name}`, but found `{}`", .child.name())]
    InvalidChildContextName {
        /// The parent the child was constructed under, if any.
        parent: Option<Arc<dyn RunContext>>,
        /// The misnamed child instance.
        child: Arc<dyn RunContext>,
        /// The name the caller entered with.
        expected_name: String,
    },

    /// Exit was attempted on a thread that has no context stack at all.
    #[error("no run context stack exists on this thread for exiting ({child:?})")]
    InvalidContextExit {
        /// The instance the caller tried to exit.
        child: Arc<dyn RunContext>,
    },

    /// A context type's own construction logic refused the nesting.
    #[error("parent run context ({parent:?}) refused entering a child run context with {args:?}")]
    NestedContext {
        /// The parent that refused, if any.
        parent: Option<Arc<dyn RunContext>>,
        /// The rejected construction arguments.
        args: ContextArgs,
    },

    /// A child context requested wider permissions than its parent holds.
    ///
    /// A concrete refinement of [`ContextError::NestedContext`] for the
    /// permission-narrowing case.
    #[error("child context requested permissions {requested_permissions:?}, wider than parent permissions {parent_permissions:?}")]
    ExpandedPermission {
        /// The parent that refused, if any.
        parent: Option<Arc<dyn RunContext>>,
        /// The permissions the parent holds.
        parent_permissions: BTreeSet<String>,
        /// The permissions the child requested.
        requested_permissions: BTreeSet<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_registered_display() {
        let err = ContextRegistrationError::AlreadyRegistered {
            name: "permissions".to_string(),
            existing: "a::First",
            requested: "b::Second",
        };

        let msg = err.to_string();
        assert!(msg.contains("`permissions`"));
        assert!(msg.contains("a::First"));
        assert!(msg.contains("b::Second"));
    }

    #[test]
    fn test_unknown_context_display() {
        let err = ContextRegistrationError::UnknownContext {
            name: "missing".to_string(),
        };
        assert!(err.to_string().contains("`missing`"));
    }

    #[test]
    fn test_expanded_permission_display() {
        let err = ContextError::ExpandedPermission {
            parent: None,
            parent_permissions: ["read".to_string()].into(),
            requested_permissions: ["read".to_string(), "write".to_string()].into(),
        };

        let msg = err.to_string();
        assert!(msg.contains("read"));
        assert!(msg.contains("write"));
    }

    #[test]
    fn test_umbrella_conversions() {
        let err: RunContextError = ContextRegistrationError::UnknownContext {
            name: "n".to_string(),
        }
        .into();
        assert!(matches!(err, RunContextError::Registration(_)));

        let err: RunContextError = ContextError::NestedContext {
            parent: None,
            args: ContextArgs::new(),
        }
        .into();
        assert!(matches!(err, RunContextError::Context(_)));
    }
}
