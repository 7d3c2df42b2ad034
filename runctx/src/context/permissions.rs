//! A permission-narrowing context type.
//!
//! The paradigm example of a context type whose construction hook vetoes a
//! nesting: each activation holds an immutable permission set, and a child may
//! only narrow (never widen) what its parent holds.

use crate::context::{ContextArgs, ParentCell, RunContext};
use crate::errors::ContextError;
use crate::registry::ContextRegistration;
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

/// The argument key carrying the requested permission set.
pub const PERMISSIONS_ARG: &str = "permissions";

/// A run context holding an immutable permission set.
///
/// A root activation takes its set from the `"permissions"` argument
/// (defaulting to empty). A child inherits the parent's set when the argument
/// is absent; otherwise the requested set must be a subset of the parent's,
/// and widening fails with [`ContextError::ExpandedPermission`].
#[derive(Debug)]
pub struct PermissionContext {
    name: String,
    permissions: BTreeSet<String>,
    parent: ParentCell,
}

impl PermissionContext {
    /// Creates a registration for this type under the given name.
    ///
    /// The name is captured by the factory and hard-coded into every instance
    /// it constructs, keeping the registry name and the context name in step.
    #[must_use]
    pub fn registration(name: impl Into<String>) -> ContextRegistration {
        let name = name.into();
        ContextRegistration::new::<Self, _>(move |parent, args| {
            Self::construct(name.clone(), parent, args)
        })
    }

    /// Constructs an activation under the given parent.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::ExpandedPermission`] when the requested set
    /// widens the parent's, and [`ContextError::NestedContext`] when the
    /// `"permissions"` argument is malformed or the parent is not a
    /// `PermissionContext`.
    pub fn construct(
        name: String,
        parent: Option<Arc<dyn RunContext>>,
        args: &ContextArgs,
    ) -> Result<Self, ContextError> {
        let requested = requested_permissions(parent.as_ref(), args)?;

        let permissions = match &parent {
            None => requested.unwrap_or_default(),
            Some(p) => {
                let Some(parent_ctx) = p.as_any().downcast_ref::<Self>() else {
                    return Err(ContextError::NestedContext {
                        parent: parent.clone(),
                        args: args.clone(),
                    });
                };
                match requested {
                    None => parent_ctx.permissions.clone(),
                    Some(requested) => {
                        if !requested.is_subset(&parent_ctx.permissions) {
                            return Err(ContextError::ExpandedPermission {
                                parent: parent.clone(),
                                parent_permissions: parent_ctx.permissions.clone(),
                                requested_permissions: requested,
                            });
                        }
                        requested
                    }
                }
            }
        };

        Ok(Self {
            name,
            permissions,
            parent: ParentCell::new(parent.as_ref()),
        })
    }

    /// Returns the permission set held by this activation.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Checks whether this activation holds the given permission.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

impl RunContext for PermissionContext {
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

/// Decodes the `"permissions"` argument as a set of strings, if present.
fn requested_permissions(
    parent: Option<&Arc<dyn RunContext>>,
    args: &ContextArgs,
) -> Result<Option<BTreeSet<String>>, ContextError> {
    let Some(value) = args.get(PERMISSIONS_ARG) else {
        return Ok(None);
    };

    let malformed = || ContextError::NestedContext {
        parent: parent.cloned(),
        args: args.clone(),
    };

    let entries = value.as_array().ok_or_else(malformed)?;
    let mut permissions = BTreeSet::new();
    for entry in entries {
        let permission = entry.as_str().ok_or_else(malformed)?;
        permissions.insert(permission.to_string());
    }
    Ok(Some(permissions))
}
