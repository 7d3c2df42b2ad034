//! The run context capability and supporting types.
//!
//! This module provides:
//! - The [`RunContext`] trait concrete context types implement
//! - The [`ParentCell`] back-reference slot implementors embed
//! - [`ContextArgs`], the named construction arguments passed at entry
//! - [`PermissionContext`], the paradigm permission-narrowing context type

mod args;
mod permissions;
mod run_context;

pub use args::ContextArgs;
pub use permissions::{PermissionContext, PERMISSIONS_ARG};
pub use run_context::{same_context, ParentCell, RunContext};
