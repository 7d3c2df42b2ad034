//! # Runctx
//!
//! Hierarchical, execution-thread-scoped run contexts.
//!
//! Runctx provides typed, named context values that nest with strict LIFO
//! discipline, independently per OS thread:
//!
//! - **Registered types**: each context name is bound to exactly one concrete
//!   type, constructed through its registered factory
//! - **Parent validation**: a new activation's parent must be the calling
//!   thread's current top for its name, checked at enter time
//! - **Thread isolation**: every thread has its own context stacks; no
//!   instance is ever visible to another thread
//! - **Strict exits**: contexts must be exited in exactly the reverse order
//!   they were entered
//!
//! ## Quick Start
//!
//! ```rust
//! use runctx::prelude::*;
//! use std::sync::Arc;
//!
//! let service = Arc::new(ContextService::new());
//! service.register("permissions", PermissionContext::registration("permissions"))?;
//!
//! let args = ContextArgs::new().with("permissions", serde_json::json!(["read"]));
//! let ctx = service.enter("permissions", &args)?;
//! // ... run work under the context ...
//! service.exit(&ctx)?;
//! # Ok::<(), runctx::RunContextError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod errors;
pub mod registry;
pub mod service;
pub mod stack;


pub use errors::{ContextError, ContextRegistrationError, RunContextError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{
        same_context, ContextArgs, ParentCell, PermissionContext, RunContext, PERMISSIONS_ARG,
    };
    pub use crate::errors::{ContextError, ContextRegistrationError, RunContextError};
    pub use crate::registry::{ContextRegistration, ContextRegistry};
    pub use crate::service::{
        clear_context_service, context_scope, context_service, current_context, pop_context,
        register_context, run_in_context, ContextScope, ContextService,
    };
    pub use crate::stack::ContextStackStore;
}
