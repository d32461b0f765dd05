//! Executor dispatch, execution context, and control-flow runtime for
//! declarative step workflows.
//!
//! This crate is the execution core: given a registry of [`executor::Executor`]
//! implementations and a sequence of [`types::Step`]s, it runs condition
//! branches and reference-workflow sub-runs against a shared
//! [`context::ExecutionContext`], using the `${...}` expression subsystem in
//! [`expression`] to bind parameters and evaluate branches.

pub mod context;
pub mod error;
pub mod executor;
pub mod expression;
pub mod types;

pub use context::{ExecutionCallback, ExecutionContext, LogEntry, NoopCallback};
pub use error::{ErrorKind, RuntimeError};
pub use executor::{Executor, Registry};
