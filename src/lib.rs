//! Steward - a durable, file-backed task queue
//!
//! Tasks are markdown documents in a vault. A scheduler picks them up in
//! priority order and drives each one through bounded completion cycles
//! until the task's own record says it is done, escalating to a human when
//! it cannot be finished or must not run unattended.

pub mod audit;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod executor;
pub mod id;
pub mod intake;
pub mod memory;
pub mod policy;
pub mod scheduler;
pub mod store;

pub use error::{Result, StewardError};
