//! Scheduler: priority selection and the polling loop.
//!
//! - **Priority table**: orders pending tasks, stable on ties.
//! - **Session failures**: tasks not retried again in the same run.
//! - **Scheduler**: preflight, then poll -> gate -> engine -> sleep.

mod manager;
mod priority;
mod session;

pub use manager::{PollReport, Scheduler};
pub use priority::{PriorityTable, dispatch_queue};
pub use session::SessionFailures;
