//! Completion engine - the per-task state machine.

mod completion;

pub use completion::{ACTOR, CompletionEngine, EngineSettings};

pub(crate) use completion::pause;
