//! Authorization and execution-context policy.
//!
//! - **Tier classification**: decides whether a task may run automatically.
//! - **Skill resolution**: picks the execution context for a task.

mod skill;
mod tier;

pub use skill::{Classification, SkillDescriptor, SkillRegistry, load_skill_context};
pub use tier::{Tier, TierPolicy};
