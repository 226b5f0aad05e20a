//! Task persistence.
//!
//! - [`VaultStore`]: markdown documents with frontmatter metadata on disk
//! - [`MemoryTaskStore`]: the same contract in memory

mod memory;
mod traits;
mod vault;

pub use memory::MemoryTaskStore;
pub use traits::TaskStore;
pub use vault::VaultStore;

pub(crate) use vault::write_atomic;
