//! File system helpers shared by the update components.
//!
//! - [`atomic`] - temp-and-rename writes for the state record
//! - [`dirs`] - directory creation and removal
//! - [`scratch`] - the per-cycle scratch workspace

pub mod atomic;
pub mod dirs;
pub mod scratch;

pub use atomic::atomic_write;
pub use dirs::{ensure_dir, remove_dir_all, remove_dir_best_effort};
pub use scratch::ScratchDir;
