//! Cross-platform utilities
//!
//! - [`fs`] - atomic writes, directory helpers and the scratch workspace
//! - [`platform`] - install-root defaults and path expansion

pub mod fs;
pub mod platform;

pub use fs::{ScratchDir, atomic_write, ensure_dir, remove_dir_all};
pub use platform::{default_install_root, is_windows, resolve_path};
