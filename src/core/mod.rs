//! Core error types shared by every component.
//!
//! - [`UpdateError`] - typed failures of a cycle and of configuration loading
//! - [`ErrorContext`] - user-facing rendering with details and a suggestion
//! - [`user_friendly_error`] - converts any `anyhow::Error` for display

pub mod error;

pub use error::{ErrorContext, UpdateError, user_friendly_error};
