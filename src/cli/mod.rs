//! Command line interface for Ferret.

pub mod args;
pub mod commands;

// Re-export commonly used types
pub use args::{DaemonArgs, Request, SearchArgs, Window};
pub use commands::service_request;
