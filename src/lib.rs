//! # Ferret
//!
//! A local full-text search engine over a pre-built, read-only word index.
//!
//! ## Features
//!
//! - Memory-mapped index file with five sorted segments
//! - Boolean queries with `and`, `or`, `not`, parentheses, prefix words,
//!   and meta-name restrictions
//! - Rank accumulation, normalization, and result windowing
//! - Classic, XML, and JSON result formats
//! - A multi-threaded daemon serving queries over TCP and Unix sockets

pub mod analysis;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod index;
pub mod query;
pub mod render;
pub mod util;

pub mod prelude {
    pub use crate::config::{DaemonConfig, ResultsFormat, SearchConfig};
    pub use crate::error::{FerretError, Result};
    pub use crate::index::{IndexFile, IndexWriter, Posting};
    pub use crate::query::{SearchReport, search};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
