//! Index module for Ferret.
//!
//! This module reads the on-disk index: the segment store, the postings and
//! file-record codecs, and a writer that produces the same layout.

pub mod file_info;
pub mod postings;
pub mod segment;
pub mod writer;

// Re-export commonly used types
pub use file_info::FileInfo;
pub use postings::{MetaId, Posting, Postings, WordEntry};
pub use segment::{IndexFile, Segment, SegmentKind};
pub use writer::IndexWriter;
