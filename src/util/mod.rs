//! Utility modules for Ferret.

pub mod varint;
