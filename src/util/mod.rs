//! Utility functions
//!
//! Number formatting and parsing, and Unicode helpers.

pub mod dtoa;
pub mod unicode;
