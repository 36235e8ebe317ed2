//! Utility modules for treeoxide.
//!
//! Contains `QName` handling and the shared string pool used for text
//! interning.

pub mod qname;
pub mod strings;
