//! # treeoxide
//!
//! A streaming tree assembler for XML: the structural half of a parser.
//! A tokenizer (SAX2-style event source) feeds events into a
//! [`TreeBuilder`], which incrementally assembles a [`Document`] — an
//! arena-allocated node tree with namespace scopes, coalesced text,
//! DTD declaration registries and whole-document ID/IDREF tables.
//!
//! ## Features
//!
//! - Arena tree with index-based node handles (no reference counting)
//! - Namespace resolution by scope walking, with placeholder bindings and
//!   warnings for undeclared prefixes
//! - Text coalescing with geometric buffer growth and short-run interning
//! - First-wins DTD declaration registries (entities, notations, element
//!   and attribute declarations) across internal and external subsets
//! - Re-entrant external subset fetching through an injected resolver,
//!   with save/restore of the input state around the nested parse
//! - Structured diagnostics with per-kind recovery policy, never panics
//!
//! ## Example
//!
//! ```
//! use treeoxide::{BuildOptions, TreeBuilder};
//! use treeoxide::sax::{SaxAttribute, SaxHandler};
//!
//! let mut builder = TreeBuilder::with_options(BuildOptions::default());
//! builder.start_document();
//! builder.start_element(
//!     "book",
//!     None,
//!     None,
//!     &[],
//!     0,
//!     &[SaxAttribute::new("lang", "en")],
//! );
//! builder.characters("Moby-Dick");
//! builder.end_element("book", None, None);
//! builder.end_document();
//!
//! let doc = builder.finish();
//! assert!(doc.well_formed);
//! let root = doc.root_element().unwrap();
//! assert_eq!(doc.attribute(root, "lang"), Some("en".to_string()));
//! assert_eq!(doc.text_content(root), "Moby-Dick");
//! ```
//!
//! ## Security
//!
//! External resources are only ever fetched through an explicitly injected
//! resolver callback; by default the builder touches neither the network
//! nor the filesystem. Resource limits (text size, nesting depth, fetch
//! depth) are enforced and configurable via [`BuildOptions`].

pub mod builder;
pub mod dtd;
pub mod encoding;
pub mod error;
pub mod input;
pub mod sax;
pub mod tree;
pub mod util;

pub use builder::{BuildOptions, TreeBuilder};
pub use error::{BuildDiagnostic, DiagnosticKind};
pub use tree::{Document, NodeId, NodeKind};
