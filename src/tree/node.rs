//! Node type definitions.
//!
//! The `NodeKind` enum represents all node types in an XML document tree.
//! Each variant carries the node-type-specific payload (e.g., element name
//! and attributes, text content).

use std::rc::Rc;

use super::{Attribute, NsDecl, NsRef};

/// Character-data payload of a text node.
///
/// Short runs that pass the interning heuristics (formatting whitespace,
/// tiny runs at markup boundaries) are stored as shared handles into the
/// session's string pool; everything else owns its buffer. Appending to a
/// shared run first copies it out into an owned buffer.
#[derive(Debug, Clone)]
pub enum TextContent {
    /// A pooled, immutable run shared with other identical text nodes.
    Shared(Rc<str>),
    /// An exclusively owned, growable run.
    Owned(String),
}

impl TextContent {
    /// Returns the character data as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Shared(s) => s,
            Self::Owned(s) => s,
        }
    }

    /// Returns the logical length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    /// Returns `true` if the run is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }

    /// Returns `true` if this run is a shared pool handle.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }

    /// Returns a mutable owned buffer, copying a shared run out of the pool
    /// first. After this call the content is always `Owned`.
    pub fn to_mut(&mut self) -> &mut String {
        if let Self::Shared(s) = self {
            *self = Self::Owned(s.to_string());
        }
        match self {
            Self::Owned(s) => s,
            Self::Shared(_) => unreachable!(),
        }
    }
}

impl PartialEq for TextContent {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for TextContent {}

impl From<String> for TextContent {
    fn from(s: String) -> Self {
        Self::Owned(s)
    }
}

impl From<Rc<str>> for TextContent {
    fn from(s: Rc<str>) -> Self {
        Self::Shared(s)
    }
}

/// The kind of an XML node and its associated data.
///
/// This enum carries the payload for each node type. Navigation links
/// (parent, children, siblings) are stored in `NodeData`, not here.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document node — there is exactly one per `Document`.
    Document,

    /// An element node, e.g., `<div class="x">`.
    Element {
        /// The element's local name.
        name: String,
        /// Namespace prefix (e.g., `"svg"` in `svg:rect`), if any.
        prefix: Option<String>,
        /// The resolved namespace binding of the element name, if any,
        /// as a non-owning reference into an ancestor-or-self `ns_decls`.
        ns: Option<NsRef>,
        /// Namespace declarations introduced on this element
        /// (`xmlns="..."` / `xmlns:p="..."`), in declaration order.
        ns_decls: Vec<NsDecl>,
        /// Attributes on this element.
        attributes: Vec<Attribute>,
        /// Source lines of the start and end tags, when position
        /// recording is enabled.
        span: Option<(u32, u32)>,
    },

    /// A text node containing character data.
    Text {
        /// The text content (already decoded — character references resolved).
        content: TextContent,
    },

    /// A CDATA section, e.g., `<![CDATA[...]]>`.
    CData {
        /// The CDATA content (no escaping applied).
        content: String,
    },

    /// A comment node, e.g., `<!-- ... -->`.
    Comment {
        /// The comment text (without the `<!--` and `-->` delimiters).
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target (e.g., `"xml-stylesheet"`).
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },

    /// An entity reference node (e.g., `&copy;` when not substituted).
    EntityRef {
        /// The entity name (without `&` and `;`).
        name: String,
    },

    /// A document type declaration node, e.g., `<!DOCTYPE html>`.
    ///
    /// See XML 1.0 §2.8: `[28]` doctypedecl
    DocumentType {
        /// The root element name declared in the DOCTYPE.
        name: String,
        /// The PUBLIC identifier, if any.
        public_id: Option<String>,
        /// The SYSTEM identifier (URI), if any.
        system_id: Option<String>,
    },
}

impl NodeKind {
    /// Returns `true` for element nodes.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }

    /// Returns `true` for text nodes (not CDATA).
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Returns `true` for CDATA sections.
    #[must_use]
    pub fn is_cdata(&self) -> bool {
        matches!(self, Self::CData { .. })
    }
}
