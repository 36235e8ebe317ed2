//! Arena-based XML document tree.
//!
//! This module implements the core tree representation using arena allocation
//! with typed indices. All nodes live in a contiguous `Vec<NodeData>` owned by
//! the `Document`, and are referenced by `NodeId` — a newtype over `NonZeroU32`.
//!
//! This design provides O(1) node access, cache-friendly layout, no reference
//! counting overhead, and safe bulk deallocation (drop the `Document` and
//! everything is freed).
//!
//! # Architecture
//!
//! Arena indices serve as every navigation link (parent, first\_child,
//! last\_child, next\_sibling, prev\_sibling); the tree holds no interior
//! pointers at all. Namespace bindings follow the same rule: an element's
//! resolved namespace is an [`NsRef`] — an index into the `ns_decls` list of
//! the declaring ancestor — not a pointer into another node.

mod node;

pub use node::{NodeKind, TextContent};

use crate::dtd::{DtdSubset, EntityDecl};
use crate::error::BuildDiagnostic;
use std::collections::HashMap;
use std::num::NonZeroU32;

/// A typed index into the document's node arena.
///
/// `NodeId` is a newtype over `NonZeroU32`, meaning it can never be zero
/// and `Option<NodeId>` has the same size as `NodeId` (niche optimization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Creates a `NodeId` from a raw index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 0.
    #[allow(clippy::expect_used, clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::new(index as u32).expect("NodeId index must be non-zero"))
    }

    /// Returns the raw index as a `usize` for indexing into the arena.
    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// A namespace declaration carried by the element that introduced it.
///
/// `prefix: None` is the default namespace (`xmlns="..."`). `uri: None` is a
/// placeholder binding synthesized for a prefix that could not be resolved,
/// so that the tree stays navigable after a namespace warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The declared prefix, or `None` for the default namespace.
    pub prefix: Option<String>,
    /// The bound URI, or `None` for a synthesized placeholder.
    pub uri: Option<String>,
}

/// A non-owning reference to a namespace declaration: the declaring element
/// plus the position within its `ns_decls` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsRef {
    /// The element whose `ns_decls` holds the declaration.
    pub element: NodeId,
    /// Index into that element's `ns_decls`.
    pub index: usize,
}

/// One piece of an attribute's value subtree.
///
/// With entity substitution disabled the value keeps its structure: literal
/// text segments interleaved with entity references. With substitution
/// enabled the value is a single `Text` piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValuePiece {
    /// A literal text segment.
    Text(String),
    /// A reference to a named entity.
    EntityRef {
        /// The entity name (without `&` and `;`).
        name: String,
        /// The replacement text, when the entity was declared with one.
        value: Option<String>,
    },
}

/// An XML attribute on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The attribute name (the local part, e.g., `"lang"` for `xml:lang`).
    pub name: String,
    /// Namespace prefix, if any (e.g., `"xml"` for `xml:lang`).
    pub prefix: Option<String>,
    /// The resolved namespace binding, if any.
    pub ns: Option<NsRef>,
    /// The value subtree, in document order.
    pub pieces: Vec<AttrValuePiece>,
}

impl Attribute {
    /// Returns the attribute value with entity-reference pieces replaced by
    /// their known replacement text.
    #[must_use]
    pub fn value(&self) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                AttrValuePiece::Text(t) => out.push_str(t),
                AttrValuePiece::EntityRef { value, .. } => {
                    if let Some(v) = value {
                        out.push_str(v);
                    }
                }
            }
        }
        out
    }
}

/// Identifies an attribute for the whole-document ID/IDREF tables: the
/// owning element plus the attribute's position within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrRef {
    /// The element carrying the attribute.
    pub element: NodeId,
    /// Index into the element's attribute list.
    pub index: usize,
}

/// Storage for a single node in the document arena.
///
/// Each node stores its kind (element, text, comment, etc.) and links to
/// parent, children, and siblings for tree navigation. Access individual
/// nodes via [`Document::node`].
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is (element, text, comment, etc.) and its payload.
    pub kind: NodeKind,
    /// Parent node, if any. The document root node has no parent.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

/// An XML document assembled from a stream of structural events.
///
/// The `Document` owns all nodes in an arena and provides methods for
/// tree navigation and mutation, plus the document-wide bookkeeping the
/// assembly process maintains: the DTD subsets, the ID/IDREF tables, the
/// declared and detected encodings, and the collected diagnostics.
///
/// # Examples
///
/// ```
/// use treeoxide::tree::{Document, NodeKind};
///
/// let mut doc = Document::new();
/// let root = doc.root();
/// let elem = doc.create_node(NodeKind::Element {
///     name: "note".to_string(),
///     prefix: None,
///     ns: None,
///     ns_decls: vec![],
///     attributes: vec![],
///     span: None,
/// });
/// doc.append_child(root, elem);
/// assert_eq!(doc.node_name(elem), Some("note"));
/// ```
#[derive(Debug)]
pub struct Document {
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    /// The document root node id (the Document node, not the root element).
    root: NodeId,
    /// XML version from the XML declaration (e.g., "1.0").
    pub version: Option<String>,
    /// Encoding from the XML declaration or the outermost input (e.g., "UTF-8").
    pub encoding: Option<String>,
    /// The in-memory charset tag, recorded at end of build when no
    /// encoding was declared or detected.
    pub charset: Option<String>,
    /// Standalone flag from the XML declaration.
    pub standalone: Option<bool>,
    /// Base URI of the document (the outermost input's system id).
    pub base_uri: Option<String>,
    /// `false` once a fatal well-formedness or resource error was reported.
    pub well_formed: bool,
    /// `false` once a validity error was reported.
    pub valid: bool,
    /// Diagnostics collected while building.
    pub diagnostics: Vec<BuildDiagnostic>,
    /// The internal DTD subset, if a DOCTYPE was seen.
    pub int_subset: Option<DtdSubset>,
    /// The external DTD subset, if one was fetched and parsed.
    pub ext_subset: Option<DtdSubset>,
    /// The `DocumentType` node anchoring the internal subset in the tree.
    pub doctype: Option<NodeId>,
    /// ID value → declaring attribute. First registration wins.
    ids: HashMap<String, AttrRef>,
    /// IDREF value → every referencing attribute, in document order.
    idrefs: HashMap<String, Vec<AttrRef>>,
}

impl Document {
    /// Creates a new empty document.
    ///
    /// The document contains a single root Document node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        // Index 0: placeholder (NodeId uses NonZeroU32)
        nodes.push(NodeData::new(NodeKind::Document));
        // Index 1: the document root node
        nodes.push(NodeData::new(NodeKind::Document));
        let root = NodeId::from_index(1);
        Self {
            nodes,
            root,
            version: None,
            encoding: None,
            charset: None,
            standalone: None,
            base_uri: None,
            well_formed: true,
            valid: true,
            diagnostics: Vec::new(),
            int_subset: None,
            ext_subset: None,
            doctype: None,
            ids: HashMap::new(),
            idrefs: HashMap::new(),
        }
    }

    /// Returns the document root node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the root element of the document (the single top-level element).
    ///
    /// Returns `None` if the document has no element children.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.node(id).kind.is_element())
    }

    /// Returns a reference to the `NodeData` for the given node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a valid node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    /// Returns a mutable reference to the `NodeData` for the given node.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the name of a node, if applicable.
    ///
    /// Elements, PIs, entity references and doctype nodes have names; text,
    /// comments, CDATA, and document nodes return `None`.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { name, .. }
            | NodeKind::ProcessingInstruction { target: name, .. }
            | NodeKind::EntityRef { name }
            | NodeKind::DocumentType { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Resolves an [`NsRef`] to the URI of the declaration it points at.
    ///
    /// Returns `None` for a placeholder binding (declared prefix with no
    /// URI) or if the reference does not point at an element.
    #[must_use]
    pub fn ns_uri(&self, ns: NsRef) -> Option<&str> {
        match &self.node(ns.element).kind {
            NodeKind::Element { ns_decls, .. } => {
                ns_decls.get(ns.index).and_then(|d| d.uri.as_deref())
            }
            _ => None,
        }
    }

    /// Resolves an [`NsRef`] to the prefix of the declaration it points at.
    #[must_use]
    pub fn ns_prefix(&self, ns: NsRef) -> Option<&str> {
        match &self.node(ns.element).kind {
            NodeKind::Element { ns_decls, .. } => {
                ns_decls.get(ns.index).and_then(|d| d.prefix.as_deref())
            }
            _ => None,
        }
    }

    /// Returns the namespace URI of an element node, if any.
    ///
    /// Non-element nodes always return `None`. Elements whose name is
    /// unbound, or bound to a placeholder declaration, also return `None`.
    #[must_use]
    pub fn node_namespace(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { ns, .. } => ns.and_then(|r| self.ns_uri(r)),
            _ => None,
        }
    }

    /// Returns the namespace declarations introduced on an element.
    #[must_use]
    pub fn ns_decls(&self, id: NodeId) -> &[NsDecl] {
        match &self.node(id).kind {
            NodeKind::Element { ns_decls, .. } => ns_decls,
            _ => &[],
        }
    }

    /// Returns the text content of a text, comment, or CDATA node.
    ///
    /// For element nodes, returns `None` — use `text_content()` to get the
    /// concatenated text of all descendant text nodes.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text { content } => Some(content.as_str()),
            NodeKind::Comment { content } | NodeKind::CData { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    /// Returns the concatenated text content of a node and all its descendants.
    ///
    /// Entity-reference nodes contribute the replacement text of their
    /// declaration, when one is registered.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut result = String::new();
        self.collect_text(id, &mut result);
        result
    }

    fn collect_text(&self, id: NodeId, buf: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text { content } => buf.push_str(content.as_str()),
            NodeKind::CData { content } => buf.push_str(content),
            NodeKind::EntityRef { name } => {
                if let Some(value) = self.entity(name).and_then(|e| e.value.as_deref()) {
                    buf.push_str(value);
                }
            }
            _ => {
                for child in self.children(id) {
                    self.collect_text(child, buf);
                }
            }
        }
    }

    /// Returns the attributes of an element node.
    ///
    /// Returns an empty slice for non-element nodes.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Returns the computed value of an attribute by name on an element node.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.attributes(id)
            .iter()
            .find(|a| a.name == name)
            .map(Attribute::value)
    }

    /// Resolves an [`AttrRef`] to the attribute it identifies.
    #[must_use]
    pub fn attr(&self, at: AttrRef) -> Option<&Attribute> {
        self.attributes(at.element).get(at.index)
    }

    // --- DTD lookup ---

    /// Looks up an entity declaration, internal subset first.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&EntityDecl> {
        self.int_subset
            .as_ref()
            .and_then(|s| s.entity(name))
            .or_else(|| self.ext_subset.as_ref().and_then(|s| s.entity(name)))
    }

    /// Looks up a parameter entity declaration, internal subset first.
    #[must_use]
    pub fn parameter_entity(&self, name: &str) -> Option<&EntityDecl> {
        self.int_subset
            .as_ref()
            .and_then(|s| s.parameter_entity(name))
            .or_else(|| {
                self.ext_subset
                    .as_ref()
                    .and_then(|s| s.parameter_entity(name))
            })
    }

    // --- ID / IDREF tables ---

    /// Registers an ID value for an attribute. The first registration wins:
    /// returns `false` (without touching the table) when the value is
    /// already mapped.
    pub fn add_id(&mut self, value: &str, attr: AttrRef) -> bool {
        if self.ids.contains_key(value) {
            return false;
        }
        self.ids.insert(value.to_string(), attr);
        true
    }

    /// Registers an IDREF occurrence. References accumulate; there is no
    /// uniqueness constraint.
    pub fn add_idref(&mut self, value: &str, attr: AttrRef) {
        self.idrefs.entry(value.to_string()).or_default().push(attr);
    }

    /// Looks up the element carrying the ID attribute with the given value.
    #[must_use]
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).map(|a| a.element)
    }

    /// Returns every attribute referencing the given ID value.
    #[must_use]
    pub fn idrefs(&self, id: &str) -> &[AttrRef] {
        self.idrefs.get(id).map_or(&[], Vec::as_slice)
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Returns an iterator over the children of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over a node and its ancestors (walking up to root).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Returns an iterator over all descendants of a node (depth-first).
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    // --- Mutation ---

    /// Allocates a new node in the arena and returns its `NodeId`.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(index)
    }

    /// Reinitializes a detached arena slot with a new payload, clearing all
    /// navigation links. Used by the node pool when recycling slots.
    pub(crate) fn reset_node(&mut self, id: NodeId, kind: NodeKind) {
        *self.node_mut(id) = NodeData::new(kind);
    }

    /// Appends a child node to the end of a parent's child list.
    ///
    /// # Panics
    ///
    /// Panics (debug builds) if `child` already has a parent. Detach it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            self.node(child).parent.is_none(),
            "child already has a parent; detach it first"
        );

        self.node_mut(child).parent = Some(parent);

        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
            self.node_mut(parent).last_child = Some(child);
        } else {
            self.node_mut(parent).first_child = Some(child);
            self.node_mut(parent).last_child = Some(child);
        }
    }

    /// Detaches a node from its parent (but does not free it from the arena).
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;

        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }

        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }

        self.node_mut(id).parent = None;
        self.node_mut(id).prev_sibling = None;
        self.node_mut(id).next_sibling = None;
    }

    /// Returns the total number of nodes in the arena (excluding the
    /// placeholder at index 0).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

/// Depth-first iterator over all descendants of a node.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        // Try to go deeper first
        if let Some(child) = self.doc.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }

        // Try next sibling
        if let Some(sibling) = self.doc.next_sibling(current) {
            self.next = Some(sibling);
            return Some(current);
        }

        // Walk up to find an ancestor with a next sibling
        let mut ancestor = self.doc.parent(current);
        while let Some(anc) = ancestor {
            if anc == self.root {
                self.next = None;
                return Some(current);
            }
            if let Some(sibling) = self.doc.next_sibling(anc) {
                self.next = Some(sibling);
                return Some(current);
            }
            ancestor = self.doc.parent(anc);
        }

        self.next = None;
        Some(current)
    }
}
