//! SAX2 structural event surface.
//!
//! This is the seam between the tokenizer and the tree assembler. The
//! tokenizer owns the bytes and the grammar; whenever it recognizes a
//! structural construct it fires the corresponding [`SaxHandler`] method.
//! [`TreeBuilder`](crate::builder::TreeBuilder) implements the trait and
//! turns the event stream into a document tree, but any other sink can be
//! plugged in instead.
//!
//! # Examples
//!
//! ```
//! use treeoxide::sax::SaxHandler;
//!
//! struct ElementCounter {
//!     count: usize,
//! }
//!
//! impl SaxHandler for ElementCounter {
//!     fn start_element(
//!         &mut self,
//!         _local_name: &str,
//!         _prefix: Option<&str>,
//!         _uri: Option<&str>,
//!         _namespaces: &[treeoxide::sax::NsBinding],
//!         _nb_defaulted: usize,
//!         _attributes: &[treeoxide::sax::SaxAttribute],
//!     ) {
//!         self.count += 1;
//!     }
//! }
//!
//! let mut counter = ElementCounter { count: 0 };
//! counter.start_document();
//! counter.start_element("root", None, None, &[], 0, &[]);
//! counter.end_element("root", None, None);
//! counter.end_document();
//! assert_eq!(counter.count, 1);
//! ```

use crate::dtd::{AttributeDecl, ElementDecl, EntityDecl, EntityKind};

/// A namespace declaration reported with a start-element event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsBinding {
    /// The declared prefix, or `None` for the default namespace.
    pub prefix: Option<String>,
    /// The bound URI.
    pub uri: String,
}

/// An attribute reported with a start-element event.
///
/// The value is the raw attribute text as the tokenizer saw it; entity
/// references inside it are reported as `&name;` when substitution is off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaxAttribute {
    /// The attribute's local name.
    pub local_name: String,
    /// Namespace prefix, if any.
    pub prefix: Option<String>,
    /// Namespace URI the tokenizer resolved for the prefix, if any.
    pub uri: Option<String>,
    /// The attribute value text.
    pub value: String,
}

impl SaxAttribute {
    /// Convenience constructor for an unprefixed attribute.
    #[must_use]
    pub fn new(local_name: &str, value: &str) -> Self {
        Self {
            local_name: local_name.to_string(),
            prefix: None,
            uri: None,
            value: value.to_string(),
        }
    }
}

/// A SAX2 event handler trait.
///
/// Implement the callbacks you care about; all methods have default no-op
/// implementations so you only need to override what you need.
#[allow(unused_variables)]
pub trait SaxHandler {
    /// Called at the start of the document, before any other events.
    fn start_document(&mut self) {}

    /// Called at the end of the document, after all other events.
    fn end_document(&mut self) {}

    /// Called when an element start tag is encountered.
    ///
    /// `namespaces` lists the declarations introduced on this tag.
    /// The last `nb_defaulted` entries of `attributes` were not present in
    /// the source but supplied from attribute-list declaration defaults.
    fn start_element(
        &mut self,
        local_name: &str,
        prefix: Option<&str>,
        uri: Option<&str>,
        namespaces: &[NsBinding],
        nb_defaulted: usize,
        attributes: &[SaxAttribute],
    ) {
    }

    /// Called when an element end tag is encountered (or a self-closing tag ends).
    fn end_element(&mut self, local_name: &str, prefix: Option<&str>, uri: Option<&str>) {}

    /// Called for character data (text content).
    fn characters(&mut self, content: &str) {}

    /// Called for CDATA sections.
    fn cdata_block(&mut self, content: &str) {}

    /// Called for an entity or character reference left unsubstituted.
    /// Character references are reported with a leading `#`.
    fn reference(&mut self, name: &str) {}

    /// Called for XML comments.
    fn comment(&mut self, content: &str) {}

    /// Called for processing instructions.
    fn processing_instruction(&mut self, target: &str, data: Option<&str>) {}

    /// Called when the DOCTYPE declaration opens, before any declaration
    /// events from the internal subset.
    fn internal_subset(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {}

    /// Called once the internal subset is done, if the DOCTYPE referenced
    /// an external subset that should now be fetched and parsed.
    fn external_subset(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {}

    /// Called for `<!ENTITY ...>` declarations (other than unparsed ones).
    fn entity_decl(
        &mut self,
        name: &str,
        kind: EntityKind,
        public_id: Option<&str>,
        system_id: Option<&str>,
        content: Option<&str>,
    ) {
    }

    /// Called for `<!ENTITY name ... NDATA notation>` declarations.
    fn unparsed_entity_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        notation_name: &str,
    ) {
    }

    /// Called for each attribute definition in an `<!ATTLIST ...>` declaration.
    fn attribute_decl(&mut self, decl: AttributeDecl) {}

    /// Called for `<!ELEMENT ...>` declarations.
    fn element_decl(&mut self, decl: ElementDecl) {}

    /// Called for `<!NOTATION ...>` declarations.
    fn notation_decl(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {}

    /// Asked by the tokenizer to resolve an entity reference it is about to
    /// expand. Returns the declaration, fetching external content on demand
    /// when the handler supports it.
    fn get_entity(&mut self, name: &str) -> Option<EntityDecl> {
        None
    }

    /// Whether the document declared itself standalone.
    fn is_standalone(&self) -> bool {
        false
    }

    /// Whether an internal DTD subset has been seen.
    fn has_internal_subset(&self) -> bool {
        false
    }

    /// Whether an external DTD subset has been registered.
    fn has_external_subset(&self) -> bool {
        false
    }
}

/// A default no-op SAX handler. Useful as a base or for testing.
pub struct DefaultHandler;

impl SaxHandler for DefaultHandler {}
