//! The document assembler.
//!
//! [`TreeBuilder`] is the default sink for the SAX2 event surface: it
//! consumes structural events from a tokenizer and incrementally assembles
//! a [`Document`] — elements, coalesced text, namespace scopes, DTD
//! declaration registries, and the whole-document ID/IDREF tables.
//!
//! The builder never panics on malformed event sequences. Every problem is
//! reported through the session's diagnostics channel, and the error policy
//! is per-kind: well-formedness errors latch the builder (unless recovery
//! is enabled), validity errors clear the valid flag and continue, warnings
//! are advisory, and resource errors disable the builder permanently —
//! every later event becomes a no-op.
//!
//! # Examples
//!
//! ```
//! use treeoxide::builder::TreeBuilder;
//! use treeoxide::sax::SaxHandler;
//!
//! let mut builder = TreeBuilder::new();
//! builder.start_document();
//! builder.start_element("doc", None, None, &[], 0, &[]);
//! builder.characters("hello");
//! builder.end_element("doc", None, None);
//! builder.end_document();
//!
//! let doc = builder.finish();
//! let root = doc.root_element().unwrap();
//! assert_eq!(doc.text_content(root), "hello");
//! ```

pub mod namespaces;
pub mod pool;
mod subset;
pub mod text;

pub use pool::NodePool;
pub use subset::SubsetGrammar;
pub use text::TextAccumulator;

use std::sync::Arc;

use crate::dtd::{
    self, AttributeDecl, AttributeType, DtdSubset, ElementDecl, EntityDecl, EntityKind,
    NotationDecl,
};
use crate::error::{BuildDiagnostic, DiagnosticKind};
use crate::input::{resolve_uri, EntityResolver, InputStack, ResolveRequest};
use crate::sax::{NsBinding, SaxAttribute, SaxHandler};
use crate::tree::{AttrRef, AttrValuePiece, Attribute, Document, NodeId, NodeKind, NsDecl, NsRef};
use crate::util::qname::build_qname;
use crate::util::strings::StringPool;

use namespaces::{find_binding, XML_NAMESPACE};

/// Default maximum element nesting depth.
const DEFAULT_MAX_DEPTH: u32 = 256;

/// Default maximum depth of nested external-resource parses.
const DEFAULT_MAX_FETCH_DEPTH: u32 = 40;

/// Which DTD subset declarations currently belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsetState {
    /// Not inside any DTD subset.
    Outside,
    /// Inside the internal subset (between DOCTYPE open and close).
    Internal,
    /// Inside a nested external-subset parse.
    External,
}

/// Build options controlling assembler behavior and security limits.
///
/// Use the builder pattern to configure options:
///
/// ```
/// use treeoxide::builder::BuildOptions;
///
/// let opts = BuildOptions::default()
///     .recover(true)
///     .pedantic(true)
///     .max_depth(128);
/// ```
pub struct BuildOptions {
    /// If true, keep assembling after well-formedness errors.
    pub recover: bool,
    /// If true, the tokenizer substitutes entities, so attribute values
    /// arrive as plain text and `reference` events are not expected.
    pub replace_entities: bool,
    /// If true, keep attributes supplied from ATTLIST defaults; if false,
    /// the trailing defaulted attributes of each start tag are dropped.
    pub complete_attributes: bool,
    /// If true, skip ID/IDREF table registration entirely.
    pub skip_ids: bool,
    /// If true, report warnings for benign redefinitions.
    pub pedantic: bool,
    /// If true, fetch external parsed entities on demand for validation.
    pub validate: bool,
    /// If true, record source line spans on elements and diagnostics.
    pub record_positions: bool,
    /// If true, lift the text-size limit.
    pub huge: bool,
    /// If true, intern short whitespace/boundary text runs.
    pub intern_text: bool,
    /// Maximum text node length in bytes (ignored when `huge` is set).
    pub max_text_length: usize,
    /// Maximum element nesting depth.
    pub max_depth: u32,
    /// Maximum depth of nested external-resource parses.
    pub max_fetch_depth: u32,
    /// Optional callback for fetching external resources.
    pub entity_resolver: Option<EntityResolver>,
    /// Optional callback that tokenizes external subset content, driving
    /// declaration events back into the builder.
    pub subset_grammar: Option<SubsetGrammar>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            recover: false,
            replace_entities: false,
            complete_attributes: false,
            skip_ids: false,
            pedantic: false,
            validate: false,
            record_positions: false,
            huge: false,
            intern_text: true,
            max_text_length: text::MAX_TEXT_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
            max_fetch_depth: DEFAULT_MAX_FETCH_DEPTH,
            entity_resolver: None,
            subset_grammar: None,
        }
    }
}

impl Clone for BuildOptions {
    fn clone(&self) -> Self {
        Self {
            recover: self.recover,
            replace_entities: self.replace_entities,
            complete_attributes: self.complete_attributes,
            skip_ids: self.skip_ids,
            pedantic: self.pedantic,
            validate: self.validate,
            record_positions: self.record_positions,
            huge: self.huge,
            intern_text: self.intern_text,
            max_text_length: self.max_text_length,
            max_depth: self.max_depth,
            max_fetch_depth: self.max_fetch_depth,
            entity_resolver: self.entity_resolver.clone(),
            subset_grammar: self.subset_grammar.clone(),
        }
    }
}

impl std::fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOptions")
            .field("recover", &self.recover)
            .field("replace_entities", &self.replace_entities)
            .field("complete_attributes", &self.complete_attributes)
            .field("skip_ids", &self.skip_ids)
            .field("pedantic", &self.pedantic)
            .field("validate", &self.validate)
            .field("record_positions", &self.record_positions)
            .field("huge", &self.huge)
            .field("intern_text", &self.intern_text)
            .field("max_text_length", &self.max_text_length)
            .field("max_depth", &self.max_depth)
            .field("max_fetch_depth", &self.max_fetch_depth)
            .field(
                "entity_resolver",
                &self.entity_resolver.as_ref().map(|_| "..."),
            )
            .field(
                "subset_grammar",
                &self.subset_grammar.as_ref().map(|_| "..."),
            )
            .finish()
    }
}

impl BuildOptions {
    /// Enables or disables error recovery mode.
    #[must_use]
    pub fn recover(mut self, yes: bool) -> Self {
        self.recover = yes;
        self
    }

    /// Declares that the tokenizer substitutes entity references itself.
    #[must_use]
    pub fn replace_entities(mut self, yes: bool) -> Self {
        self.replace_entities = yes;
        self
    }

    /// Keeps or drops attributes supplied from ATTLIST defaults.
    #[must_use]
    pub fn complete_attributes(mut self, yes: bool) -> Self {
        self.complete_attributes = yes;
        self
    }

    /// Disables ID/IDREF table registration.
    #[must_use]
    pub fn skip_ids(mut self, yes: bool) -> Self {
        self.skip_ids = yes;
        self
    }

    /// Enables pedantic redefinition warnings.
    #[must_use]
    pub fn pedantic(mut self, yes: bool) -> Self {
        self.pedantic = yes;
        self
    }

    /// Enables on-demand fetching of external entities for validation.
    #[must_use]
    pub fn validate(mut self, yes: bool) -> Self {
        self.validate = yes;
        self
    }

    /// Records source line spans on elements and diagnostics.
    #[must_use]
    pub fn record_positions(mut self, yes: bool) -> Self {
        self.record_positions = yes;
        self
    }

    /// Lifts the text-size limit.
    #[must_use]
    pub fn huge(mut self, yes: bool) -> Self {
        self.huge = yes;
        self
    }

    /// Enables or disables interning of short text runs.
    #[must_use]
    pub fn intern_text(mut self, yes: bool) -> Self {
        self.intern_text = yes;
        self
    }

    /// Sets the maximum text node length in bytes.
    #[must_use]
    pub fn max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    /// Sets the maximum depth of nested external-resource parses.
    #[must_use]
    pub fn max_fetch_depth(mut self, max: u32) -> Self {
        self.max_fetch_depth = max;
        self
    }

    /// Sets the external resource resolver callback.
    ///
    /// # Security
    ///
    /// **Warning:** Resolving external resources opens the door to XML
    /// External Entity (XXE) attacks. Only use this with trusted input, and
    /// consider restricting which URIs the resolver is willing to fetch.
    #[must_use]
    pub fn entity_resolver(
        mut self,
        resolver: impl Fn(ResolveRequest<'_>) -> Option<crate::input::ExternalInput>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.entity_resolver = Some(Arc::new(resolver));
        self
    }

    /// Sets the callback that tokenizes external subset content.
    #[must_use]
    pub fn subset_grammar(
        mut self,
        grammar: impl Fn(&mut TreeBuilder, &str) + Send + Sync + 'static,
    ) -> Self {
        self.subset_grammar = Some(Arc::new(grammar));
        self
    }
}

/// Assembles a [`Document`] from SAX2 structural events.
pub struct TreeBuilder {
    doc: Document,
    options: BuildOptions,
    /// Open-element stack, innermost last.
    open: Vec<NodeId>,
    in_subset: SubsetState,
    /// Unlinked anchor node for content seen inside the external subset.
    ext_doctype: Option<NodeId>,
    /// Set once a fatal or resource error latched the session.
    disabled: bool,
    text: TextAccumulator,
    pool: NodePool,
    strings: StringPool,
    inputs: InputStack,
    fetch_depth: u32,
}

impl TreeBuilder {
    /// Creates a builder with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(BuildOptions::default())
    }

    /// Creates a builder with the given options.
    #[must_use]
    pub fn with_options(options: BuildOptions) -> Self {
        Self {
            doc: Document::new(),
            options,
            open: Vec::new(),
            in_subset: SubsetState::Outside,
            ext_doctype: None,
            disabled: false,
            text: TextAccumulator::new(),
            pool: NodePool::default(),
            strings: StringPool::new(),
            inputs: InputStack::new(),
            fetch_depth: 0,
        }
    }

    /// The document assembled so far.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The diagnostics collected so far.
    #[must_use]
    pub fn diagnostics(&self) -> &[BuildDiagnostic] {
        &self.doc.diagnostics
    }

    /// The options this session was created with.
    #[must_use]
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// `true` once a fatal or resource error has latched the session.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// The stack of inputs the tokenizer is reading from. The driver pushes
    /// the document input before `start_document` and keeps the innermost
    /// entry's line current when positions are recorded.
    pub fn inputs_mut(&mut self) -> &mut InputStack {
        &mut self.inputs
    }

    /// Records the XML declaration (`<?xml version=... ?>`) contents.
    pub fn declaration(
        &mut self,
        version: Option<&str>,
        encoding: Option<&str>,
        standalone: Option<bool>,
    ) {
        if self.disabled {
            return;
        }
        if version.is_some() {
            self.doc.version = version.map(str::to_string);
        }
        if encoding.is_some() {
            self.doc.encoding = encoding.map(str::to_string);
        }
        if standalone.is_some() {
            self.doc.standalone = standalone;
        }
    }

    /// Finishes the session and returns the assembled document.
    #[must_use]
    pub fn finish(mut self) -> Document {
        self.flush_text();
        self.doc
    }

    // --- internals ---

    fn current_line(&self) -> Option<u32> {
        if self.options.record_positions {
            self.inputs.innermost().map(|i| i.line)
        } else {
            None
        }
    }

    fn report(&mut self, mut diag: BuildDiagnostic) {
        if diag.line.is_none() {
            diag.line = self.current_line();
        }
        match diag.kind {
            DiagnosticKind::Resource => {
                self.doc.well_formed = false;
                self.disabled = true;
            }
            DiagnosticKind::WellFormedness => {
                self.doc.well_formed = false;
                if !self.options.recover {
                    self.disabled = true;
                }
            }
            DiagnosticKind::Validity => self.doc.valid = false,
            DiagnosticKind::Warning | DiagnosticKind::Namespace => {}
        }
        self.doc.diagnostics.push(diag);
    }

    /// Ends the current text run. A run that ends empty leaves no node
    /// behind: its slot goes back to the pool. Empty runs arise when the
    /// tokenizer emits an empty character batch, e.g., expanding an
    /// entity with empty replacement text.
    fn flush_text(&mut self) {
        if let Some(node) = self.text.current() {
            if self.doc.node_text(node).is_some_and(str::is_empty) {
                self.pool.recycle(&mut self.doc, node);
            }
        }
        self.text.flush();
    }

    /// Where character data and child elements go right now.
    fn content_parent(&self) -> NodeId {
        self.open.last().copied().unwrap_or_else(|| self.doc.root())
    }

    /// Where comments and PIs go right now: inside a subset they parent to
    /// the subset's doctype anchor instead of the document.
    fn misc_parent(&self) -> NodeId {
        match self.in_subset {
            SubsetState::Internal => self.doc.doctype.unwrap_or_else(|| self.doc.root()),
            SubsetState::External => self.ext_doctype.unwrap_or_else(|| self.doc.root()),
            SubsetState::Outside => self.content_parent(),
        }
    }

    /// Resolves the element's own name binding, synthesizing the implicit
    /// `xml` binding or a placeholder (plus warning) as needed.
    fn resolve_element_ns(
        &mut self,
        elem: NodeId,
        local_name: &str,
        prefix: Option<&str>,
    ) -> Option<NsRef> {
        if let Some(binding) = find_binding(&self.doc, elem, prefix) {
            // An empty-URI default declaration (xmlns="") unbinds.
            if prefix.is_none() && self.doc.ns_uri(binding).map_or(true, str::is_empty) {
                return None;
            }
            return Some(binding);
        }
        let p = prefix?;
        if p == "xml" {
            return namespaces::declare(
                &mut self.doc,
                elem,
                NsDecl {
                    prefix: Some("xml".to_string()),
                    uri: Some(XML_NAMESPACE.to_string()),
                },
            );
        }
        self.report(
            BuildDiagnostic::new(
                DiagnosticKind::Namespace,
                format!("Namespace prefix {p} on {local_name} is not defined"),
            )
            .with_info(Some(p.to_string()), Some(local_name.to_string())),
        );
        // Placeholder binding: keeps the tree navigable, resolves to no URI.
        namespaces::declare(
            &mut self.doc,
            elem,
            NsDecl {
                prefix: Some(p.to_string()),
                uri: None,
            },
        )
    }

    fn add_attribute(&mut self, elem: NodeId, attr: &SaxAttribute) {
        let ns = match attr.prefix.as_deref() {
            None => None,
            Some("xml") => match find_binding(&self.doc, elem, Some("xml")) {
                Some(binding) => Some(binding),
                None => namespaces::declare(
                    &mut self.doc,
                    elem,
                    NsDecl {
                        prefix: Some("xml".to_string()),
                        uri: Some(XML_NAMESPACE.to_string()),
                    },
                ),
            },
            Some(p) => {
                let binding = find_binding(&self.doc, elem, Some(p));
                if binding.is_none() {
                    self.report(
                        BuildDiagnostic::new(
                            DiagnosticKind::Namespace,
                            format!(
                                "Namespace prefix {p} for {} on {} is not defined",
                                attr.local_name,
                                self.doc.node_name(elem).unwrap_or_default()
                            ),
                        )
                        .with_info(Some(p.to_string()), Some(attr.local_name.clone())),
                    );
                }
                binding
            }
        };

        let pieces = if self.options.replace_entities || !attr.value.contains('&') {
            vec![AttrValuePiece::Text(attr.value.clone())]
        } else {
            self.parse_value_pieces(&attr.value)
        };

        let attribute = Attribute {
            name: attr.local_name.clone(),
            prefix: attr.prefix.clone(),
            ns,
            pieces,
        };

        let index = match &mut self.doc.node_mut(elem).kind {
            NodeKind::Element { attributes, .. } => {
                attributes.push(attribute);
                attributes.len() - 1
            }
            _ => return,
        };

        self.register_id_attr(elem, index);
    }

    /// Splits a raw attribute value into text and entity-reference pieces.
    /// Character references are decoded in place; undeclared entities keep
    /// a `None` replacement.
    fn parse_value_pieces(&self, value: &str) -> Vec<AttrValuePiece> {
        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut rest = value;

        while let Some(amp) = rest.find('&') {
            current.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            match after.find(';') {
                Some(end) => {
                    let name = &after[..end];
                    if let Some(num) = name.strip_prefix('#') {
                        // Character reference: decode into the text piece.
                        let code = num.strip_prefix('x').map_or_else(
                            || num.parse::<u32>().ok(),
                            |hex| u32::from_str_radix(hex, 16).ok(),
                        );
                        match code.and_then(char::from_u32) {
                            Some(c) => current.push(c),
                            None => current.push_str(&rest[amp..amp + 2 + end]),
                        }
                    } else {
                        if !current.is_empty() {
                            pieces.push(AttrValuePiece::Text(std::mem::take(&mut current)));
                        }
                        let replacement = dtd::predefined_entity(name)
                            .and_then(|e| e.value.clone())
                            .or_else(|| self.doc.entity(name).and_then(|e| e.value.clone()));
                        pieces.push(AttrValuePiece::EntityRef {
                            name: name.to_string(),
                            value: replacement,
                        });
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    // Stray ampersand; keep it literally.
                    current.push('&');
                    rest = after;
                }
            }
        }
        current.push_str(rest);
        if !current.is_empty() || pieces.is_empty() {
            pieces.push(AttrValuePiece::Text(current));
        }
        pieces
    }

    /// Registers the attribute in the ID/IDREF tables when its declared
    /// type (or the reserved `xml:id` name) calls for it.
    fn register_id_attr(&mut self, elem: NodeId, index: usize) {
        if self.options.skip_ids {
            return;
        }
        let (elem_qname, attr_qname, is_xml_id, value) = {
            let NodeKind::Element {
                name,
                prefix,
                attributes,
                ..
            } = &self.doc.node(elem).kind
            else {
                return;
            };
            let Some(attr) = attributes.get(index) else {
                return;
            };
            (
                build_qname(prefix.as_deref(), name),
                build_qname(attr.prefix.as_deref(), &attr.name),
                attr.prefix.as_deref() == Some("xml") && attr.name == "id",
                attr.value(),
            )
        };

        let decl_type = self.declared_attribute_type(&elem_qname, &attr_qname);
        let attr_ref = AttrRef {
            element: elem,
            index,
        };

        if is_xml_id || decl_type == Some(AttributeType::Id) {
            if !self.doc.add_id(&value, attr_ref) {
                self.report(
                    BuildDiagnostic::new(
                        DiagnosticKind::Validity,
                        format!("ID {value} already defined"),
                    )
                    .with_info(Some(value), None),
                );
            }
        } else if decl_type == Some(AttributeType::IdRef) {
            self.doc.add_idref(&value, attr_ref);
        } else if decl_type == Some(AttributeType::IdRefs) {
            for token in value.split_ascii_whitespace() {
                self.doc.add_idref(token, attr_ref);
            }
        }
    }

    fn declared_attribute_type(&self, elem: &str, attr: &str) -> Option<AttributeType> {
        self.doc
            .int_subset
            .as_ref()
            .and_then(|s| s.attribute(elem, attr))
            .or_else(|| {
                self.doc
                    .ext_subset
                    .as_ref()
                    .and_then(|s| s.attribute(elem, attr))
            })
            .map(|d| d.attribute_type.clone())
    }

    fn register_entity(&mut self, decl: EntityDecl) {
        let name = decl.name.clone();
        let is_param = matches!(
            decl.kind,
            EntityKind::InternalParameter | EntityKind::ExternalParameter
        );
        let subset = match self.in_subset {
            SubsetState::Outside => {
                self.report(BuildDiagnostic::new(
                    DiagnosticKind::WellFormedness,
                    format!("entity declaration {name} outside of any DTD subset"),
                ));
                return;
            }
            SubsetState::Internal => self.doc.int_subset.as_mut(),
            SubsetState::External => self.doc.ext_subset.as_mut(),
        };
        let Some(subset) = subset else {
            return;
        };
        let added = if is_param {
            subset.add_parameter_entity(decl)
        } else {
            subset.add_entity(decl)
        };
        if !added && self.options.pedantic {
            self.report(
                BuildDiagnostic::new(
                    DiagnosticKind::Warning,
                    format!("Entity {name} already defined"),
                )
                .with_info(Some(name), None),
            );
        }
    }

    fn innermost_base(&self) -> Option<String> {
        self.inputs.innermost().and_then(|i| i.system_id.clone())
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SaxHandler for TreeBuilder {
    fn start_document(&mut self) {
        if self.disabled {
            return;
        }
        if self.doc.version.is_none() {
            self.doc.version = Some("1.0".to_string());
        }
        // Encoding reconciliation order: prior explicit declaration, then
        // the innermost open input's detected encoding, then nothing.
        if self.doc.encoding.is_none() {
            self.doc.encoding = self.inputs.innermost().and_then(|i| i.encoding.clone());
        }
        if self.doc.base_uri.is_none() {
            self.doc.base_uri = self.inputs.outermost().and_then(|i| i.system_id.clone());
        }
    }

    fn end_document(&mut self) {
        if self.disabled {
            return;
        }
        self.flush_text();
        // Encoding reconciliation: a declared encoding wins; otherwise the
        // document adopts whatever the innermost open input was detected to
        // be in. With neither, only the in-memory charset tag is recorded.
        if self.doc.encoding.is_none() {
            self.doc.encoding = self.inputs.innermost().and_then(|i| i.encoding.clone());
        }
        if self.doc.encoding.is_none() && self.doc.charset.is_none() {
            self.doc.charset = Some("UTF-8".to_string());
        }
    }

    fn start_element(
        &mut self,
        local_name: &str,
        prefix: Option<&str>,
        _uri: Option<&str>,
        namespaces: &[NsBinding],
        nb_defaulted: usize,
        attributes: &[SaxAttribute],
    ) {
        if self.disabled {
            return;
        }
        self.in_subset = SubsetState::Outside;
        self.flush_text();

        if self.open.len() as u32 >= self.options.max_depth {
            self.report(BuildDiagnostic::new(
                DiagnosticKind::Resource,
                format!("maximum element nesting depth exceeded at {local_name}"),
            ));
            return;
        }

        let line = self.current_line();
        let parent = self.content_parent();
        let elem = self.pool.alloc(
            &mut self.doc,
            NodeKind::Element {
                name: local_name.to_string(),
                prefix: prefix.map(str::to_string),
                ns: None,
                ns_decls: namespaces
                    .iter()
                    .map(|b| NsDecl {
                        prefix: b.prefix.clone(),
                        uri: Some(b.uri.clone()),
                    })
                    .collect(),
                attributes: Vec::with_capacity(attributes.len()),
                span: line.map(|l| (l, l)),
            },
        );
        self.doc.append_child(parent, elem);
        self.open.push(elem);

        let ns = self.resolve_element_ns(elem, local_name, prefix);
        if let NodeKind::Element { ns: slot, .. } = &mut self.doc.node_mut(elem).kind {
            *slot = ns;
        }

        // The trailing nb_defaulted attributes came from ATTLIST defaults;
        // drop them unless complete attributes were requested.
        let visible = if self.options.complete_attributes {
            attributes
        } else {
            &attributes[..attributes.len().saturating_sub(nb_defaulted)]
        };
        for attr in visible {
            self.add_attribute(elem, attr);
        }
    }

    fn end_element(&mut self, local_name: &str, _prefix: Option<&str>, _uri: Option<&str>) {
        if self.disabled {
            return;
        }
        self.flush_text();
        match self.open.pop() {
            Some(elem) => {
                if let Some(line) = self.current_line() {
                    if let NodeKind::Element {
                        span: Some((_, end)),
                        ..
                    } = &mut self.doc.node_mut(elem).kind
                    {
                        *end = line;
                    }
                }
            }
            None => {
                self.report(BuildDiagnostic::new(
                    DiagnosticKind::WellFormedness,
                    format!("unbalanced end of element {local_name}"),
                ));
            }
        }
    }

    fn characters(&mut self, content: &str) {
        if self.disabled {
            return;
        }
        // Character data outside the root element has no owner; drop it.
        if self.open.is_empty() {
            return;
        }
        let parent = self.content_parent();

        // Extend the current run only while it is still the last child of
        // the insertion point.
        if let Some(node) = self.text.current() {
            if self.doc.last_child(parent) == Some(node) {
                let result = self.text.append(
                    &mut self.doc,
                    content,
                    self.options.max_text_length,
                    self.options.huge,
                );
                if let Err(diag) = result {
                    self.report(diag);
                }
                return;
            }
            self.flush_text();
        }

        if !self.options.huge && content.len() > self.options.max_text_length {
            self.report(BuildDiagnostic::new(
                DiagnosticKind::Resource,
                "text node too long, try the huge-text option",
            ));
            return;
        }
        let node = self.text.begin(
            &mut self.doc,
            &mut self.pool,
            &mut self.strings,
            content,
            self.options.intern_text,
        );
        self.doc.append_child(parent, node);
    }

    fn cdata_block(&mut self, content: &str) {
        if self.disabled {
            return;
        }
        self.flush_text();
        let parent = self.content_parent();

        // Consecutive CDATA sections coalesce into one node.
        if let Some(last) = self.doc.last_child(parent) {
            if let NodeKind::CData { content: existing } = &mut self.doc.node_mut(last).kind {
                if self.options.huge
                    || existing.len() + content.len() <= self.options.max_text_length
                {
                    existing.push_str(content);
                } else {
                    self.report(BuildDiagnostic::new(
                        DiagnosticKind::Resource,
                        "CDATA section too long, try the huge-text option",
                    ));
                }
                return;
            }
        }

        let node = self.pool.alloc(
            &mut self.doc,
            NodeKind::CData {
                content: content.to_string(),
            },
        );
        self.doc.append_child(parent, node);
    }

    fn reference(&mut self, name: &str) {
        if self.disabled {
            return;
        }
        self.flush_text();
        let parent = self.content_parent();
        let node = self.pool.alloc(
            &mut self.doc,
            NodeKind::EntityRef {
                name: name.to_string(),
            },
        );
        self.doc.append_child(parent, node);
    }

    fn comment(&mut self, content: &str) {
        if self.disabled {
            return;
        }
        self.flush_text();
        let parent = self.misc_parent();
        let node = self.pool.alloc(
            &mut self.doc,
            NodeKind::Comment {
                content: content.to_string(),
            },
        );
        self.doc.append_child(parent, node);
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) {
        if self.disabled {
            return;
        }
        self.flush_text();
        let parent = self.misc_parent();
        let node = self.pool.alloc(
            &mut self.doc,
            NodeKind::ProcessingInstruction {
                target: target.to_string(),
                data: data.map(str::to_string),
            },
        );
        self.doc.append_child(parent, node);
    }

    fn internal_subset(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        if self.disabled {
            return;
        }
        self.doc.int_subset = Some(DtdSubset::new(name, public_id, system_id));
        let root = self.doc.root();
        let dt = self.doc.create_node(NodeKind::DocumentType {
            name: name.to_string(),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
        });
        self.doc.append_child(root, dt);
        self.doc.doctype = Some(dt);
        self.in_subset = SubsetState::Internal;
    }

    fn external_subset(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        if self.disabled {
            return;
        }
        self.fetch_external_subset(name, public_id, system_id);
    }

    fn entity_decl(
        &mut self,
        name: &str,
        kind: EntityKind,
        public_id: Option<&str>,
        system_id: Option<&str>,
        content: Option<&str>,
    ) {
        if self.disabled {
            return;
        }
        let base = self.innermost_base();
        let decl = EntityDecl {
            name: name.to_string(),
            kind,
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
            notation: None,
            value: content.map(str::to_string),
            base_uri: system_id.map(|s| resolve_uri(base.as_deref(), s)),
        };
        self.register_entity(decl);
    }

    fn unparsed_entity_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        notation_name: &str,
    ) {
        if self.disabled {
            return;
        }
        let base = self.innermost_base();
        let decl = EntityDecl {
            name: name.to_string(),
            kind: EntityKind::Unparsed,
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
            notation: Some(notation_name.to_string()),
            value: None,
            base_uri: system_id.map(|s| resolve_uri(base.as_deref(), s)),
        };
        self.register_entity(decl);
    }

    fn attribute_decl(&mut self, decl: AttributeDecl) {
        if self.disabled {
            return;
        }
        // xml:id must be declared as ID. The report is informative only:
        // it does not affect the document's valid flag.
        if decl.attribute_name == "xml:id" && decl.attribute_type != AttributeType::Id {
            let was_valid = self.doc.valid;
            self.report(BuildDiagnostic::new(
                DiagnosticKind::Validity,
                "xml:id : attribute type should be ID".to_string(),
            ));
            self.doc.valid = was_valid;
        }
        let name = format!("{}/{}", decl.element_name, decl.attribute_name);
        let subset = match self.in_subset {
            SubsetState::Outside => {
                self.report(BuildDiagnostic::new(
                    DiagnosticKind::WellFormedness,
                    format!("attribute declaration {name} outside of any DTD subset"),
                ));
                return;
            }
            SubsetState::Internal => self.doc.int_subset.as_mut(),
            SubsetState::External => self.doc.ext_subset.as_mut(),
        };
        let Some(subset) = subset else {
            return;
        };
        let added = subset.add_attribute(decl);
        if !added && self.options.pedantic {
            self.report(
                BuildDiagnostic::new(
                    DiagnosticKind::Warning,
                    format!("Attribute {name} already declared"),
                )
                .with_info(Some(name), None),
            );
        }
    }

    fn element_decl(&mut self, decl: ElementDecl) {
        if self.disabled {
            return;
        }
        let name = decl.name.clone();
        let subset = match self.in_subset {
            SubsetState::Outside => {
                self.report(BuildDiagnostic::new(
                    DiagnosticKind::WellFormedness,
                    format!("element declaration {name} outside of any DTD subset"),
                ));
                return;
            }
            SubsetState::Internal => self.doc.int_subset.as_mut(),
            SubsetState::External => self.doc.ext_subset.as_mut(),
        };
        let Some(subset) = subset else {
            return;
        };
        let added = subset.add_element(decl);
        if !added && self.options.pedantic {
            self.report(
                BuildDiagnostic::new(
                    DiagnosticKind::Warning,
                    format!("Element {name} already declared"),
                )
                .with_info(Some(name), None),
            );
        }
    }

    fn notation_decl(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        if self.disabled {
            return;
        }
        if public_id.is_none() && system_id.is_none() {
            self.report(
                BuildDiagnostic::new(
                    DiagnosticKind::WellFormedness,
                    format!("NOTATION {name}: public or system identifier required"),
                )
                .with_info(Some(name.to_string()), None),
            );
            return;
        }
        let decl = NotationDecl {
            name: name.to_string(),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
        };
        let subset = match self.in_subset {
            SubsetState::Outside => {
                self.report(BuildDiagnostic::new(
                    DiagnosticKind::WellFormedness,
                    format!("notation declaration {name} outside of any DTD subset"),
                ));
                return;
            }
            SubsetState::Internal => self.doc.int_subset.as_mut(),
            SubsetState::External => self.doc.ext_subset.as_mut(),
        };
        let Some(subset) = subset else {
            return;
        };
        let added = subset.add_notation(decl);
        if !added && self.options.pedantic {
            self.report(
                BuildDiagnostic::new(
                    DiagnosticKind::Warning,
                    format!("Notation {name} already declared"),
                )
                .with_info(Some(name.to_string()), None),
            );
        }
    }

    fn get_entity(&mut self, name: &str) -> Option<EntityDecl> {
        if self.disabled {
            return None;
        }
        if self.in_subset == SubsetState::Outside {
            if let Some(predefined) = dtd::predefined_entity(name) {
                return Some(predefined.clone());
            }
        }

        let entity = self.doc.entity(name).cloned()?;

        // A standalone document must not depend on entities declared only
        // in the external subset.
        if self.doc.standalone == Some(true)
            && self.in_subset == SubsetState::Outside
            && self
                .doc
                .int_subset
                .as_ref()
                .map_or(true, |s| s.entity(name).is_none())
        {
            self.report(
                BuildDiagnostic::new(
                    DiagnosticKind::WellFormedness,
                    format!("Entity {name}: document marked standalone but requires external subset"),
                )
                .with_info(Some(name.to_string()), None),
            );
            return None;
        }

        // On-demand fetch of external parsed entity content.
        if entity.kind == EntityKind::ExternalParsed
            && entity.value.is_none()
            && (self.options.validate || self.options.replace_entities)
        {
            return self.load_external_entity(entity);
        }

        Some(entity)
    }

    fn is_standalone(&self) -> bool {
        self.doc.standalone == Some(true)
    }

    fn has_internal_subset(&self) -> bool {
        self.doc.int_subset.is_some()
    }

    fn has_external_subset(&self) -> bool {
        self.doc.ext_subset.is_some()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::input::{ExternalInput, InputSource};

    #[test]
    fn test_options_clone_with_callbacks() {
        let opts = BuildOptions::default()
            .entity_resolver(|_req| {
                Some(ExternalInput {
                    bytes: Vec::new(),
                    system_id: None,
                })
            })
            .subset_grammar(|_builder, _text| {});
        let cloned = opts.clone();
        assert!(cloned.entity_resolver.is_some());
        assert!(cloned.subset_grammar.is_some());
    }

    #[test]
    fn test_options_debug_with_resolver() {
        let opts = BuildOptions::default().entity_resolver(|_req| None);
        let debug = format!("{opts:?}");
        assert!(debug.contains("entity_resolver"));
    }

    #[test]
    fn test_basic_assembly() {
        let mut builder = TreeBuilder::new();
        builder.start_document();
        builder.start_element("doc", None, None, &[], 0, &[]);
        builder.characters("hi");
        builder.end_element("doc", None, None);
        builder.end_document();

        let doc = builder.finish();
        assert!(doc.well_formed);
        let root = doc.root_element().unwrap();
        assert_eq!(doc.node_name(root), Some("doc"));
        assert_eq!(doc.text_content(root), "hi");
    }

    #[test]
    fn test_version_defaults() {
        let mut builder = TreeBuilder::new();
        builder.start_document();
        assert_eq!(builder.document().version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_declaration_recorded() {
        let mut builder = TreeBuilder::new();
        builder.declaration(Some("1.1"), Some("ISO-8859-1"), Some(true));
        builder.start_document();
        let doc = builder.finish();
        assert_eq!(doc.version.as_deref(), Some("1.1"));
        assert_eq!(doc.encoding.as_deref(), Some("ISO-8859-1"));
        assert_eq!(doc.standalone, Some(true));
    }

    #[test]
    fn test_detected_encoding_adopted_at_end_document() {
        let mut builder = TreeBuilder::new();
        builder.inputs_mut().push(InputSource::with_system_id("doc.xml"));
        builder.start_document();
        // The tokenizer discovers the real encoding mid-stream.
        if let Some(input) = builder.inputs_mut().innermost_mut() {
            input.encoding = Some("ISO-8859-1".to_string());
        }
        builder.start_element("doc", None, None, &[], 0, &[]);
        builder.end_element("doc", None, None);
        builder.end_document();

        let doc = builder.finish();
        assert_eq!(doc.encoding.as_deref(), Some("ISO-8859-1"));
        assert!(doc.charset.is_none());
    }

    #[test]
    fn test_declared_encoding_wins_over_detected() {
        let mut builder = TreeBuilder::new();
        builder.inputs_mut().push(InputSource {
            encoding: Some("UTF-16LE".to_string()),
            ..InputSource::with_system_id("doc.xml")
        });
        builder.declaration(Some("1.0"), Some("UTF-16"), None);
        builder.start_document();
        builder.end_document();

        let doc = builder.finish();
        assert_eq!(doc.encoding.as_deref(), Some("UTF-16"));
    }

    #[test]
    fn test_charset_recorded_when_nothing_declared() {
        let mut builder = TreeBuilder::new();
        builder.start_document();
        builder.start_element("doc", None, None, &[], 0, &[]);
        builder.end_element("doc", None, None);
        builder.end_document();

        let doc = builder.finish();
        assert!(doc.encoding.is_none());
        assert_eq!(doc.charset.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn test_empty_text_run_slot_recycled() {
        let mut builder = TreeBuilder::new();
        builder.start_document();
        builder.start_element("doc", None, None, &[], 0, &[]);
        builder.characters("");
        let count = builder.document().node_count();
        // Flushing the empty run frees its slot; the comment reuses it.
        builder.comment("note");
        assert_eq!(builder.document().node_count(), count);
        builder.end_element("doc", None, None);
        builder.end_document();

        let doc = builder.finish();
        let root = doc.root_element().unwrap();
        let children: Vec<_> = doc.children(root).collect();
        assert_eq!(children.len(), 1);
        assert!(matches!(
            doc.node(children[0]).kind,
            NodeKind::Comment { .. }
        ));
    }

    #[test]
    fn test_depth_limit_latches() {
        let mut builder = TreeBuilder::with_options(BuildOptions::default().max_depth(2));
        builder.start_document();
        builder.start_element("a", None, None, &[], 0, &[]);
        builder.start_element("b", None, None, &[], 0, &[]);
        builder.start_element("c", None, None, &[], 0, &[]);
        assert!(builder.is_disabled());
        assert_eq!(
            builder.diagnostics()[0].kind,
            DiagnosticKind::Resource
        );
    }

    #[test]
    fn test_unbalanced_end_element() {
        let mut builder = TreeBuilder::new();
        builder.start_document();
        builder.end_element("ghost", None, None);
        let doc = builder.finish();
        assert!(!doc.well_formed);
        assert_eq!(doc.diagnostics[0].kind, DiagnosticKind::WellFormedness);
    }

    #[test]
    fn test_attr_value_pieces_with_entity() {
        let mut builder = TreeBuilder::new();
        builder.start_document();
        builder.start_element(
            "doc",
            None,
            None,
            &[],
            0,
            &[SaxAttribute::new("title", "a &amp; b")],
        );
        builder.end_element("doc", None, None);
        let doc = builder.finish();
        let root = doc.root_element().unwrap();
        let attr = &doc.attributes(root)[0];
        assert_eq!(attr.pieces.len(), 3);
        assert_eq!(attr.value(), "a & b");
    }

    #[test]
    fn test_attr_character_reference_decoded() {
        let mut builder = TreeBuilder::new();
        builder.start_document();
        builder.start_element(
            "doc",
            None,
            None,
            &[],
            0,
            &[SaxAttribute::new("a", "x&#65;y&#x42;z")],
        );
        let doc = builder.finish();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.attribute(root, "a"), Some("xAyBz".to_string()));
    }

    #[test]
    fn test_get_entity_predefined() {
        let mut builder = TreeBuilder::new();
        builder.start_document();
        let amp = builder.get_entity("amp").unwrap();
        assert_eq!(amp.value.as_deref(), Some("&"));
        assert!(builder.get_entity("nosuch").is_none());
    }

    #[test]
    fn test_standalone_external_entity_rejected() {
        let mut builder = TreeBuilder::new();
        builder.declaration(Some("1.0"), None, Some(true));
        builder.start_document();
        builder.internal_subset("doc", None, Some("doc.dtd"));
        // Simulate the external subset having declared the entity.
        builder.doc.ext_subset = Some(DtdSubset::new("doc", None, Some("doc.dtd")));
        if let Some(subset) = builder.doc.ext_subset.as_mut() {
            subset.add_entity(EntityDecl {
                name: "ext".to_string(),
                kind: EntityKind::InternalGeneral,
                public_id: None,
                system_id: None,
                notation: None,
                value: Some("x".to_string()),
                base_uri: None,
            });
        }
        builder.start_element("doc", None, None, &[], 0, &[]);
        assert!(builder.get_entity("ext").is_none());
        assert!(!builder.document().well_formed);
    }
}
