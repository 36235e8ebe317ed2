//! External resource fetch coordination.
//!
//! Fetching the external DTD subset (or an external parsed entity) means
//! parsing a second resource in the middle of the document parse. The
//! coordinator saves the pieces of session state the nested parse would
//! trample — the input stack and the subset mode — runs the nested parse,
//! and restores unconditionally, including when the fetch or the nested
//! parse fails. A depth counter bounds recursive fetches.

use std::mem;
use std::sync::Arc;

use crate::dtd::{DtdSubset, EntityDecl};
use crate::encoding::{decode_to_utf8, strip_text_decl};
use crate::error::{BuildDiagnostic, DiagnosticKind};
use crate::input::{resolve_uri, InputSource, ResolveRequest};
use crate::tree::NodeKind;

use super::{SubsetState, TreeBuilder};

/// Callback that tokenizes external subset text, firing declaration events
/// back into the builder it is handed.
pub type SubsetGrammar = Arc<dyn Fn(&mut TreeBuilder, &str) + Send + Sync>;

impl TreeBuilder {
    /// Fetches, decodes and parses the external DTD subset.
    ///
    /// Without both a resolver and a subset grammar this is a no-op: the
    /// builder never touches external resources on its own.
    pub(super) fn fetch_external_subset(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) {
        let Some(resolver) = self.options.entity_resolver.clone() else {
            return;
        };
        let Some(grammar) = self.options.subset_grammar.clone() else {
            return;
        };

        if self.fetch_depth >= self.options.max_fetch_depth {
            self.report(BuildDiagnostic::new(
                DiagnosticKind::Resource,
                "maximum external resource nesting depth exceeded",
            ));
            return;
        }

        let base = self.innermost_base();
        let resolved = system_id.map(|s| resolve_uri(base.as_deref(), s));
        let Some(fetched) = resolver(ResolveRequest {
            name,
            system_id: resolved.as_deref(),
            public_id,
        }) else {
            self.report(
                BuildDiagnostic::new(
                    DiagnosticKind::Warning,
                    format!(
                        "failed to load external subset {}",
                        resolved.as_deref().unwrap_or(name)
                    ),
                )
                .with_info(Some(name.to_string()), resolved.clone()),
            );
            return;
        };

        let decoded = match decode_to_utf8(&fetched.bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.report(BuildDiagnostic::new(
                    DiagnosticKind::WellFormedness,
                    format!(
                        "external subset {}: {err}",
                        resolved.as_deref().unwrap_or(name)
                    ),
                ));
                return;
            }
        };

        self.doc.ext_subset = Some(DtdSubset::new(name, public_id, resolved.as_deref()));
        // Unlinked anchor node so comments and PIs seen inside the subset
        // have somewhere to go without entering the document tree.
        if self.ext_doctype.is_none() {
            self.ext_doctype = Some(self.doc.create_node(NodeKind::DocumentType {
                name: name.to_string(),
                public_id: public_id.map(str::to_string),
                system_id: resolved.clone(),
            }));
        }

        // Save, parse, restore. The restore happens on every path out of
        // the grammar callback, failed nested parses included.
        let saved_inputs = mem::take(&mut self.inputs);
        let saved_state = self.in_subset;
        self.fetch_depth += 1;

        self.inputs.push(InputSource {
            system_id: fetched.system_id.clone().or_else(|| resolved.clone()),
            public_id: public_id.map(str::to_string),
            encoding: Some(decoded.encoding.clone()),
            line: 1,
        });
        self.in_subset = SubsetState::External;

        grammar(self, &decoded.text);

        self.fetch_depth -= 1;
        self.in_subset = saved_state;
        self.inputs = saved_inputs;
    }

    /// Fetches the content of an external parsed entity on demand and
    /// stores it back into the declaring subset, so later lookups find the
    /// content without refetching.
    pub(super) fn load_external_entity(&mut self, mut entity: EntityDecl) -> Option<EntityDecl> {
        let Some(resolver) = self.options.entity_resolver.clone() else {
            return Some(entity);
        };
        if self.fetch_depth >= self.options.max_fetch_depth {
            self.report(BuildDiagnostic::new(
                DiagnosticKind::Resource,
                "maximum external resource nesting depth exceeded",
            ));
            return None;
        }

        let uri = entity
            .base_uri
            .clone()
            .or_else(|| entity.system_id.clone());
        let fetched = resolver(ResolveRequest {
            name: &entity.name,
            system_id: uri.as_deref(),
            public_id: entity.public_id.as_deref(),
        });
        let text = fetched.and_then(|f| decode_to_utf8(&f.bytes).ok().map(|d| d.text));
        let Some(text) = text else {
            self.report(
                BuildDiagnostic::new(
                    DiagnosticKind::WellFormedness,
                    format!("Failure to process entity {}", entity.name),
                )
                .with_info(Some(entity.name.clone()), None),
            );
            self.options.validate = false;
            return None;
        };

        // The text declaration describes the fetched bytes, not the
        // entity's replacement text.
        entity.value = Some(strip_text_decl(&text).to_string());
        let name = entity.name.clone();
        let value = entity.value.clone();
        for subset in [self.doc.int_subset.as_mut(), self.doc.ext_subset.as_mut()]
            .into_iter()
            .flatten()
        {
            if let Some(slot) = subset.entity_mut(&name) {
                slot.value.clone_from(&value);
            }
        }
        Some(entity)
    }
}
