//! Namespace scope resolution.
//!
//! Namespace declarations live on the element that introduced them
//! (`ns_decls`), so resolving a prefix is a walk up the ancestor-or-self
//! chain: the nearest declaration wins, and within one element a later
//! declaration shadows an earlier one. The result is an [`NsRef`] — the
//! declaring element plus the index of the declaration — never a copy of
//! the URI.

use crate::tree::{Document, NodeId, NodeKind, NsDecl, NsRef};

/// The namespace bound to the reserved `xml` prefix, implicitly declared
/// in every document.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Finds the nearest in-scope declaration of `prefix`, starting at `start`
/// and walking up the ancestor chain. `None` matches the default
/// namespace declaration.
#[must_use]
pub fn find_binding(doc: &Document, start: NodeId, prefix: Option<&str>) -> Option<NsRef> {
    for node in doc.ancestors(start) {
        if let NodeKind::Element { ns_decls, .. } = &doc.node(node).kind {
            // Reverse scan: within one element a later declaration shadows
            // an earlier one.
            for (index, decl) in ns_decls.iter().enumerate().rev() {
                if decl.prefix.as_deref() == prefix {
                    return Some(NsRef {
                        element: node,
                        index,
                    });
                }
            }
        }
    }
    None
}

/// Pushes a declaration onto an element's `ns_decls` and returns a
/// reference to it. Returns `None` if `element` is not an element node.
pub(crate) fn declare(doc: &mut Document, element: NodeId, decl: NsDecl) -> Option<NsRef> {
    match &mut doc.node_mut(element).kind {
        NodeKind::Element { ns_decls, .. } => {
            ns_decls.push(decl);
            Some(NsRef {
                element,
                index: ns_decls.len() - 1,
            })
        }
        _ => None,
    }
}
