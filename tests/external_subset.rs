//! Integration tests for external subset fetching and on-demand entity
//! loading through the resolver callback.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use treeoxide::dtd::EntityKind;
use treeoxide::input::{ExternalInput, InputSource};
use treeoxide::sax::SaxHandler;
use treeoxide::{BuildOptions, DiagnosticKind, TreeBuilder};

fn input(bytes: &[u8]) -> ExternalInput {
    ExternalInput {
        bytes: bytes.to_vec(),
        system_id: None,
    }
}

/// A resolver serving one DTD, plus a grammar that feeds its declarations
/// back as events the way a DTD tokenizer would.
fn subset_options() -> BuildOptions {
    BuildOptions::default()
        .entity_resolver(|req| match req.system_id {
            Some("doc.dtd") => Some(input(b"<!ENTITY who 'World'>")),
            _ => None,
        })
        .subset_grammar(|builder, text| {
            assert!(text.contains("ENTITY"));
            builder.entity_decl("who", EntityKind::InternalGeneral, None, None, Some("World"));
            builder.element_decl(treeoxide::dtd::ElementDecl {
                name: "doc".to_string(),
                content_model: treeoxide::dtd::ContentModel::Any,
            });
        })
}

#[test]
fn test_external_subset_declarations_registered() {
    let mut builder = TreeBuilder::with_options(subset_options());
    builder.start_document();
    builder.internal_subset("doc", None, Some("doc.dtd"));
    builder.external_subset("doc", None, Some("doc.dtd"));
    builder.start_element("doc", None, None, &[], 0, &[]);
    builder.end_element("doc", None, None);
    builder.end_document();

    let doc = builder.finish();
    assert!(doc.well_formed);
    let ext = doc.ext_subset.as_ref().unwrap();
    assert_eq!(
        ext.entity("who").unwrap().value.as_deref(),
        Some("World")
    );
    assert!(ext.element("doc").is_some());
    // Internal subset declarations were not contaminated.
    assert!(doc.int_subset.as_ref().unwrap().entity("who").is_none());
}

#[test]
fn test_subset_mode_restored_after_fetch() {
    let mut builder = TreeBuilder::with_options(subset_options());
    builder.start_document();
    builder.internal_subset("doc", None, Some("doc.dtd"));
    builder.external_subset("doc", None, Some("doc.dtd"));
    // Still inside the DOCTYPE: this declaration must land in the
    // internal subset, not the external one.
    builder.entity_decl("local", EntityKind::InternalGeneral, None, None, Some("x"));

    let doc = builder.finish();
    assert!(doc.int_subset.as_ref().unwrap().entity("local").is_some());
    assert!(doc.ext_subset.as_ref().unwrap().entity("local").is_none());
}

#[test]
fn test_input_stack_saved_and_restored() {
    let opts = BuildOptions::default()
        .entity_resolver(|_req| Some(input(b"<!-- dtd -->")))
        .subset_grammar(|builder, _text| {
            // Inside the nested parse only the subset input is visible.
            assert_eq!(builder.inputs_mut().depth(), 1);
            assert_eq!(
                builder
                    .inputs_mut()
                    .innermost()
                    .and_then(|i| i.system_id.as_deref()),
                Some("doc.dtd")
            );
        });

    let mut builder = TreeBuilder::with_options(opts);
    builder.inputs_mut().push(InputSource::with_system_id("doc.xml"));
    builder.start_document();
    builder.internal_subset("doc", None, Some("doc.dtd"));
    builder.external_subset("doc", None, Some("doc.dtd"));

    // The document input is back after the fetch.
    assert_eq!(builder.inputs_mut().depth(), 1);
    assert_eq!(
        builder
            .inputs_mut()
            .innermost()
            .and_then(|i| i.system_id.as_deref()),
        Some("doc.xml")
    );
}

#[test]
fn test_system_id_resolved_against_document_base() {
    let seen = Arc::new(std::sync::Mutex::new(None));
    let seen_clone = Arc::clone(&seen);
    let opts = BuildOptions::default()
        .entity_resolver(move |req| {
            *seen_clone.lock().unwrap() = req.system_id.map(str::to_string);
            Some(input(b""))
        })
        .subset_grammar(|_builder, _text| {});

    let mut builder = TreeBuilder::with_options(opts);
    builder
        .inputs_mut()
        .push(InputSource::with_system_id("http://example.com/a/doc.xml"));
    builder.start_document();
    builder.internal_subset("doc", None, Some("dtd/doc.dtd"));
    builder.external_subset("doc", None, Some("dtd/doc.dtd"));

    assert_eq!(
        seen.lock().unwrap().as_deref(),
        Some("http://example.com/a/dtd/doc.dtd")
    );
}

#[test]
fn test_resolver_rejection_is_a_warning() {
    let opts = BuildOptions::default()
        .entity_resolver(|_req| None)
        .subset_grammar(|_builder, _text| panic!("grammar must not run"));

    let mut builder = TreeBuilder::with_options(opts);
    builder.start_document();
    builder.internal_subset("doc", None, Some("missing.dtd"));
    builder.external_subset("doc", None, Some("missing.dtd"));
    builder.start_element("doc", None, None, &[], 0, &[]);
    builder.end_element("doc", None, None);
    builder.end_document();

    let doc = builder.finish();
    // The tree is intact; the rejection is advisory.
    assert!(doc.well_formed);
    assert!(doc.ext_subset.is_none());
    assert_eq!(doc.diagnostics.len(), 1);
    assert_eq!(doc.diagnostics[0].kind, DiagnosticKind::Warning);
}

#[test]
fn test_no_resolver_means_no_fetch() {
    let mut builder = TreeBuilder::new();
    builder.start_document();
    builder.internal_subset("doc", None, Some("doc.dtd"));
    builder.external_subset("doc", None, Some("doc.dtd"));

    let doc = builder.finish();
    assert!(doc.ext_subset.is_none());
    assert!(doc.diagnostics.is_empty());
}

#[test]
fn test_fetch_depth_limit() {
    let opts = subset_options().max_fetch_depth(0);
    let mut builder = TreeBuilder::with_options(opts);
    builder.start_document();
    builder.internal_subset("doc", None, Some("doc.dtd"));
    builder.external_subset("doc", None, Some("doc.dtd"));

    assert!(builder.is_disabled());
    let doc = builder.finish();
    assert_eq!(doc.diagnostics[0].kind, DiagnosticKind::Resource);
    assert!(doc.ext_subset.is_none());
}

#[test]
fn test_state_restored_when_nested_parse_fails() {
    let opts = BuildOptions::default()
        .entity_resolver(|_req| Some(input(b"<!NOTATION broken>")))
        .subset_grammar(|builder, _text| {
            // A declaration with neither identifier is fatal.
            builder.notation_decl("broken", None, None);
        });

    let mut builder = TreeBuilder::with_options(opts);
    builder.inputs_mut().push(InputSource::with_system_id("doc.xml"));
    builder.start_document();
    builder.internal_subset("doc", None, Some("doc.dtd"));
    builder.external_subset("doc", None, Some("doc.dtd"));

    // The latch survives, but the input state was restored anyway.
    assert!(builder.is_disabled());
    assert_eq!(builder.inputs_mut().depth(), 1);
    assert_eq!(
        builder
            .inputs_mut()
            .innermost()
            .and_then(|i| i.system_id.as_deref()),
        Some("doc.xml")
    );
    let doc = builder.finish();
    assert!(!doc.well_formed);
}

#[test]
fn test_utf16_subset_is_decoded() {
    let mut bytes = vec![0xFF, 0xFE]; // UTF-16LE BOM
    for unit in "<!ENTITY who 'World'>".encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }

    let received = Arc::new(std::sync::Mutex::new(String::new()));
    let received_clone = Arc::clone(&received);
    let opts = BuildOptions::default()
        .entity_resolver(move |_req| Some(input(&bytes)))
        .subset_grammar(move |_builder, text| {
            *received_clone.lock().unwrap() = text.to_string();
        });

    let mut builder = TreeBuilder::with_options(opts);
    builder.start_document();
    builder.internal_subset("doc", None, Some("doc.dtd"));
    builder.external_subset("doc", None, Some("doc.dtd"));

    assert_eq!(&*received.lock().unwrap(), "<!ENTITY who 'World'>");
}

#[test]
fn test_external_entity_loaded_on_demand() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let fetches_clone = Arc::clone(&fetches);
    let opts = BuildOptions::default().validate(true).entity_resolver(move |req| {
        fetches_clone.fetch_add(1, Ordering::SeqCst);
        match req.system_id {
            Some("chapter.ent") => Some(input(b"chapter text")),
            _ => None,
        }
    });

    let mut builder = TreeBuilder::with_options(opts);
    builder.start_document();
    builder.internal_subset("doc", None, None);
    builder.entity_decl(
        "chap",
        EntityKind::ExternalParsed,
        None,
        Some("chapter.ent"),
        None,
    );
    builder.start_element("doc", None, None, &[], 0, &[]);

    let entity = builder.get_entity("chap").unwrap();
    assert_eq!(entity.value.as_deref(), Some("chapter text"));
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    // The content was stored back: no second fetch.
    let again = builder.get_entity("chap").unwrap();
    assert_eq!(again.value.as_deref(), Some("chapter text"));
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[test]
fn test_entity_text_declaration_not_part_of_content() {
    let opts = BuildOptions::default().validate(true).entity_resolver(|req| {
        match req.system_id {
            Some("chapter.ent") => Some(input(
                b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>chapter text",
            )),
            _ => None,
        }
    });

    let mut builder = TreeBuilder::with_options(opts);
    builder.start_document();
    builder.internal_subset("doc", None, None);
    builder.entity_decl(
        "chap",
        EntityKind::ExternalParsed,
        None,
        Some("chapter.ent"),
        None,
    );
    builder.start_element("doc", None, None, &[], 0, &[]);

    // The text declaration describes the resource, not its replacement.
    let entity = builder.get_entity("chap").unwrap();
    assert_eq!(entity.value.as_deref(), Some("chapter text"));
}

#[test]
fn test_external_entity_fetch_failure_is_fatal() {
    let opts = BuildOptions::default()
        .validate(true)
        .entity_resolver(|_req| None);

    let mut builder = TreeBuilder::with_options(opts);
    builder.start_document();
    builder.internal_subset("doc", None, None);
    builder.entity_decl(
        "chap",
        EntityKind::ExternalParsed,
        None,
        Some("chapter.ent"),
        None,
    );
    builder.start_element("doc", None, None, &[], 0, &[]);

    assert!(builder.get_entity("chap").is_none());
    assert!(!builder.document().well_formed);
    assert!(builder.diagnostics()[0]
        .message
        .contains("Failure to process entity"));
}

#[test]
fn test_entity_without_validation_left_unfetched() {
    let opts = BuildOptions::default().entity_resolver(|_req| panic!("must not fetch"));

    let mut builder = TreeBuilder::with_options(opts);
    builder.start_document();
    builder.internal_subset("doc", None, None);
    builder.entity_decl(
        "chap",
        EntityKind::ExternalParsed,
        None,
        Some("chapter.ent"),
        None,
    );
    builder.start_element("doc", None, None, &[], 0, &[]);

    // Neither validation nor substitution requested: the declaration comes
    // back without content and nothing is fetched.
    let entity = builder.get_entity("chap").unwrap();
    assert!(entity.value.is_none());
}
