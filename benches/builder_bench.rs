#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use treeoxide::sax::{NsBinding, SaxAttribute, SaxHandler};
use treeoxide::{BuildOptions, TreeBuilder};

// ---------------------------------------------------------------------------
// Event-stream generators
// ---------------------------------------------------------------------------

/// One pre-built structural event, so the generators allocate once and the
/// benchmarks measure assembly, not event construction.
enum Event {
    Start {
        name: String,
        prefix: Option<String>,
        namespaces: Vec<NsBinding>,
        attributes: Vec<SaxAttribute>,
    },
    End {
        name: String,
        prefix: Option<String>,
    },
    Text(String),
}

fn start(name: &str, attributes: Vec<SaxAttribute>) -> Event {
    Event::Start {
        name: name.to_string(),
        prefix: None,
        namespaces: Vec::new(),
        attributes,
    }
}

fn end(name: &str) -> Event {
    Event::End {
        name: name.to_string(),
        prefix: None,
    }
}

fn replay(events: &[Event], options: &BuildOptions) -> treeoxide::Document {
    let mut builder = TreeBuilder::with_options(options.clone());
    builder.start_document();
    for event in events {
        match event {
            Event::Start {
                name,
                prefix,
                namespaces,
                attributes,
            } => builder.start_element(
                name,
                prefix.as_deref(),
                None,
                namespaces,
                0,
                attributes,
            ),
            Event::End { name, prefix } => builder.end_element(name, prefix.as_deref(), None),
            Event::Text(content) => builder.characters(content),
        }
    }
    builder.end_document();
    builder.finish()
}

/// A flat catalog: many sibling elements, each with one attribute and one
/// text child.
fn make_flat_events(records: usize) -> Vec<Event> {
    let mut events = vec![start("catalog", vec![])];
    for i in 0..records {
        events.push(start(
            "record",
            vec![SaxAttribute::new("id", &i.to_string())],
        ));
        events.push(Event::Text(format!("Record {i}")));
        events.push(end("record"));
    }
    events.push(end("catalog"));
    events
}

/// A deeply nested chain of single-child elements.
fn make_nested_events(depth: usize) -> Vec<Event> {
    let mut events = Vec::with_capacity(depth * 2 + 1);
    for i in 0..depth {
        events.push(start(&format!("level{i}"), vec![]));
    }
    events.push(Event::Text("leaf".to_string()));
    for i in (0..depth).rev() {
        events.push(end(&format!("level{i}")));
    }
    events
}

/// Text arriving in many small chunks, the worst case for coalescing.
fn make_chunked_text_events(chunks: usize) -> Vec<Event> {
    let mut events = vec![start("doc", vec![])];
    for i in 0..chunks {
        events.push(Event::Text(format!("chunk {i} ")));
    }
    events.push(end("doc"));
    events
}

/// Elements carrying prefixed names that resolve against an ancestor
/// declaration several levels up.
fn make_namespace_events(items: usize) -> Vec<Event> {
    let mut events = vec![Event::Start {
        name: "root".to_string(),
        prefix: None,
        namespaces: (0..10)
            .map(|i| NsBinding {
                prefix: Some(format!("ns{i}")),
                uri: format!("http://example.com/ns{i}"),
            })
            .collect(),
        attributes: Vec::new(),
    }];
    for i in 0..items {
        let ns = i % 10;
        events.push(Event::Start {
            name: "item".to_string(),
            prefix: Some(format!("ns{ns}")),
            namespaces: Vec::new(),
            attributes: vec![SaxAttribute::new("id", &i.to_string())],
        });
        events.push(Event::Text(format!("Content {i}")));
        events.push(Event::End {
            name: "item".to_string(),
            prefix: Some(format!("ns{ns}")),
        });
    }
    events.push(end("root"));
    events
}

/// Formatting whitespace between elements, the case the interning pool
/// exists for.
fn make_whitespace_events(records: usize) -> Vec<Event> {
    let mut events = vec![start("catalog", vec![])];
    for i in 0..records {
        events.push(Event::Text("\n  ".to_string()));
        events.push(start("item", vec![SaxAttribute::new("id", &i.to_string())]));
        events.push(end("item"));
    }
    events.push(Event::Text("\n".to_string()));
    events.push(end("catalog"));
    events
}

// ---------------------------------------------------------------------------
// Assembly benchmarks
// ---------------------------------------------------------------------------

fn bench_build_flat(c: &mut Criterion) {
    let events = make_flat_events(1000);
    let options = BuildOptions::default();
    c.bench_function("build_flat_1000", |b| {
        b.iter(|| replay(black_box(&events), &options));
    });
}

fn bench_build_nested(c: &mut Criterion) {
    let events = make_nested_events(200);
    let options = BuildOptions::default().max_depth(512);
    c.bench_function("build_nested_200", |b| {
        b.iter(|| replay(black_box(&events), &options));
    });
}

fn bench_build_chunked_text(c: &mut Criterion) {
    let events = make_chunked_text_events(2000);
    let options = BuildOptions::default();
    c.bench_function("build_chunked_text_2000", |b| {
        b.iter(|| replay(black_box(&events), &options));
    });
}

fn bench_build_namespace_heavy(c: &mut Criterion) {
    let events = make_namespace_events(500);
    let options = BuildOptions::default();
    c.bench_function("build_namespace_heavy_500", |b| {
        b.iter(|| replay(black_box(&events), &options));
    });
}

fn bench_build_whitespace_interned(c: &mut Criterion) {
    let events = make_whitespace_events(1000);
    let options = BuildOptions::default();
    c.bench_function("build_whitespace_interned", |b| {
        b.iter(|| replay(black_box(&events), &options));
    });
}

fn bench_build_whitespace_owned(c: &mut Criterion) {
    let events = make_whitespace_events(1000);
    let options = BuildOptions::default().intern_text(false);
    c.bench_function("build_whitespace_owned", |b| {
        b.iter(|| replay(black_box(&events), &options));
    });
}

criterion_group!(
    assembly,
    bench_build_flat,
    bench_build_nested,
    bench_build_chunked_text,
    bench_build_namespace_heavy,
    bench_build_whitespace_interned,
    bench_build_whitespace_owned,
);

criterion_main!(assembly);
