#![allow(clippy::panic)]

use codspeed_criterion_compat::{criterion_group, criterion_main, Criterion};
use rdf_flow_handlers::{decouple, nop, Collector, Handler, HandlerRef};
use rdf_flow_model::{GraphNameRef, Literal, NamedNodeRef, Quad, QuadRef};
use std::hint::black_box;
use std::sync::Arc;

fn quads(count: usize) -> Vec<Quad> {
    (0..count)
        .map(|i| {
            QuadRef::new(
                NamedNodeRef::new_unchecked("http://example.com/s"),
                NamedNodeRef::new_unchecked("http://example.com/p"),
                &Literal::new_simple_literal(i.to_string()),
                GraphNameRef::DefaultGraph,
            )
            .into_owned()
        })
        .collect()
}

fn run(handler: &HandlerRef, quads: &[Quad]) {
    handler.start().unwrap();
    for quad in quads {
        handler.statement(quad.as_ref()).unwrap();
    }
    handler.end().unwrap();
}

/// These benchmarks measure forwarding 16K statements from a single producer.
fn single_producer(c: &mut Criterion) {
    let quads = quads(16 * 1024);

    c.bench_function("Collector - Direct", |b| {
        b.iter(|| {
            let handler: HandlerRef = Arc::new(Collector::new());
            run(&handler, black_box(&quads));
        });
    });

    c.bench_function("Decoupler - Collector", |b| {
        b.iter(|| {
            let handler = decouple(Arc::new(Collector::new()));
            run(&handler, black_box(&quads));
        });
    });

    c.bench_function("Decoupler - Nop", |b| {
        let handler = decouple(nop());
        b.iter(|| run(&handler, black_box(&quads)));
    });
}

criterion_group!(decoupler, single_producer);
criterion_main!(decoupler);
