use rdf_flow::dedup::{wrap_as_filter, DedupStrategy};
use rdf_flow::handlers::{
    decouple, dispatch_all, ignore_start_end, rewrite_blank_nodes, Collector, Handler, HandlerRef,
};
use rdf_flow::model::{fingerprint_quad, BlankNode, GraphName, Literal, NamedNode, Quad};
use std::sync::Arc;
use std::thread;

fn example_quad(i: usize) -> Quad {
    Quad::new(
        BlankNode::new_unchecked(format!("b{}", i % 10)),
        NamedNode::new_unchecked("http://example.com/p"),
        Literal::new_simple_literal((i % 1000).to_string()),
        GraphName::DefaultGraph,
    )
}

#[test]
fn test_decoupled_deduplicated_broadcast() {
    let left = Arc::new(Collector::new());
    let right = Arc::new(Collector::new());
    let dedup = "total:hash".parse::<DedupStrategy>().unwrap().build();
    let pipeline = decouple(wrap_as_filter(
        dedup,
        dispatch_all([
            Arc::clone(&left) as HandlerRef,
            Arc::clone(&right) as HandlerRef,
        ]),
        true,
    ));

    pipeline.start().unwrap();
    thread::scope(|scope| {
        for producer in 0..4 {
            let pipeline = Arc::clone(&pipeline);
            scope.spawn(move || {
                for i in 0..10_000 {
                    pipeline
                        .statement(example_quad(producer * 10_000 + i).as_ref())
                        .unwrap();
                }
            });
        }
    });
    pipeline.end().unwrap();
    pipeline.close();

    assert_eq!(left.len(), 1000);
    assert_eq!(right.len(), 1000);
}

#[test]
fn test_merging_sources_keeps_blank_nodes_apart() {
    let collector = Arc::new(Collector::new());
    let shared = ignore_start_end(Arc::clone(&collector) as HandlerRef);
    let first = rewrite_blank_nodes(Arc::clone(&shared), "_1").unwrap();
    let second = rewrite_blank_nodes(shared, "_2").unwrap();

    collector.start().unwrap();
    for source in [&first, &second] {
        source.start().unwrap();
        source.statement(example_quad(0).as_ref()).unwrap();
        source.end().unwrap();
    }
    collector.end().unwrap();

    let quads = collector.quads();
    assert_eq!(quads.len(), 2);
    assert_ne!(
        fingerprint_quad(quads[0].as_ref()),
        fingerprint_quad(quads[1].as_ref())
    );
    insta::assert_snapshot!(
        quads.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"),
        @r#"
    _:b0_1 <http://example.com/p> "0"
    _:b0_2 <http://example.com/p> "0"
    "#
    );
}
