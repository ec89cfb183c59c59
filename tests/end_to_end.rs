//! Synthetic-AST scenarios driven end to end through
//! `visit_translation_unit` → `merge_graphs` → `reindex` → `filter_graph`,
//! exercising the literal call shapes that motivate each filter stage.

use lxgraph::filter::{self, FilterConfig, LevelOfDetail};
use lxgraph::frontend::mock::MockCursor;
use lxgraph::frontend::CursorKind;
use lxgraph::graph::PartialGraph;
use lxgraph::index;
use lxgraph::literal::Flags;
use lxgraph::merge;
use lxgraph::visitor;

fn function(name: &str, file: &str, line: u32, col: u32, children: Vec<MockCursor>) -> MockCursor {
    MockCursor::new(CursorKind::FunctionDecl)
        .named(name)
        .at(file, line, col)
        .with_children(vec![MockCursor::new(CursorKind::CompoundStmt).with_children(children)])
}

fn inline_function(name: &str, file: &str, line: u32, col: u32, children: Vec<MockCursor>) -> MockCursor {
    function(name, file, line, col, children).inline(true)
}

fn call(callee_name: &str, file: &str, line: u32, col: u32) -> MockCursor {
    MockCursor::new(CursorKind::DeclRefExpr)
        .at(file, line, col)
        .referencing(MockCursor::new(CursorKind::FunctionDecl).named(callee_name))
}

fn parse_tu(root: &MockCursor, tu_file: &str) -> PartialGraph {
    let mut graph = PartialGraph::new();
    visitor::visit_translation_unit(root, tu_file, &mut graph);
    graph
}

#[test]
fn a_chain_of_two_inline_helpers_splices_through_to_the_real_callee() {
    // f.h: static inline int h() { return g(); } -- a.c and b.c both call h.
    let h = inline_function("h", "f.h", 1, 1, vec![call("g", "f.h", 1, 20)]).global(true);
    let g = function("g", "f.h", 2, 1, vec![]);

    let a_tu = parse_tu(
        &MockCursor::new(CursorKind::Other).with_children(vec![
            h.clone(),
            g.clone(),
            function("a", "a.c", 1, 1, vec![call("h", "a.c", 1, 10)]),
        ]),
        "a.c",
    );
    let b_tu = parse_tu(
        &MockCursor::new(CursorKind::Other).with_children(vec![
            h,
            g,
            function("b", "b.c", 1, 1, vec![call("h", "b.c", 1, 10)]),
        ]),
        "b.c",
    );

    let mut dst = a_tu;
    let mut src = b_tu;
    merge::merge_graphs(&mut dst, &mut src);
    index::reindex(&mut dst);

    let mut cfg = FilterConfig::default();
    cfg.keep_inline = false;
    filter::filter_graph(&mut dst, &cfg);

    let names: Vec<&str> = dst.defs.iter().map(|d| d.name()).collect();
    assert!(!names.contains(&"h"), "inline function should be contracted away: {names:?}");
    assert!(names.contains(&"a") && names.contains(&"b") && names.contains(&"g"));

    for edge in &dst.edges {
        assert_ne!(edge.callee.name(), "h");
    }
    let a_to_g = dst.edges.iter().find(|e| e.caller.name() == "a").unwrap();
    assert_eq!(a_to_g.callee.name(), "g");
    assert_eq!(a_to_g.weight, 1.0);
}

#[test]
fn reachability_prune_from_a_root_function_drops_unrelated_call_chains() {
    let root = MockCursor::new(CursorKind::Other).with_children(vec![
        function("main", "f.c", 1, 1, vec![call("x", "f.c", 1, 10)]),
        function("x", "f.c", 2, 1, vec![call("y", "f.c", 2, 10)]),
        function("y", "f.c", 3, 1, vec![]),
        function("dead", "f.c", 4, 1, vec![call("z", "f.c", 4, 10)]),
        function("z", "f.c", 5, 1, vec![]),
    ]);
    let mut graph = parse_tu(&root, "f.c");
    index::reindex(&mut graph);

    let mut cfg = FilterConfig::default();
    cfg.root_functions = vec!["main".to_string()];
    filter::filter_graph(&mut graph, &cfg);

    let names: Vec<&str> = graph.defs.iter().map(|d| d.name()).collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"main") && names.contains(&"x") && names.contains(&"y"));
    assert!(!names.contains(&"dead") && !names.contains(&"z"));
}

#[test]
fn excluding_a_file_drops_its_function_and_incident_edges() {
    let root = MockCursor::new(CursorKind::Other).with_children(vec![
        function("sys", "std.h", 1, 1, vec![]),
        function("user", "app.c", 1, 1, vec![call("sys", "app.c", 1, 10)]),
    ]);
    let mut graph = parse_tu(&root, "app.c");
    index::reindex(&mut graph);

    let mut cfg = FilterConfig::default();
    cfg.exclude_files = vec!["std.h".to_string()];
    filter::filter_graph(&mut graph, &cfg);

    let names: Vec<&str> = graph.defs.iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["user"]);
    assert!(graph.edges.is_empty());
}

#[test]
fn a_call_site_repeated_at_the_same_location_does_not_bump_weight() {
    let root = MockCursor::new(CursorKind::Other).with_children(vec![
        function(
            "a",
            "f.c",
            1,
            1,
            vec![
                call("b", "f.c", 10, 4),
                call("b", "f.c", 10, 4),
                call("b", "f.c", 10, 4),
                call("b", "f.c", 20, 4),
            ],
        ),
        function("b", "f.c", 2, 1, vec![]),
    ]);
    let mut graph = parse_tu(&root, "f.c");
    index::reindex(&mut graph);

    let cfg = FilterConfig::default();
    filter::filter_graph(&mut graph, &cfg);

    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].weight, 2.0);
}

#[test]
fn file_level_of_detail_collapses_to_one_inter_file_edge_and_drops_intra_file_edges() {
    let root = MockCursor::new(CursorKind::Other).with_children(vec![
        function("a", "fileA.c", 1, 1, vec![call("b", "fileA.c", 1, 10)]),
        function("b", "fileB.c", 1, 1, vec![call("c", "fileB.c", 1, 10)]),
        function("c", "fileB.c", 2, 1, vec![]),
    ]);
    let mut graph = parse_tu(&root, "fileA.c");
    index::reindex(&mut graph);

    let mut cfg = FilterConfig::default();
    cfg.level_of_detail = LevelOfDetail::File;
    filter::filter_graph(&mut graph, &cfg);

    assert_eq!(graph.edges.len(), 1);
    let edge = graph.edges[0];
    assert_eq!(edge.caller.name(), "fileA.c");
    assert_eq!(edge.callee.name(), "fileB.c");
    assert!(edge.caller.flags().contains(Flags::FILE));
}

#[test]
fn an_empty_translation_unit_contributes_no_defs_or_edges() {
    let root = MockCursor::new(CursorKind::Other);
    let graph = parse_tu(&root, "empty.c");
    assert!(graph.defs.is_empty());
    assert!(graph.edges.is_empty());
}
