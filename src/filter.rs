//! The post-merge filter pipeline (spec §4.7): exclude, collapse
//! duplicates, contract inline functions, prune to what's reachable from
//! configured roots, and optionally condense to file granularity.
//!
//! Grounded on `original_source/filter.c`'s `filter_graph` and its five
//! stage functions, with one deliberate departure: its `reverse_dfs` is
//! byte-identical to `dfs` (walks the same caller→callee direction) --
//! almost certainly a copy-paste slip in the original, since "reverse
//! root" would otherwise mean nothing. This module's reverse DFS actually
//! walks the reverse relation (callee→caller), matching the distilled
//! invariant that a reverse root keeps everything that can *reach* it.

use crate::graph::GlobalGraph;
use crate::index;
use crate::literal::{Flags, Handle};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelOfDetail {
    Function,
    File,
}

/// Parameters for one `filter_graph` run. Built by `config` from CLI
/// flags / config-file arrays; kept as a plain struct here so this module
/// has no dependency on the config layer.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    pub exclude_files: Vec<String>,
    pub exclude_functions: Vec<String>,
    pub keep_inline: bool,
    pub keep_static: bool,
    pub root_files: Vec<String>,
    pub root_functions: Vec<String>,
    pub reverse_root_files: Vec<String>,
    pub reverse_root_functions: Vec<String>,
    pub level_of_detail: LevelOfDetail,
}

impl Default for FilterConfig {
    fn default() -> Self {
        // `--inline`/`--static` both default to true ("keep") per spec §6.
        FilterConfig {
            exclude_files: Vec::new(),
            exclude_functions: Vec::new(),
            keep_inline: true,
            keep_static: true,
            root_files: Vec::new(),
            root_functions: Vec::new(),
            reverse_root_files: Vec::new(),
            reverse_root_functions: Vec::new(),
            level_of_detail: LevelOfDetail::default(),
        }
    }
}

impl Default for LevelOfDetail {
    fn default() -> Self {
        LevelOfDetail::Function
    }
}

/// Runs every stage in spec order. Idempotent: a second call with the
/// same config on an already-filtered graph changes nothing, since each
/// stage's own postcondition is also its precondition (spec: "Running
/// filter_graph twice is a no-op beyond the first invocation").
pub fn filter_graph(graph: &mut GlobalGraph, cfg: &FilterConfig) {
    exclude(graph, &cfg.exclude_files, &cfg.exclude_functions);
    collapse_duplicates(graph);

    if !cfg.keep_static {
        exclude_static(graph);
    }

    if !cfg.keep_inline {
        collapse_inline(graph);
    }

    reachability_prune(graph, cfg);

    if cfg.level_of_detail == LevelOfDetail::File {
        file_condensation(graph);
    }
}

/// `--static=false` drops every def with GLOBAL set (storage class was
/// not `extern`) along with its incident edges. `original_source/filter.c`
/// has `config.keep_static` declared and parsed but never consulted here
/// (`// TODO static`, sitting right before the inline-collapse call); this
/// implements what that TODO names, in the position it marks.
fn exclude_static(graph: &mut GlobalGraph) {
    let dropped: Vec<Handle> = graph
        .defs
        .iter()
        .copied()
        .filter(|h| h.flags().contains(Flags::GLOBAL))
        .collect();
    if dropped.is_empty() {
        return;
    }
    graph.defs.retain(|d| !dropped.contains(d));
    graph.edges.retain(|e| !dropped.contains(&e.caller) && !dropped.contains(&e.callee));
}

/// Stage 1: drop every def (and its incident edges) whose file, or whose
/// own name, names a configured exclusion.
fn exclude(graph: &mut GlobalGraph, exclude_files: &[String], exclude_functions: &[String]) {
    let mut dropped: Vec<Handle> = Vec::new();

    for name in exclude_files {
        if let Some(file) = graph.table.lookup(name) {
            dropped.extend(graph.defs.iter().copied().filter(|d| d.file() == Some(file)));
        }
    }
    for name in exclude_functions {
        if let Some(func) = graph.table.lookup(name) {
            dropped.push(func);
        }
    }

    if dropped.is_empty() {
        return;
    }

    graph.defs.retain(|d| !dropped.contains(d));
    graph.edges.retain(|e| !dropped.contains(&e.caller) && !dropped.contains(&e.callee));
}

/// Stage 2: sort by `(caller, callee, line, col)`; within a run sharing
/// `(caller, callee)`, keep the first record and +1 its weight per
/// distinct subsequent `(line, col)`, dropping exact repeats.
fn collapse_duplicates(graph: &mut GlobalGraph) {
    graph
        .edges
        .sort_by_key(|e| (e.caller.addr(), e.callee.addr(), e.line, e.column));

    let mut merged: Vec<crate::graph::Edge> = Vec::new();
    let mut last_loc: Option<(u32, u32)> = None;
    for edge in graph.edges.drain(..) {
        let same_pair = merged
            .last()
            .is_some_and(|l| l.caller == edge.caller && l.callee == edge.callee);
        if same_pair {
            if last_loc != Some((edge.line, edge.column)) {
                merged.last_mut().unwrap().weight += 1.0;
            }
        } else {
            merged.push(edge);
        }
        last_loc = Some((edge.line, edge.column));
    }
    graph.edges = merged;
}

/// Stage 3. Splices each incoming edge through each outgoing edge of an
/// INLINE def (skipping self-loops) as a fresh weight-1 edge at the
/// incoming call site, then drops the def and its own edges -- but only
/// contracts defs whose outgoing edges already target non-inline callees,
/// so a chain `u → f → g` (both inline) resolves over two rounds to
/// `u → g` rather than stopping at the stale intermediate `u → f`. This
/// is the fixed-point iteration the upstream `collapse_inline` (a single
/// hashtable pass, order-dependent on chains) doesn't perform.
fn collapse_inline(graph: &mut GlobalGraph) {
    loop {
        let inline_fns: Vec<Handle> = graph
            .defs
            .iter()
            .copied()
            .filter(|h| h.flags().contains(Flags::INLINE))
            .collect();
        if inline_fns.is_empty() {
            return;
        }

        let ready: Vec<Handle> = inline_fns
            .iter()
            .copied()
            .filter(|&f| {
                graph
                    .edges
                    .iter()
                    .filter(|e| e.caller == f)
                    .all(|e| e.callee == f || !e.callee.flags().contains(Flags::INLINE))
            })
            .collect();

        // A cycle of mutually-inline functions has no ready member;
        // contract the whole batch as leaves so the loop still terminates.
        let batch = if ready.is_empty() { inline_fns } else { ready };
        for f in batch {
            contract_inline_function(graph, f);
        }
    }
}

fn contract_inline_function(graph: &mut GlobalGraph, f: Handle) {
    let incoming: Vec<crate::graph::Edge> = graph
        .edges
        .iter()
        .copied()
        .filter(|e| e.callee == f && e.caller != f)
        .collect();
    let outgoing: Vec<crate::graph::Edge> = graph
        .edges
        .iter()
        .copied()
        .filter(|e| e.caller == f && e.callee != f)
        .collect();

    for inc in &incoming {
        for out in &outgoing {
            graph.edges.push(crate::graph::Edge {
                caller: inc.caller,
                callee: out.callee,
                line: inc.line,
                column: inc.column,
                weight: 1.0,
            });
        }
    }

    graph.edges.retain(|e| e.caller != f && e.callee != f);
    graph.defs.retain(|d| *d != f);
}

/// Stage 4. Skipped entirely when every root list is empty: the
/// distilled invariant only constrains post-prune state "with non-empty
/// roots", so an empty-roots call leaves the graph untouched rather than
/// pruning it down to nothing (see DESIGN.md).
fn reachability_prune(graph: &mut GlobalGraph, cfg: &FilterConfig) {
    let no_roots = cfg.root_files.is_empty()
        && cfg.root_functions.is_empty()
        && cfg.reverse_root_files.is_empty()
        && cfg.reverse_root_functions.is_empty();
    if no_roots {
        return;
    }

    index::reindex(graph);
    index::clear_visited_marks(graph);

    for root in resolve_roots(graph, &cfg.root_files, &cfg.root_functions) {
        forward_dfs(graph, root);
    }

    // The reverse pass gets its own visited set rather than reusing the
    // forward pass's scratch bit: a node already marked reachable going
    // forward (e.g. a reverse root itself) must not short-circuit the
    // reverse walk, or everything upstream of it through the reverse
    // relation is wrongly left unvisited and pruned.
    let incoming = build_incoming(graph);
    let mut reverse_visited: HashSet<Handle> = HashSet::new();
    for root in resolve_roots(graph, &cfg.reverse_root_files, &cfg.reverse_root_functions) {
        reverse_dfs(&incoming, root, &mut reverse_visited);
    }

    let keep = |h: Handle| index::is_visited(h) || reverse_visited.contains(&h);
    graph.defs.retain(|d| keep(*d));
    graph.edges.retain(|e| keep(e.caller) && keep(e.callee));
}

fn resolve_roots(graph: &GlobalGraph, files: &[String], functions: &[String]) -> Vec<Handle> {
    let mut roots = Vec::new();
    for name in functions {
        if let Some(h) = graph.table.lookup(name) {
            roots.push(h);
        }
    }
    for name in files {
        if let Some(file) = graph.table.lookup(name) {
            roots.extend(graph.defs.iter().copied().filter(|d| d.file() == Some(file)));
        }
    }
    roots
}

fn forward_dfs(graph: &GlobalGraph, root: Handle) {
    if index::is_visited(root) {
        return;
    }
    index::mark_visited(root);
    for edge in index::outgoing(graph, root) {
        forward_dfs(graph, edge.callee);
    }
}

fn build_incoming(graph: &GlobalGraph) -> HashMap<Handle, Vec<Handle>> {
    let mut incoming: HashMap<Handle, Vec<Handle>> = HashMap::new();
    for edge in &graph.edges {
        incoming.entry(edge.callee).or_default().push(edge.caller);
    }
    incoming
}

fn reverse_dfs(incoming: &HashMap<Handle, Vec<Handle>>, root: Handle, visited: &mut HashSet<Handle>) {
    if !visited.insert(root) {
        return;
    }
    if let Some(callers) = incoming.get(&root) {
        for &caller in callers {
            reverse_dfs(incoming, caller, visited);
        }
    }
}

/// Stage 5: replace function-level edges with file-level ones (spec
/// §4.7 step 5), then collapse to unique `(from_file, to_file)` pairs
/// summing weight. `defs` becomes the set of files actually referenced,
/// since a LOD=file graph has no function nodes left to iterate.
fn file_condensation(graph: &mut GlobalGraph) {
    let mut file_edges: Vec<crate::graph::Edge> = Vec::new();
    for edge in &graph.edges {
        if let (Some(from_file), Some(to_file)) = (edge.caller.file(), edge.callee.file()) {
            if from_file != to_file {
                file_edges.push(crate::graph::Edge {
                    caller: from_file,
                    callee: to_file,
                    line: 0,
                    column: 0,
                    weight: edge.weight,
                });
            }
        }
    }
    graph.edges = file_edges;
    collapse_file_duplicates(graph);

    let mut files: Vec<Handle> = graph.defs.iter().filter_map(|d| d.file()).collect();
    files.sort_by_key(|h| h.addr());
    files.dedup();
    graph.defs = files;
}

fn collapse_file_duplicates(graph: &mut GlobalGraph) {
    graph.edges.sort_by_key(|e| (e.callee.addr(), e.caller.addr()));
    let mut merged: Vec<crate::graph::Edge> = Vec::new();
    for edge in graph.edges.drain(..) {
        if let Some(last) = merged.last_mut() {
            if last.caller == edge.caller && last.callee == edge.callee {
                last.weight += edge.weight;
                continue;
            }
        }
        merged.push(edge);
    }
    graph.edges = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PartialGraph;

    fn func(graph: &mut PartialGraph, name: &str, file: &str, flags: Flags) -> Handle {
        let file_h = graph.intern_file(file);
        let h = graph.table.put_with_flags(name, Flags::FUNCTION | Flags::DEFINED | flags);
        h.set_file(Some(file_h));
        h.set_location(1, 1);
        graph.defs.push(h);
        h
    }

    /// Spec §8 scenario 5: two distinct call sites collapse to weight 2,
    /// a repeated observation of the same site doesn't inflate it further.
    #[test]
    fn collapse_duplicates_accumulates_weight_by_distinct_call_site() {
        let mut g = PartialGraph::new();
        let a = func(&mut g, "a", "f.c", Flags::empty());
        let b = func(&mut g, "b", "f.c", Flags::empty());
        g.push_edge(a, b, 10, 1);
        g.push_edge(a, b, 10, 1); // same site re-observed, e.g. via a header
        g.push_edge(a, b, 20, 1); // distinct site

        collapse_duplicates(&mut g);

        assert_eq!(g.edges.len(), 1);
        assert_eq!(g.edges[0].weight, 2.0);
    }

    /// Spec §8 scenario 2: `a` calls inline `b`, `b` calls `c`; after
    /// contraction `a` calls `c` directly and `b` is gone.
    #[test]
    fn inline_contraction_splices_through_inline_function() {
        let mut g = PartialGraph::new();
        let a = func(&mut g, "a", "f.c", Flags::empty());
        let b = func(&mut g, "b", "f.c", Flags::INLINE);
        let c = func(&mut g, "c", "f.c", Flags::empty());
        g.push_edge(a, b, 5, 1);
        g.push_edge(b, c, 6, 1);

        collapse_inline(&mut g);

        assert_eq!(g.defs.len(), 2);
        assert!(!g.defs.contains(&b));
        assert_eq!(g.edges.len(), 1);
        assert_eq!(g.edges[0].caller, a);
        assert_eq!(g.edges[0].callee, c);
    }

    /// A chain of two inline functions (`u → f → g`, both INLINE) must
    /// fully resolve to `u → c` in one `collapse_inline` call, not stop
    /// at the stale intermediate `u → g`.
    #[test]
    fn inline_contraction_resolves_a_chain_of_two_inline_functions() {
        let mut g = PartialGraph::new();
        let u = func(&mut g, "u", "f.c", Flags::empty());
        let f = func(&mut g, "f", "f.c", Flags::INLINE);
        let gg = func(&mut g, "g", "f.c", Flags::INLINE);
        let c = func(&mut g, "c", "f.c", Flags::empty());
        g.push_edge(u, f, 1, 1);
        g.push_edge(f, gg, 2, 1);
        g.push_edge(gg, c, 3, 1);

        collapse_inline(&mut g);

        assert_eq!(g.defs.len(), 2);
        assert!(g.defs.contains(&u));
        assert!(g.defs.contains(&c));
        assert_eq!(g.edges.len(), 1);
        assert_eq!(g.edges[0].caller, u);
        assert_eq!(g.edges[0].callee, c);
    }

    #[test]
    fn exclude_static_drops_only_global_flagged_functions() {
        let mut g = PartialGraph::new();
        let extern_fn = func(&mut g, "pub_api", "f.c", Flags::empty());
        let static_fn = func(&mut g, "helper", "f.c", Flags::GLOBAL);
        g.push_edge(extern_fn, static_fn, 1, 1);

        exclude_static(&mut g);

        assert_eq!(g.defs.len(), 1);
        assert_eq!(g.defs[0], extern_fn);
        assert!(g.edges.is_empty());
    }

    #[test]
    fn exclude_drops_function_and_its_edges() {
        let mut g = PartialGraph::new();
        let a = func(&mut g, "a", "f.c", Flags::empty());
        let b = func(&mut g, "b", "f.c", Flags::empty());
        g.push_edge(a, b, 1, 1);

        exclude(&mut g, &[], &["b".to_owned()]);

        assert_eq!(g.defs.len(), 1);
        assert!(g.edges.is_empty());
    }

    #[test]
    fn exclude_drops_whole_file() {
        let mut g = PartialGraph::new();
        func(&mut g, "a", "dead.c", Flags::empty());
        func(&mut g, "b", "live.c", Flags::empty());

        exclude(&mut g, &["dead.c".to_owned()], &[]);

        assert_eq!(g.defs.len(), 1);
        assert_eq!(g.defs[0].name(), "b");
    }

    /// Spec §8 scenario 3: forward root keeps only what it can reach.
    #[test]
    fn reachability_prune_keeps_only_forward_reachable_functions() {
        let mut g = PartialGraph::new();
        let a = func(&mut g, "a", "f.c", Flags::empty());
        let b = func(&mut g, "b", "f.c", Flags::empty());
        let unreachable = func(&mut g, "orphan", "f.c", Flags::empty());
        g.push_edge(a, b, 1, 1);
        let _ = unreachable;

        let cfg = FilterConfig {
            root_functions: vec!["a".to_owned()],
            ..Default::default()
        };
        reachability_prune(&mut g, &cfg);

        assert_eq!(g.defs.len(), 2);
        assert!(g.defs.contains(&a));
        assert!(g.defs.contains(&b));
    }

    #[test]
    fn reachability_prune_reverse_root_keeps_ancestors_not_descendants() {
        let mut g = PartialGraph::new();
        let a = func(&mut g, "a", "f.c", Flags::empty());
        let b = func(&mut g, "b", "f.c", Flags::empty());
        let c = func(&mut g, "c", "f.c", Flags::empty());
        g.push_edge(a, b, 1, 1);
        g.push_edge(b, c, 2, 1);

        let cfg = FilterConfig {
            reverse_root_functions: vec!["b".to_owned()],
            ..Default::default()
        };
        reachability_prune(&mut g, &cfg);

        // Reverse root `b` keeps everything that can *reach* b (a, b),
        // but not what b itself reaches (c).
        assert!(g.defs.contains(&a));
        assert!(g.defs.contains(&b));
        assert!(!g.defs.contains(&c));
    }

    #[test]
    fn reverse_dfs_does_not_stop_at_a_node_already_marked_by_the_forward_pass() {
        // main (forward root) -> helper; a -> helper; a is not forward-
        // reachable. Reverse root `helper` must still walk to `a`, even
        // though `helper` was already marked visited by the forward pass.
        let mut g = PartialGraph::new();
        let main = func(&mut g, "main", "f.c", Flags::empty());
        let helper = func(&mut g, "helper", "f.c", Flags::empty());
        let a = func(&mut g, "a", "f.c", Flags::empty());
        g.push_edge(main, helper, 1, 1);
        g.push_edge(a, helper, 2, 1);

        let cfg = FilterConfig {
            root_functions: vec!["main".to_owned()],
            reverse_root_functions: vec!["helper".to_owned()],
            ..Default::default()
        };
        reachability_prune(&mut g, &cfg);

        assert!(g.defs.contains(&main));
        assert!(g.defs.contains(&helper));
        assert!(g.defs.contains(&a), "a reaches reverse root helper and must be retained");
    }

    #[test]
    fn reachability_prune_is_skipped_when_no_roots_configured() {
        let mut g = PartialGraph::new();
        func(&mut g, "a", "f.c", Flags::empty());
        let cfg = FilterConfig::default();
        reachability_prune(&mut g, &cfg);
        assert_eq!(g.defs.len(), 1);
    }

    /// Spec §8 scenario 6: LOD=file condenses two inter-file function
    /// calls into one file-level edge with summed weight, and drops the
    /// intra-file call entirely.
    #[test]
    fn file_condensation_merges_inter_file_edges_and_drops_intra_file() {
        let mut g = PartialGraph::new();
        let a = func(&mut g, "a", "x.c", Flags::empty());
        let b = func(&mut g, "b", "x.c", Flags::empty());
        let c1 = func(&mut g, "c1", "y.c", Flags::empty());
        let c2 = func(&mut g, "c2", "y.c", Flags::empty());
        g.push_edge(a, b, 1, 1); // intra-file, dropped by condensation
        g.push_edge(a, c1, 2, 1);
        g.push_edge(b, c2, 3, 1);

        collapse_duplicates(&mut g);
        file_condensation(&mut g);

        assert_eq!(g.edges.len(), 1);
        assert_eq!(g.edges[0].weight, 2.0);
        assert_eq!(g.defs.len(), 2);
        assert!(g.defs.iter().all(|d| d.flags().contains(Flags::FILE)));
    }
}
