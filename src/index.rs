//! The transient per-caller offset index (spec §4.6): after sorting
//! `edges` by `(caller, callee, line, col)` and `defs` by handle address,
//! each function handle's scratch word is set to the start offset of its
//! outgoing-edge run, packed into the upper 48 bits; the low bit is
//! reserved for the DFS visited mark used by `filter::reachability_prune`.
//!
//! Re-run this (`reindex`) after anything reorders `edges` or `defs` --
//! it is never valid across a reordering step.

use crate::graph::GlobalGraph;

const OFFSET_SHIFT: u32 = 16;
pub const VISITED_BIT: u64 = 1;

/// Sorts `edges`/`defs` and rebuilds the offset index. Functions that
/// never call anything keep `scratch == 0` (spec §4.6 step 3).
pub fn reindex(graph: &mut GlobalGraph) {
    graph
        .edges
        .sort_by_key(|e| (e.caller.addr(), e.callee.addr(), e.line, e.column));
    graph.defs.sort_by_key(|h| h.addr());

    for def in &graph.defs {
        def.set_scratch(0);
    }

    let mut i = 0;
    while i < graph.edges.len() {
        let caller = graph.edges[i].caller;
        let start = i;
        while i < graph.edges.len() && graph.edges[i].caller == caller {
            i += 1;
        }
        caller.set_scratch((start as u64) << OFFSET_SHIFT);
    }
}

/// Clears the visited bit (bit 0) of every def's scratch word, leaving
/// any offset already encoded in the upper 48 bits untouched. Call before
/// a fresh DFS (spec §4.7 stage 4: "the re-entrant guard is `scratch &
/// 1`").
pub fn clear_visited_marks(graph: &GlobalGraph) {
    for def in &graph.defs {
        def.set_scratch(def.scratch() & !VISITED_BIT);
    }
}

pub fn is_visited(handle: crate::literal::Handle) -> bool {
    handle.scratch() & VISITED_BIT != 0
}

pub fn mark_visited(handle: crate::literal::Handle) {
    handle.set_scratch(handle.scratch() | VISITED_BIT);
}

/// Returns the slice of `graph.edges` whose `caller == fn_handle`, using
/// the offset encoded in its scratch word by the most recent [`reindex`].
/// O(1) plus the run length itself.
pub fn outgoing<'g>(graph: &'g GlobalGraph, fn_handle: crate::literal::Handle) -> &'g [crate::graph::Edge] {
    let scratch = fn_handle.scratch();
    if scratch == 0 && !graph.edges.iter().any(|e| e.caller == fn_handle) {
        return &[];
    }
    let start = (scratch >> OFFSET_SHIFT) as usize;
    let end = graph.edges[start..]
        .iter()
        .take_while(|e| e.caller == fn_handle)
        .count()
        + start;
    &graph.edges[start..end]
}
