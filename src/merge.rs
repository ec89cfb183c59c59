//! Shard reconciliation: `merge_graphs(dst, src)` (spec §4.5's three
//! phases) and the logarithmic pairwise driver that reduces `nproc` shards
//! down to one canonical [`GlobalGraph`].
//!
//! Grounded on `original_source/callgraph.c`'s `merge_move_callgraph`:
//! move the string table first, rewrite every reference that pointed at a
//! literal which turned out to be a duplicate, then append the edge/def
//! vectors and deduplicate defs.

use crate::graph::{Edge, GlobalGraph, PartialGraph};
use crate::literal::{Handle, InternTable};
use crate::worker::WorkerPool;
use std::collections::HashMap;

/// Phases 1-3 of spec §4.5: reconcile `src`'s intern table into `dst`'s,
/// rewrite every `src.edges`/`src.defs` handle that was mapped to a `dst`
/// literal, then append and deduplicate. After this call `src` is an
/// empty, still-valid `PartialGraph` (its table's arenas have been
/// absorbed into `dst`'s, so any handle transferred into `dst` stays
/// valid even though `src` itself is about to be dropped).
pub fn merge_graphs(dst: &mut PartialGraph, src: &mut PartialGraph) {
    let remap = InternTable::merge(&mut dst.table, &mut src.table);
    if !remap.is_empty() {
        let by_old: HashMap<Handle, Handle> = remap.into_iter().collect();
        rewrite(&mut src.edges, &mut src.defs, &by_old);
    }

    dst.edges.append(&mut src.edges);
    dst.defs.append(&mut src.defs);
    dedup_defs(&mut dst.defs);
}

/// Phase 2: naive O(E·D) walk (spec §4.5 note: either the naive walk or a
/// sort-and-sweep sweep is acceptable; see DESIGN.md for why the simpler
/// one was chosen here).
fn rewrite(edges: &mut [Edge], defs: &mut [Handle], by_old: &HashMap<Handle, Handle>) {
    for edge in edges.iter_mut() {
        if let Some(&new) = by_old.get(&edge.caller) {
            edge.caller = new;
        }
        if let Some(&new) = by_old.get(&edge.callee) {
            edge.callee = new;
        }
    }
    for def in defs.iter_mut() {
        if let Some(&new) = by_old.get(def) {
            *def = new;
        }
    }
}

/// Sorts by `(file, handle)` and coalesces equal handles, keeping any
/// known file location already attached to the surviving handle (spec
/// §4.5: "Deduplicate defs: sort by (file, handle), coalesce equal
/// handles keeping any known file location").
fn dedup_defs(defs: &mut Vec<Handle>) {
    defs.sort_by_key(|h| (h.file().map(|f| f.addr()), h.addr()));
    defs.dedup();
}

/// Reduces `shards` to a single [`GlobalGraph`] using the logarithmic
/// pairwise scheme of spec §4.5: at each round, submit `floor(n/2)` merge
/// tasks in parallel, drain, halve `n`.
pub fn parallel_merge(pool: &mut WorkerPool, mut shards: Vec<PartialGraph>) -> GlobalGraph {
    if shards.is_empty() {
        return GlobalGraph::new();
    }

    let mut n = shards.len();
    while n > 1 {
        let half = n / 2;
        // Split off the back half so `shards[0..half]` (dst) and
        // `shards[half..n]` (src) never alias in the same round, matching
        // spec §5's "no merge task overlaps another in its addressable
        // shards in the same round".
        let mut tail: Vec<PartialGraph> = shards.drain(half..n).collect();

        // Work with raw pointers so each merge task can borrow a disjoint
        // `(dst, src)` pair across threads without fighting the borrow
        // checker over one `Vec<PartialGraph>`; safety follows directly
        // from the disjointness just established.
        let dst_ptrs: Vec<*mut PartialGraph> = shards.iter_mut().map(|g| g as *mut _).collect();
        let src_ptrs: Vec<*mut PartialGraph> = tail.iter_mut().map(|g| g as *mut _).collect();

        for k in 0..half {
            let dst_ptr = dst_ptrs[k] as usize;
            let src_ptr = src_ptrs[k] as usize;
            pool.submit(move |_thread_index| {
                // SAFETY: `dst_ptr` and `src_ptr` point at distinct
                // elements of `shards`/`tail`, neither of which is
                // touched again by the caller until `pool.drain()`
                // returns.
                let dst = unsafe { &mut *(dst_ptr as *mut PartialGraph) };
                let src = unsafe { &mut *(src_ptr as *mut PartialGraph) };
                merge_graphs(dst, src);
            });
        }
        pool.drain();

        // The odd shard out (if `n` was odd) carries over untouched.
        if n % 2 == 1 {
            shards.push(tail.pop().unwrap());
        }
        drop(tail);

        n = shards.len();
    }

    shards.pop().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Flags;

    #[test]
    fn merge_graphs_rewrites_duplicate_references() {
        let mut dst = PartialGraph::new();
        let dst_f = dst.table.put_with_flags("f", Flags::FUNCTION);
        let dst_g = dst.table.put_with_flags("g", Flags::FUNCTION);
        dst.defs.push(dst_f);
        dst.defs.push(dst_g);
        dst.push_edge(dst_f, dst_g, 1, 1);

        let mut src = PartialGraph::new();
        let src_f = src.table.put_with_flags("f", Flags::FUNCTION);
        let src_h = src.table.put_with_flags("h", Flags::FUNCTION);
        src.defs.push(src_f);
        src.defs.push(src_h);
        src.push_edge(src_f, src_h, 2, 2);

        merge_graphs(&mut dst, &mut src);

        assert_eq!(dst.edges.len(), 2);
        assert!(dst.edges.iter().all(|e| e.caller == dst_f));
        assert_eq!(dst.table.len(), 3);
        assert_eq!(dst.defs.len(), 3);
    }

    #[test]
    fn parallel_merge_reduces_many_shards_to_one() {
        let mut pool = WorkerPool::new(4);
        let shards: Vec<PartialGraph> = (0..7)
            .map(|i| {
                let mut g = PartialGraph::new();
                let f = g.table.put_with_flags(&format!("f{i}"), Flags::FUNCTION);
                g.defs.push(f);
                g
            })
            .collect();

        let global = parallel_merge(&mut pool, shards);
        assert_eq!(global.defs.len(), 7);
        assert_eq!(global.table.len(), 7);
    }

    #[test]
    fn parallel_merge_of_empty_shard_list_is_empty_graph() {
        let mut pool = WorkerPool::new(2);
        let global = parallel_merge(&mut pool, Vec::new());
        assert!(global.defs.is_empty());
        assert!(global.edges.is_empty());
    }
}
