//! The intern table: the hash-keyed set of *literal* records (function and
//! file names) that every other part of the pipeline addresses through a
//! stable [`Handle`].
//!
//! Literals are heap-allocated one at a time so that a [`Handle`] (really
//! just a pointer) keeps pointing at the same metadata no matter how the
//! table's own bucket array grows, and no matter which table currently
//! "owns" the node -- [`InternTable::merge`] moves ownership of a literal's
//! [`Box`] between tables without touching the literal itself, so the
//! address, and therefore the handle, never changes. Name bytes are bump
//! allocated out of a [`typed_arena::Arena`] owned by the table; arenas
//! absorbed from a merged-away table are kept alive in `foreign_arenas` for
//! exactly as long as the surviving table lives, since a transferred
//! literal's name may still point into them.

use fnv::FnvHasher;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hasher;
use std::ptr::NonNull;
use typed_arena::Arena;

bitflags::bitflags! {
    /// Per-literal classification bits (spec data model: FUNCTION, FILE,
    /// GLOBAL, INLINE, DEFINED, DUPLICATED).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags: u8 {
        const FUNCTION   = 1 << 0;
        const FILE       = 1 << 1;
        /// Storage class was not `extern`. This includes `static`
        /// functions: the upstream tool's own semantics, preserved as-is
        /// rather than "fixed" (see DESIGN.md open question).
        const GLOBAL     = 1 << 2;
        const INLINE     = 1 << 3;
        const DEFINED    = 1 << 4;
        const DUPLICATED = 1 << 5;
    }
}

struct LiteralNode {
    name: &'static str,
    hash: u64,
    file: Cell<Option<Handle>>,
    line: Cell<u32>,
    column: Cell<u32>,
    flags: Cell<Flags>,
    /// Transient per-algorithm scratch word: offset-into-edges index
    /// (upper 48 bits) during DOT emission, visited mark (low bit) during
    /// DFS. Never meaningful across two different algorithms; each
    /// algorithm that uses it re-initializes it first.
    scratch: Cell<u64>,
}

/// A stable reference to an interned literal. Cheap to copy, valid for as
/// long as the [`InternTable`] (or whichever table it was last merged into)
/// is alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonNull<LiteralNode>);

// SAFETY: a `Handle` is only ever dereferenced while the owning
// `InternTable` is reachable from a single thread at a time: shards are
// built exclusively by one worker task, and merge tasks own their `(dst,
// src)` pair exclusively (see worker::WorkerPool). No two threads ever
// read or write the same node concurrently.
unsafe impl Send for Handle {}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:p})", self.0.as_ptr())
    }
}

impl Handle {
    fn node(&self) -> &LiteralNode {
        // SAFETY: see the `unsafe impl Send for Handle` note above; the
        // pointee is never freed while any handle referencing it is
        // reachable (merge only drops nodes it has first rewritten every
        // reference to).
        unsafe { self.0.as_ref() }
    }

    pub fn name(&self) -> &str {
        self.node().name
    }

    pub fn hash(&self) -> u64 {
        self.node().hash
    }

    pub fn file(&self) -> Option<Handle> {
        self.node().file.get()
    }

    pub fn set_file(&self, file: Option<Handle>) {
        self.node().file.set(file);
    }

    pub fn line(&self) -> u32 {
        self.node().line.get()
    }

    pub fn column(&self) -> u32 {
        self.node().column.get()
    }

    pub fn set_location(&self, line: u32, column: u32) {
        self.node().line.set(line);
        self.node().column.set(column);
    }

    pub fn flags(&self) -> Flags {
        self.node().flags.get()
    }

    pub fn set_flags(&self, flags: Flags) {
        self.node().flags.set(flags);
    }

    /// ORs `flags` into the literal's current flag set.
    pub fn add_flags(&self, flags: Flags) {
        self.set_flags(self.flags() | flags);
    }

    pub fn scratch(&self) -> u64 {
        self.node().scratch.get()
    }

    pub fn set_scratch(&self, value: u64) {
        self.node().scratch.set(value);
    }

    /// Raw address, used only as the DOT writer's `n<address>` node id and
    /// as a total order for sorting (spec: "defs has no duplicate handles",
    /// "sort defs by handle address").
    pub fn addr(&self) -> usize {
        self.0.as_ptr() as usize
    }
}

fn hash64(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// A hash-keyed, arena-backed set of [`LiteralNode`]s, addressed through
/// [`Handle`]s. One table is built per parser shard; tables are then
/// reconciled pairwise by [`InternTable::merge`] until a single canonical
/// table remains.
pub struct InternTable {
    /// Owns every `LiteralNode` currently homed in this table. Moving a
    /// `Box` out of (or into) this vector relocates the pointer, never the
    /// pointee, so existing `Handle`s stay valid.
    nodes: Vec<Box<LiteralNode>>,
    /// Chained hash index: bucket by hash, linear-probe the bucket's
    /// handles comparing full name bytes on a collision. This is the safe
    /// stand-in for the "open-addressed / chained hashing" table of the
    /// spec; `lookup_ptr` below returns a handle to the bucket itself so
    /// callers can insert-with-hint without re-hashing.
    index: HashMap<u64, Vec<Handle>>,
    arena: Arena<u8>,
    /// Arenas absorbed from tables merged into this one. A transferred
    /// literal's name may point into one of these; they must outlive every
    /// handle that could reference them, i.e. exactly as long as `self`.
    foreign_arenas: Vec<Arena<u8>>,
}

impl Default for InternTable {
    fn default() -> Self {
        InternTable {
            nodes: Vec::new(),
            index: HashMap::new(),
            arena: Arena::new(),
            foreign_arenas: Vec::new(),
        }
    }
}

impl InternTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds an existing literal with (hash, name) equal to `key`'s, or
    /// `None`. Equivalent to the spec's `lookup_ptr` when the caller only
    /// needs a yes/no answer rather than an insertion hint.
    fn find(&self, hash: u64, name: &str) -> Option<Handle> {
        self.index
            .get(&hash)?
            .iter()
            .copied()
            .find(|h| h.name() == name)
    }

    /// Finds an already-interned literal by name, for config-driven
    /// lookups (exclude/root lists name literals that may or may not have
    /// been seen yet). Equivalent to the upstream `find_file`/
    /// `find_function` pair, collapsed into one name-keyed lookup since
    /// file paths and identifiers don't collide in practice.
    pub fn lookup(&self, name: &str) -> Option<Handle> {
        self.find(hash64(name.as_bytes()), name)
    }

    /// Interns `name`, returning its (possibly pre-existing) handle.
    pub fn put(&mut self, name: &str) -> Handle {
        self.put_with_flags(name, Flags::empty())
    }

    /// `put` followed by OR-ing `flags` into the literal's flag set.
    pub fn put_with_flags(&mut self, name: &str, flags: Flags) -> Handle {
        let hash = hash64(name.as_bytes());
        if let Some(existing) = self.find(hash, name) {
            existing.add_flags(flags);
            return existing;
        }

        // SAFETY: the arena is never dropped before `self`, and the
        // resulting slice is only ever read through a `Handle` that cannot
        // outlive `self` (see `unsafe impl Send for Handle`), so widening
        // the lifetime to `'static` here never exposes a dangling
        // reference in practice.
        let owned: &'static str = unsafe {
            let bytes = self.arena.alloc_extend(name.bytes());
            std::str::from_utf8_unchecked(std::mem::transmute::<&[u8], &'static [u8]>(bytes))
        };

        let node = Box::new(LiteralNode {
            name: owned,
            hash,
            file: Cell::new(None),
            line: Cell::new(0),
            column: Cell::new(0),
            flags: Cell::new(flags),
            scratch: Cell::new(0),
        });
        let handle = Handle(NonNull::from(node.as_ref()));
        self.nodes.push(node);
        self.index.entry(hash).or_default().push(handle);
        handle
    }

    /// Destructively reconciles `src` into `dst` so that every handle
    /// either already lived in `dst`, or now does. See module docs and
    /// `merge::merge_tables` for the full three-phase algorithm; this
    /// method performs only the table-level bookkeeping (phase 1 transfer
    /// / absorb, keeping `src`'s arenas alive in `dst`).
    ///
    /// Returns the set of `(old, new)` pairs for literals that turned out
    /// to be duplicates of an existing `dst` literal, so the caller can
    /// rewrite edge/def references (merge phases 2-3).
    pub fn merge(dst: &mut InternTable, src: &mut InternTable) -> Vec<(Handle, Handle)> {
        let mut remap = Vec::new();

        // Work on a drained copy of src.nodes so we can freely decide,
        // per node, whether it moves into dst.nodes or stays behind to be
        // dropped as a stale duplicate.
        let taken = std::mem::take(&mut src.nodes);
        for node in taken {
            let handle = Handle(NonNull::from(node.as_ref()));
            match dst.find(handle.hash(), handle.name()) {
                None => {
                    dst.index.entry(handle.hash()).or_default().push(handle);
                    dst.nodes.push(node);
                }
                Some(existing) => {
                    // Copy missing metadata into the surviving literal,
                    // OR-ing flags; flag a file conflict as DUPLICATED
                    // rather than silently overwriting (spec §4.5 phase 1).
                    if existing.file().is_none() {
                        existing.set_file(handle.file());
                    } else if let Some(other_file) = handle.file() {
                        if existing.file() != Some(other_file) {
                            existing.add_flags(Flags::DUPLICATED);
                        }
                    }
                    if existing.line() == 0 && handle.line() != 0 {
                        existing.set_location(handle.line(), handle.column());
                    }
                    existing.add_flags(handle.flags());
                    remap.push((handle, existing));
                    // `node`'s Box is dropped here: its LiteralNode is
                    // freed once this function returns (after the caller
                    // has rewritten every reference away from `handle`).
                }
            }
        }

        dst.foreign_arenas
            .push(std::mem::replace(&mut src.arena, Arena::new()));
        dst.foreign_arenas
            .append(&mut std::mem::take(&mut src.foreign_arenas));

        remap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_dedupes_by_name() {
        let mut table = InternTable::new();
        let a = table.put("foo");
        let b = table.put("foo");
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn put_with_flags_ors_into_existing() {
        let mut table = InternTable::new();
        let a = table.put_with_flags("foo", Flags::FUNCTION);
        let b = table.put_with_flags("foo", Flags::DEFINED);
        assert_eq!(a, b);
        assert!(a.flags().contains(Flags::FUNCTION));
        assert!(a.flags().contains(Flags::DEFINED));
    }

    #[test]
    fn distinct_names_get_distinct_handles() {
        let mut table = InternTable::new();
        let a = table.put("foo");
        let b = table.put("bar");
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn merge_transfers_non_duplicates() {
        let mut dst = InternTable::new();
        let mut src = InternTable::new();
        let only_in_src = src.put("only_in_src");
        let remap = InternTable::merge(&mut dst, &mut src);
        assert!(remap.is_empty());
        assert_eq!(dst.len(), 1);
        assert_eq!(only_in_src.name(), "only_in_src");
    }

    #[test]
    fn merge_marks_duplicated_on_conflicting_file() {
        let mut dst = InternTable::new();
        let dst_fn = dst.put_with_flags("f", Flags::FUNCTION);
        let dst_file_a = dst.put_with_flags("a.c", Flags::FILE);
        dst_fn.set_file(Some(dst_file_a));

        let mut src = InternTable::new();
        let src_fn = src.put_with_flags("f", Flags::FUNCTION);
        let src_file_b = src.put_with_flags("b.c", Flags::FILE);
        src_fn.set_file(Some(src_file_b));

        let remap = InternTable::merge(&mut dst, &mut src);
        assert_eq!(remap.len(), 1);
        assert!(dst_fn.flags().contains(Flags::DUPLICATED));
    }

    #[test]
    fn lookup_finds_interned_name_but_not_absent_one() {
        let mut table = InternTable::new();
        let h = table.put("foo");
        assert_eq!(table.lookup("foo"), Some(h));
        assert_eq!(table.lookup("bar"), None);
    }

    #[test]
    fn merge_keeps_names_from_absorbed_arena_alive() {
        let mut dst = InternTable::new();
        let mut src = InternTable::new();
        let h = src.put("transferred_name");
        InternTable::merge(&mut dst, &mut src);
        drop(src);
        assert_eq!(h.name(), "transferred_name");
    }
}
