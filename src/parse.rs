//! The parallel parse driver (spec §4.4): open the compilation database,
//! preallocate one partial graph per worker, submit one task per batch of
//! ≤16 compile commands, `drain`, then reduce the `nproc` shards with
//! [`merge::parallel_merge`].
//!
//! Grounded on `original_source/callgraph.c`'s `parse_directory`/
//! `do_parse`, generalized from "one shard per worker, sized up front" to
//! "one task per batch, indexed into a shared `shards[thread_index]`" per
//! the distilled control flow.

use crate::error::CgError;
use crate::frontend::clang_backend;
use crate::frontend::compdb::{self, CompilationDatabase, CompileCommand};
use crate::graph::{GlobalGraph, PartialGraph};
use crate::merge;
use crate::visitor;
use crate::worker::WorkerPool;
use std::sync::Mutex;

/// Upper bound on compile commands per submitted task (spec §4.4: "B=16").
pub const BATCH_SIZE: usize = 16;

/// `std::env::set_current_dir` changes process-wide state; libclang's own
/// docs don't promise thread safety for a shared index either, so every
/// batch task serializes on this guard around the chdir+parse+visit
/// sequence for one compile command. Spec §4.4 calls this "thread-local"
/// chdir, which POSIX doesn't actually offer -- this is the closest
/// correct realization of that intent.
static CHDIR_GUARD: Mutex<()> = Mutex::new(());

/// Opens the compilation database at `path`, parses every compile command
/// across `pool.nproc()` shards, and reduces them to one [`GlobalGraph`].
pub fn parse_directory(path: &str, pool: &mut WorkerPool) -> Result<GlobalGraph, CgError> {
    let cdb = CompilationDatabase::from_directory(path)?;
    let commands = cdb.all_commands();
    drop(cdb);

    let nproc = pool.nproc();
    let mut shards: Vec<PartialGraph> = (0..nproc).map(|_| PartialGraph::new()).collect();

    // SAFETY: each submitted task only ever touches `shard_ptrs[thread_index]`
    // for the `thread_index` the pool hands it; distinct thread indices
    // never alias the same `shards` element, and no element is touched
    // again by this function until `pool.drain()` returns.
    let shard_ptrs: Vec<usize> = shards
        .iter_mut()
        .map(|shard| shard as *mut PartialGraph as usize)
        .collect();

    for batch in compdb::batches(&commands, BATCH_SIZE) {
        let batch: Vec<CompileCommand> = batch.to_vec();
        let shard_ptrs = shard_ptrs.clone();
        pool.submit(move |thread_index| {
            let shard = unsafe { &mut *(shard_ptrs[thread_index] as *mut PartialGraph) };
            parse_batch(&batch, shard);
        });
    }
    pool.drain();

    Ok(merge::parallel_merge(pool, shards))
}

/// Parses every command in `batch` into `shard`, opening one `clang::Index`
/// shared across the whole batch (spec §4.4: "Opens a Clang index (shared
/// nothing; one per worker task)"). An unparseable file is logged and
/// skipped, matching `do_parse`'s `warn("Cannot parse file '%s'", ...)`.
fn parse_batch(batch: &[CompileCommand], shard: &mut PartialGraph) {
    let clang = match clang::Clang::new() {
        Ok(c) => c,
        Err(message) => {
            log::warn!("cannot initialize libclang: {message}");
            return;
        }
    };
    let index = clang::Index::new(&clang, true, log::log_enabled!(log::Level::Debug));

    for cmd in batch {
        let _guard = CHDIR_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !cmd.directory.is_empty() {
            if let Err(err) = std::env::set_current_dir(&cmd.directory) {
                log::warn!("cannot chdir to '{}': {err}", cmd.directory);
                continue;
            }
        }

        match clang_backend::parse_translation_unit(&index, &cmd.filename, &cmd.args) {
            Ok(tu) => {
                let root = clang_backend::root_cursor(&tu);
                visitor::visit_translation_unit(&root, &cmd.filename, shard);
            }
            Err(err) => log::warn!("{}", crate::diag::unparseable_translation_unit(&cmd.filename, &err.to_string())),
        }
    }
}
