//! The binary entry point: CLI/config resolution, logger init, then the
//! control flow of spec §2 -- `parse_directory` (which itself parses,
//! drains, and merges internally) → `filter_graph` → `dump_dot`.
//!
//! Grounded on `original_source/main.c`'s own `init_config` →
//! `parse_options` → (driver calls, not present in the retrieved stub)
//! shape; the reference crate's `[[bin]] src/main.rs` is this same "thin
//! binary calling into the library" pattern, one level removed (not
//! itself retrieved, only named in its `Cargo.toml`).

use lxgraph::config::Config;
use lxgraph::error::CgError;
use lxgraph::{dot, filter, index, logger, parse, worker};
use std::process::ExitCode;

fn run() -> Result<(), CgError> {
    let argv: Vec<String> = std::env::args().collect();
    let config = Config::load(&argv)?;

    logger::init(config.log_level).ok();

    let mut pool = worker::WorkerPool::new(config.resolved_threads());
    let mut graph = parse::parse_directory(&config.build_dir, &mut pool)?;
    pool.fini(false);

    index::reindex(&mut graph);
    filter::filter_graph(&mut graph, &config.filter);
    index::reindex(&mut graph);

    dot::dump_dot_to_path(&graph, config.output_path.as_deref())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
