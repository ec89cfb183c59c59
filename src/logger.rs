//! A hand-written `log::Log` backend implementing the five numbered
//! levels of spec §7 (0 silent .. 4 sync-debug), in place of an off-the-
//! shelf backend -- see DESIGN.md for why `simple_logger` was dropped.
//!
//! Grounded on `original_source/util.c`'s `warn`/`info`/`debug`/
//! `syncdebug` family: same tag-per-level prefixes and color codes, same
//! "sync-debug serializes through a mutex, plain debug does not"
//! distinction. `log::Level::Trace` stands in for sync-debug (the `log`
//! facade only has five levels, the same count spec §7 names), so a
//! sync-debug message is written with `log::trace!`.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::Mutex;

struct Logger {
    level: u8,
    sync_mutex: Mutex<()>,
}

fn level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::Off,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn tag(level: Level) -> &'static str {
    match level {
        Level::Error => "\u{1b}[31;1mFATAL\u{1b}[m",
        Level::Warn => "\u{1b}[33;1mWARN\u{1b}[m",
        Level::Info => "\u{1b}[32;1mINFO\u{1b}[m",
        Level::Debug => "DEBUG",
        Level::Trace => "DEBUG",
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= level_filter(self.level)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}", tag(record.level()), record.args());
        if record.level() == Level::Trace {
            let _guard = self.sync_mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            eprintln!("{line}");
        } else {
            eprintln!("{line}");
        }
    }

    fn flush(&self) {}
}

/// Installs the logger as the global `log` backend at `level` (0..=4,
/// already clamped by [`crate::config::Config`]). Safe to call once per
/// process; a second call returns the underlying `SetLoggerError`.
pub fn init(level: u8) -> Result<(), log::SetLoggerError> {
    let logger = Box::leak(Box::new(Logger {
        level,
        sync_mutex: Mutex::new(()),
    }));
    log::set_logger(logger)?;
    log::set_max_level(level_filter(level));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filter_is_cumulative_by_numbered_level() {
        assert_eq!(level_filter(0), LevelFilter::Off);
        assert_eq!(level_filter(1), LevelFilter::Warn);
        assert_eq!(level_filter(2), LevelFilter::Info);
        assert_eq!(level_filter(3), LevelFilter::Debug);
        assert_eq!(level_filter(4), LevelFilter::Trace);
    }

    #[test]
    fn tag_maps_trace_to_the_same_debug_label_as_debug() {
        assert_eq!(tag(Level::Debug), tag(Level::Trace));
    }
}
