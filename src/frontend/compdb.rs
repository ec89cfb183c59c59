//! Compilation database access, bound directly through `clang-sys`'s raw
//! `CXCompilationDatabase` FFI (the high-level `clang` crate used for
//! `Index`/`Entity` does not itself bind this API -- see DESIGN.md). This
//! is the Rust analogue of `original_source/callgraph.c`'s use of
//! `clang_CompilationDatabase_fromDirectory` /
//! `clang_CompilationDatabase_getAllCompileCommands`.

use crate::error::CgError;
use std::ffi::{CStr, CString};
use std::os::raw::c_uint;

/// One entry of a compilation database: the directory a command should
/// run in, the file it compiles, and its argv.
#[derive(Clone, Debug)]
pub struct CompileCommand {
    pub directory: String,
    pub filename: String,
    pub args: Vec<String>,
}

/// An open `compile_commands.json`. Disposed on drop.
pub struct CompilationDatabase {
    raw: clang_sys::CXCompilationDatabase,
}

// SAFETY: `CXCompilationDatabase` is an opaque, reference-counted libclang
// handle; libclang's own documentation allows using a database handle
// from any single thread at a time, and `CompilationDatabase` is never
// shared across threads without external synchronization here (it is
// only ever read from the thread that opened it, before any worker task
// is submitted -- see `parse::parse_directory`).
unsafe impl Send for CompilationDatabase {}

impl CompilationDatabase {
    /// `clang_CompilationDatabase_fromDirectory`. `directory` should
    /// contain `compile_commands.json`.
    pub fn from_directory(directory: &str) -> Result<Self, CgError> {
        let c_dir = CString::new(directory).map_err(|_| CgError::Fatal {
            message: format!("compilation database path contains a NUL byte: {directory}"),
        })?;

        let mut error = clang_sys::CXCompilationDatabase_Error_NoError;
        let raw = unsafe {
            clang_sys::clang_CompilationDatabase_fromDirectory(c_dir.as_ptr(), &mut error)
        };

        if error != clang_sys::CXCompilationDatabase_Error_NoError || raw.is_null() {
            return Err(CgError::Fatal {
                message: format!("cannot find a compilation database in '{directory}'"),
            });
        }

        Ok(CompilationDatabase { raw })
    }

    /// `clang_CompilationDatabase_getAllCompileCommands` followed by
    /// flattening every `CXCompileCommand` into an owned
    /// [`CompileCommand`], since the underlying `CXCompileCommands`
    /// handle is disposed before this function returns.
    pub fn all_commands(&self) -> Vec<CompileCommand> {
        let commands = unsafe {
            clang_sys::clang_CompilationDatabase_getAllCompileCommands(self.raw)
        };
        if commands.is_null() {
            return Vec::new();
        }

        let count = unsafe { clang_sys::clang_CompileCommands_getSize(commands) };
        let mut result = Vec::with_capacity(count as usize);

        for i in 0..count {
            let cmd = unsafe { clang_sys::clang_CompileCommands_getCommand(commands, i) };
            result.push(read_command(cmd));
        }

        unsafe { clang_sys::clang_CompileCommands_dispose(commands) };
        result
    }
}

impl Drop for CompilationDatabase {
    fn drop(&mut self) {
        unsafe { clang_sys::clang_CompilationDatabase_dispose(self.raw) };
    }
}

fn read_command(cmd: clang_sys::CXCompileCommand) -> CompileCommand {
    let directory = read_cxstring(unsafe { clang_sys::clang_CompileCommand_getDirectory(cmd) });
    let filename = read_cxstring(unsafe { clang_sys::clang_CompileCommand_getFilename(cmd) });

    let nargs: c_uint = unsafe { clang_sys::clang_CompileCommand_getNumArgs(cmd) };
    let mut args = Vec::with_capacity(nargs as usize);
    for j in 0..nargs {
        let raw = unsafe { clang_sys::clang_CompileCommand_getArg(cmd, j) };
        args.push(read_cxstring(raw));
    }

    CompileCommand {
        directory,
        filename,
        args,
    }
}

fn read_cxstring(s: clang_sys::CXString) -> String {
    unsafe {
        let cstr = clang_sys::clang_getCString(s);
        let owned = if cstr.is_null() {
            String::new()
        } else {
            CStr::from_ptr(cstr).to_string_lossy().into_owned()
        };
        clang_sys::clang_disposeString(s);
        owned
    }
}

/// Splits `commands` into `nproc` near-equal-sized slices, matching spec
/// §4.4's "preallocate `nproc` empty partial graphs ... for each batch of
/// ≤B compile commands (B=16)": here we additionally cap each worker's
/// share into chunks of at most `batch_size`, so `parse::parse_directory`
/// can `submit` one task per chunk rather than one giant task per worker.
pub fn batches(commands: &[CompileCommand], batch_size: usize) -> Vec<&[CompileCommand]> {
    if commands.is_empty() {
        return Vec::new();
    }
    commands.chunks(batch_size.max(1)).collect()
}
