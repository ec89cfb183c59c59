//! The Clang front-end, treated as an external collaborator per spec §1:
//! the rest of the pipeline only ever depends on the small [`AstCursor`]
//! trait and the [`CompileCommand`]/[`CompilationDatabase`] types in
//! [`compdb`], never on `clang`/`clang-sys` directly. [`visitor`] drives
//! any `AstCursor` implementation, so it can be exercised in tests against
//! [`MockCursor`] without a libclang installation.

pub mod clang_backend;
pub mod compdb;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

/// The cursor kinds the visitor acts on (spec §4.2); every other kind
/// collapses to `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorKind {
    CompoundStmt,
    FunctionDecl,
    CxxMethod,
    FunctionTemplate,
    DeclRefExpr,
    MemberRefExpr,
    Other,
}

impl CursorKind {
    pub fn is_function_decl_like(self) -> bool {
        matches!(
            self,
            CursorKind::FunctionDecl | CursorKind::CxxMethod | CursorKind::FunctionTemplate
        )
    }

    pub fn is_ref_expr(self) -> bool {
        matches!(self, CursorKind::DeclRefExpr | CursorKind::MemberRefExpr)
    }
}

/// The expansion location of a cursor: which file, which line/column. A
/// `None` file means Clang could not attribute a file (e.g. a builtin).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub file: Option<String>,
    pub line: u32,
    pub column: u32,
}

/// The minimal surface the visitor needs from a Clang AST cursor. Mirrors
/// the handful of `clang_get*` calls `original_source/callgraph.c`'s
/// `visit()` makes, one method per call.
pub trait AstCursor: Sized {
    fn kind(&self) -> CursorKind;

    /// `clang_getCursorDisplayName`.
    fn display_name(&self) -> String;

    /// Storage class is not `extern` (spec's `GLOBAL := storage != extern`,
    /// preserved verbatim -- see DESIGN.md).
    fn is_global_storage(&self) -> bool;

    fn is_inline(&self) -> bool;

    /// Expansion location of this cursor (`clang_getExpansionLocation`).
    fn location(&self) -> Location;

    /// The declaration this reference expression resolves to
    /// (`clang_getCursorReferenced`), for `DeclRefExpr`/`MemberRefExpr`.
    fn referenced(&self) -> Option<Self>;

    /// `clang_visitChildren`, recursing unconditionally (spec §4.2: every
    /// row of the cursor-kind table recurses).
    fn visit_children(&self, f: &mut dyn FnMut(&Self));
}
