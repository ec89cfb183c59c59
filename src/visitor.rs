//! The stateful AST walk that drives one translation unit into a
//! [`PartialGraph`], per the cursor-kind table of spec §4.2. Generic over
//! [`AstCursor`] so it runs unchanged against the real Clang backend or
//! against [`crate::frontend::mock::MockCursor`] in tests.

use crate::frontend::{AstCursor, CursorKind};
use crate::graph::PartialGraph;
use crate::literal::Flags;

/// The synthetic caller literal used for a call expression found outside
/// any function body (spec §4.2, §8 "boundary behaviors").
pub const STATIC_EXPR: &str = "<static expr>";

/// Visits `root` (the translation unit's root cursor) into `graph`.
/// `tu_file` seeds `current_file` for any call site encountered before the
/// first function declaration (mirrors `original_source/callgraph.c`'s
/// `set_current(cg, NULL, clang_getCString(tu))` on function exit, applied
/// here up front since the root cursor itself has no useful location).
pub fn visit_translation_unit<C: AstCursor>(root: &C, tu_file: &str, graph: &mut PartialGraph) {
    graph.current_file = Some(graph.intern_file(tu_file));
    visit(root, graph);
}

fn visit<C: AstCursor>(cursor: &C, graph: &mut PartialGraph) {
    match cursor.kind() {
        CursorKind::CompoundStmt => {
            if let Some(current_fn) = graph.current_fn {
                current_fn.add_flags(Flags::DEFINED);
                current_fn.set_location(graph.current_line, graph.current_col);
                if current_fn.file().is_none() {
                    current_fn.set_file(graph.current_file);
                }
            }
            cursor.visit_children(&mut |child| visit(child, graph));
        }

        kind if kind.is_function_decl_like() => {
            assert!(
                graph.current_fn.is_none(),
                "nested function encountered: languages handled here do not nest functions"
            );

            let name = cursor.display_name();
            let location = cursor.location();
            let file = location.file.clone().unwrap_or_default();

            let fn_handle = graph.table.put_with_flags(&name, Flags::FUNCTION);
            let file_handle = graph.intern_file(&file);

            let mut def_flags = Flags::FUNCTION;
            if cursor.is_global_storage() {
                def_flags |= Flags::GLOBAL;
            }
            if cursor.is_inline() {
                def_flags |= Flags::INLINE;
            }
            fn_handle.add_flags(def_flags);

            graph.current_fn = Some(fn_handle);
            graph.current_file = Some(file_handle);
            graph.current_line = location.line;
            graph.current_col = location.column;
            graph.defs.push(fn_handle);

            cursor.visit_children(&mut |child| visit(child, graph));

            graph.current_fn = None;
        }

        kind if kind.is_ref_expr() => {
            if let Some(referenced) = cursor.referenced() {
                if referenced.kind().is_function_decl_like() {
                    let callee_name = referenced.display_name();
                    let callee = graph.table.put_with_flags(&callee_name, Flags::FUNCTION);

                    let caller = graph
                        .current_fn
                        .unwrap_or_else(|| graph.table.put(STATIC_EXPR));

                    let location = cursor.location();
                    graph.push_edge(caller, callee, location.line, location.column);
                }
            }
            cursor.visit_children(&mut |child| visit(child, graph));
        }

        CursorKind::Other => {
            cursor.visit_children(&mut |child| visit(child, graph));
        }
    }
}
