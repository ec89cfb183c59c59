//! Rendering of recoverable diagnostics as annotated source snippets,
//! using `annotate-snippets` the way the reference crate's own `diag`
//! module renders its `Notation`/`DiagnosticClass` values (referenced in
//! `database.rs`, not itself retrieved) -- instead of the bare
//! `eprintln!` that `original_source/util.c`'s `warn`/`debug` use for the
//! same two cases (unparseable translation unit, config-file syntax
//! error).

use annotate_snippets::display_list::{DisplayList, FormatOptions};
use annotate_snippets::snippet::{Annotation, AnnotationType, Slice, Snippet, SourceAnnotation};

/// Renders a config-file syntax error with the offending line underlined.
///
/// `line_no` is 1-based, matching the line numbers `config::apply_config_text`
/// already reports in its own warn messages.
pub fn config_syntax_error(path: &str, source: &str, line_no: usize, message: &str) -> String {
    let line = source.lines().nth(line_no.saturating_sub(1)).unwrap_or("");
    let snippet = Snippet {
        title: Some(Annotation {
            label: Some(message),
            id: None,
            annotation_type: AnnotationType::Error,
        }),
        footer: vec![],
        slices: vec![Slice {
            source: line,
            line_start: line_no,
            origin: Some(path),
            fold: false,
            annotations: vec![SourceAnnotation {
                label: "",
                annotation_type: AnnotationType::Error,
                range: (0, line.len()),
            }],
        }],
        opt: FormatOptions {
            color: true,
            ..Default::default()
        },
    };
    DisplayList::from(snippet).to_string()
}

/// Renders an unparseable-translation-unit warning. There is no config
/// source line to underline here, only the filename Clang rejected, so
/// this is a title-only snippet with no slice -- `annotate-snippets`
/// still gives consistent formatting with [`config_syntax_error`].
pub fn unparseable_translation_unit(filename: &str, message: &str) -> String {
    let snippet = Snippet {
        title: Some(Annotation {
            label: Some(message),
            id: None,
            annotation_type: AnnotationType::Warning,
        }),
        footer: vec![],
        slices: vec![Slice {
            source: "",
            line_start: 0,
            origin: Some(filename),
            fold: false,
            annotations: vec![],
        }],
        opt: FormatOptions {
            color: true,
            ..Default::default()
        },
    };
    DisplayList::from(snippet).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_syntax_error_includes_the_message_and_offending_line() {
        let rendered = config_syntax_error("lxgraph.conf", "a = 1\nbad line\nc = 3\n", 2, "expected '='");
        assert!(rendered.contains("expected '='"));
        assert!(rendered.contains("bad line"));
    }

    #[test]
    fn unparseable_translation_unit_includes_the_filename() {
        let rendered = unparseable_translation_unit("bad.c", "cannot parse file 'bad.c'");
        assert!(rendered.contains("bad.c"));
    }
}
