//! The `Config` options bag plus its two feeders: a `clap` 2.x CLI parser
//! and a hand-rolled recursive-descent reader for the `name = value` /
//! `name = [ v1 v2 ... ]` config-file grammar (spec §6/§4.9).
//!
//! Grounded on the reference crate's `DbOptions` (`database.rs`) for the
//! "plain struct of `pub` fields, populated once, read-only after" shape,
//! and on `original_source/util.h`'s `struct config`/`enum option` for the
//! option set and defaults (`init_config` calls `set_option(name,
//! "default")` for every option before applying `--config`, then
//! `parse_config` reads the file, then CLI flags are applied last and win
//! ties -- this module mirrors that precedence in [`Config::load`]).

use crate::error::CgError;
use crate::filter::{FilterConfig, LevelOfDetail};
use clap::{App, Arg};

pub const PROG_NAME: &str = "lxgraph";

/// Read-only-after-construction option bag (spec §5: "the global config is
/// read-only after `init_config`").
#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: Option<String>,
    /// `None` means stdout (`-o -` or the flag omitted after a config file
    /// that set it to empty).
    pub output_path: Option<String>,
    pub build_dir: String,
    /// 0 silent .. 4 sync-debug.
    pub log_level: u8,
    /// 0 means "use `std::thread::available_parallelism`".
    pub nthreads: usize,
    pub filter: FilterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            config_path: None,
            output_path: Some("graph.dot".to_string()),
            build_dir: ".".to_string(),
            log_level: 3,
            nthreads: 0,
            filter: FilterConfig::default(),
        }
    }
}

impl Config {
    /// Resolved worker count: `nthreads` if set, else the detected
    /// parallelism, clamped into the CLI's documented `1..=32` range.
    pub fn resolved_threads(&self) -> usize {
        let n = if self.nthreads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.nthreads
        };
        n.clamp(1, 32)
    }

    /// Builds a `Config` from `argv`, following the reference flow: find
    /// `--config`/`-C` up front, seed every field at its built-in default,
    /// apply the resolved config file (if any), then let the rest of the
    /// CLI flags override whatever the file set.
    pub fn load(argv: &[String]) -> Result<Config, CgError> {
        let matches = build_cli().get_matches_from_safe(argv).map_err(|err| {
            CgError::recoverable(format!("invalid command line: {err}"))
        })?;

        let mut config = Config::default();
        config.build_dir = matches
            .value_of("path")
            .unwrap_or(&config.build_dir)
            .to_string();

        let explicit_config_path = matches.value_of("config").map(str::to_string);
        if let Some(path) = resolve_config_path(explicit_config_path.as_deref(), &config.build_dir) {
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    apply_config_text(&mut config, &path, &text)?;
                    config.config_path = Some(path);
                }
                Err(err) => {
                    log::debug!("cannot read config file '{path}': {err}");
                }
            }
        } else {
            log::debug!("cannot find config file anywhere");
        }

        apply_cli_matches(&mut config, &matches)?;
        Ok(config)
    }
}

/// Path resolution order (spec §6): `--config`, then
/// `<build_dir>/lxgraph.conf`, then `./lxgraph.conf`. Returns the first
/// candidate that exists; `None` if none do (the caller falls back to
/// defaults, matching the "config file not found" recoverable disposition
/// of spec §7).
fn resolve_config_path(explicit: Option<&str>, build_dir: &str) -> Option<String> {
    let candidates: Vec<String> = match explicit {
        Some(path) => vec![path.to_string()],
        None => vec![
            format!("{build_dir}/{PROG_NAME}.conf"),
            format!("{PROG_NAME}.conf"),
        ],
    };
    candidates.into_iter().find(|path| std::path::Path::new(path).is_file())
}

fn build_cli() -> App<'static, 'static> {
    App::new(PROG_NAME)
        .about("Parallel static call-graph extractor for C/C++ codebases")
        .arg(Arg::with_name("log-level").long("log-level").short("L").takes_value(true))
        .arg(Arg::with_name("config").long("config").short("C").takes_value(true))
        .arg(Arg::with_name("out").long("out").short("o").takes_value(true))
        .arg(Arg::with_name("path").long("path").short("p").takes_value(true))
        .arg(Arg::with_name("threads").long("threads").short("T").takes_value(true))
        .arg(Arg::with_name("inline").long("inline").takes_value(true).min_values(0).max_values(1))
        .arg(Arg::with_name("no-inline").long("no-inline").takes_value(false))
        .arg(Arg::with_name("static").long("static").takes_value(true).min_values(0).max_values(1))
        .arg(Arg::with_name("no-static").long("no-static").takes_value(false))
        .arg(Arg::with_name("lod").long("lod").takes_value(true))
        .arg(
            Arg::with_name("exclude-files")
                .long("exclude-files")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("exclude-functions")
                .long("exclude-functions")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("root-files")
                .long("root-files")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("root-functions")
                .long("root-functions")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("reverse-root-files")
                .long("reverse-root-files")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("reverse-root-functions")
                .long("reverse-root-functions")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
}

fn apply_cli_matches(config: &mut Config, matches: &clap::ArgMatches) -> Result<(), CgError> {
    if let Some(v) = matches.value_of("log-level") {
        config.log_level = if v.eq_ignore_ascii_case("default") { 3 } else { parse_int_in_range(v, 0, 4)? as u8 };
    }
    if let Some(v) = matches.value_of("out") {
        config.output_path = if v.eq_ignore_ascii_case("default") {
            Some("graph.dot".to_string())
        } else if v.is_empty() || v == "-" {
            None
        } else {
            Some(v.to_string())
        };
    }
    if let Some(v) = matches.value_of("threads") {
        config.nthreads = if v.eq_ignore_ascii_case("default") { 0 } else { parse_int_in_range(v, 1, 32)? };
    }
    if let Some(v) = matches.value_of("lod") {
        config.filter.level_of_detail = if v.eq_ignore_ascii_case("default") {
            LevelOfDetail::Function
        } else {
            parse_lod(v)?
        };
    }
    if matches.is_present("no-inline") {
        config.filter.keep_inline = false;
    } else if let Some(v) = matches.value_of("inline") {
        config.filter.keep_inline = if v.eq_ignore_ascii_case("default") { true } else { parse_bool(v)? };
    } else if matches.is_present("inline") {
        config.filter.keep_inline = true;
    }
    if matches.is_present("no-static") {
        config.filter.keep_static = false;
    } else if let Some(v) = matches.value_of("static") {
        config.filter.keep_static = if v.eq_ignore_ascii_case("default") { true } else { parse_bool(v)? };
    } else if matches.is_present("static") {
        config.filter.keep_static = true;
    }

    apply_array_flag(matches, "exclude-files", &mut config.filter.exclude_files);
    apply_array_flag(matches, "exclude-functions", &mut config.filter.exclude_functions);
    apply_array_flag(matches, "root-files", &mut config.filter.root_files);
    apply_array_flag(matches, "root-functions", &mut config.filter.root_functions);
    apply_array_flag(matches, "reverse-root-files", &mut config.filter.reverse_root_files);
    apply_array_flag(matches, "reverse-root-functions", &mut config.filter.reverse_root_functions);
    Ok(())
}

/// A bare empty value clears the array (spec §6: "Setting to the empty
/// value clears the array"); anything else appends, matching `set_option`'s
/// per-occurrence append behavior for array options.
fn apply_array_flag(matches: &clap::ArgMatches, name: &str, dest: &mut Vec<String>) {
    if let Some(values) = matches.values_of(name) {
        for value in values {
            if value.is_empty() {
                dest.clear();
            } else {
                dest.push(value.to_string());
            }
        }
    }
}

fn parse_int_in_range(value: &str, min: i64, max: i64) -> Result<usize, CgError> {
    if value.eq_ignore_ascii_case("default") {
        return Err(CgError::recoverable("'default' is only valid in a config file context"));
    }
    let v: i64 = value
        .parse()
        .map_err(|_| CgError::recoverable(format!("not an integer: '{value}'")))?;
    Ok(v.clamp(min, max) as usize)
}

fn parse_lod(value: &str) -> Result<LevelOfDetail, CgError> {
    match value.to_ascii_lowercase().as_str() {
        "function" => Ok(LevelOfDetail::Function),
        "file" => Ok(LevelOfDetail::File),
        _ => Err(CgError::recoverable(format!("unknown --lod value: '{value}'"))),
    }
}

/// `yes|y|true|1` / `no|n|false|0`, case-insensitive (spec §6). Shared
/// between CLI value parsing and config-file value parsing so the two stay
/// consistent by construction.
pub fn parse_bool(value: &str) -> Result<bool, CgError> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Ok(true),
        "no" | "n" | "false" | "0" => Ok(false),
        other => Err(CgError::recoverable(format!("not a boolean: '{other}'"))),
    }
}

/// One parsed line of config-file content: a scalar `name = value` or an
/// array `name = [ v1 v2 ... ]`.
enum ConfigValue {
    Scalar(String),
    Array(Vec<String>),
}

/// Applies the `name = value` / `name = [ ... ]` grammar against `text`,
/// feeding each parsed `(name, value)` pair to [`set_option`]. Mirrors
/// `parse_config`'s line loop in `original_source/util.c`, but a malformed
/// line is skipped (logged) and parsing resumes at the next line, rather
/// than the original's longjmp-to-next-token recovery -- both converge on
/// "best-effort recovery" per spec §7's config-file-syntax-error policy.
fn apply_config_text(config: &mut Config, path: &str, text: &str) -> Result<(), CgError> {
    for (line_no, raw_line) in text.lines().enumerate() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        match parse_config_line(line) {
            Ok((name, value)) => {
                if let Err(err) = set_option(config, &name, value) {
                    log::warn!("{}", crate::diag::config_syntax_error(path, text, line_no + 1, &err.to_string()));
                }
            }
            Err(err) => {
                log::warn!("{}", crate::diag::config_syntax_error(path, text, line_no + 1, &err.to_string()));
            }
        }
    }
    Ok(())
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Parses one `name = value` or `name = [ v1 v2 ... ]` line.
fn parse_config_line(line: &str) -> Result<(String, ConfigValue), CgError> {
    let (name, rest) = line
        .split_once('=')
        .ok_or_else(|| CgError::recoverable(format!("expected '=' in '{line}'")))?;
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(CgError::recoverable("empty option name".to_string()));
    }
    let rest = rest.trim();

    if let Some(inner) = rest.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let mut values = Vec::new();
        for token in inner.split_whitespace() {
            values.push(unquote(token)?);
        }
        Ok((name, ConfigValue::Array(values)))
    } else {
        Ok((name, ConfigValue::Scalar(unquote(rest)?)))
    }
}

/// Strips surrounding double quotes and expands C-style escapes within
/// them (`\n \t \xHH \ooo \a \b \e \f \r \v`); an unquoted token passes
/// through unescaped. Unicode escapes are not supported (spec §6).
fn unquote(token: &str) -> Result<String, CgError> {
    let Some(inner) = token.strip_prefix('"').and_then(|s| s.strip_suffix('"')) else {
        return Ok(token.to_string());
    };
    unescape(inner)
}

fn unescape(input: &str) -> Result<String, CgError> {
    let bytes = input.as_bytes();
    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            let start = i;
            while i < bytes.len() && bytes[i] != b'\\' {
                i += 1;
            }
            out.push_str(&input[start..i]);
            continue;
        }
        i += 1;
        let Some(&escape) = bytes.get(i) else {
            return Err(CgError::recoverable("dangling '\\' at end of value".to_string()));
        };
        match escape {
            b'n' => { out.push('\n'); i += 1; }
            b't' => { out.push('\t'); i += 1; }
            b'a' => { out.push('\u{07}'); i += 1; }
            b'b' => { out.push('\u{08}'); i += 1; }
            b'e' => { out.push('\u{1b}'); i += 1; }
            b'f' => { out.push('\u{0c}'); i += 1; }
            b'r' => { out.push('\r'); i += 1; }
            b'v' => { out.push('\u{0b}'); i += 1; }
            b'\\' => { out.push('\\'); i += 1; }
            b'"' => { out.push('"'); i += 1; }
            b'x' => {
                i += 1;
                let start = i;
                while i < bytes.len() && i < start + 2 && bytes[i].is_ascii_hexdigit() {
                    i += 1;
                }
                let digits = &input[start..i];
                let code = u8::from_str_radix(digits, 16)
                    .map_err(|_| CgError::recoverable(format!("bad \\x escape: '{digits}'")))?;
                out.push(code as char);
            }
            b'0'..=b'7' => {
                let start = i;
                while i < bytes.len() && i < start + 3 && (b'0'..=b'7').contains(&bytes[i]) {
                    i += 1;
                }
                let digits = &input[start..i];
                let code = u16::from_str_radix(digits, 8)
                    .map_err(|_| CgError::recoverable(format!("bad octal escape: '{digits}'")))?;
                out.push((code & 0xff) as u8 as char);
            }
            other => {
                return Err(CgError::recoverable(format!("unknown escape '\\{}'", other as char)));
            }
        }
    }
    Ok(out)
}

/// The config-file equivalent of `original_source/util.c`'s `set_option`:
/// dispatches by name into the matching `Config`/`FilterConfig` field, with
/// `"default"` resetting that field to its built-in default.
fn set_option(config: &mut Config, name: &str, value: ConfigValue) -> Result<(), CgError> {
    let scalar = |value: ConfigValue| -> Result<String, CgError> {
        match value {
            ConfigValue::Scalar(s) => Ok(s),
            ConfigValue::Array(_) => Err(CgError::recoverable(format!("'{name}' does not take an array"))),
        }
    };
    let array = |value: ConfigValue| -> Result<Vec<String>, CgError> {
        match value {
            ConfigValue::Array(v) => Ok(v),
            ConfigValue::Scalar(s) => Ok(vec![s]),
        }
    };

    match name {
        "log-level" => {
            let v = scalar(value)?;
            config.log_level = if v.eq_ignore_ascii_case("default") {
                3
            } else {
                parse_int_in_range(&v, 0, 4).unwrap_or(3) as u8
            };
        }
        "config" => {
            let v = scalar(value)?;
            config.config_path = if v.eq_ignore_ascii_case("default") { None } else { Some(v) };
        }
        "inline" => {
            let v = scalar(value)?;
            config.filter.keep_inline = if v.eq_ignore_ascii_case("default") { true } else { parse_bool(&v)? };
        }
        "static" => {
            let v = scalar(value)?;
            config.filter.keep_static = if v.eq_ignore_ascii_case("default") { true } else { parse_bool(&v)? };
        }
        "path" => {
            let v = scalar(value)?;
            config.build_dir = if v.eq_ignore_ascii_case("default") { ".".to_string() } else { v };
        }
        "out" => {
            let v = scalar(value)?;
            config.output_path = if v.eq_ignore_ascii_case("default") {
                Some("graph.dot".to_string())
            } else if v.is_empty() || v == "-" {
                None
            } else {
                Some(v)
            };
        }
        "threads" => {
            let v = scalar(value)?;
            config.nthreads = if v.eq_ignore_ascii_case("default") { 0 } else { parse_int_in_range(&v, 1, 32)? };
        }
        "lod" => {
            let v = scalar(value)?;
            config.filter.level_of_detail = if v.eq_ignore_ascii_case("default") {
                LevelOfDetail::Function
            } else {
                parse_lod(&v)?
            };
        }
        "exclude-files" => set_array(&mut config.filter.exclude_files, array(value)?),
        "exclude-functions" => set_array(&mut config.filter.exclude_functions, array(value)?),
        "root-files" => set_array(&mut config.filter.root_files, array(value)?),
        "root-functions" => set_array(&mut config.filter.root_functions, array(value)?),
        "reverse-root-files" => set_array(&mut config.filter.reverse_root_files, array(value)?),
        "reverse-root-functions" => set_array(&mut config.filter.reverse_root_functions, array(value)?),
        other => return Err(CgError::recoverable(format!("unknown option '{other}'"))),
    }
    Ok(())
}

fn set_array(dest: &mut Vec<String>, values: Vec<String>) {
    if values.len() == 1 && values[0].is_empty() {
        dest.clear();
    } else {
        dest.extend(values.into_iter().filter(|v| !v.is_empty()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_the_documented_spellings() {
        assert_eq!(parse_bool("yes").unwrap(), true);
        assert_eq!(parse_bool("Y").unwrap(), true);
        assert_eq!(parse_bool("TRUE").unwrap(), true);
        assert_eq!(parse_bool("1").unwrap(), true);
        assert_eq!(parse_bool("no").unwrap(), false);
        assert_eq!(parse_bool("0").unwrap(), false);
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn unescape_handles_named_and_hex_and_octal_escapes() {
        assert_eq!(unescape("a\\nb").unwrap(), "a\nb");
        assert_eq!(unescape("\\x41").unwrap(), "A");
        assert_eq!(unescape("\\101").unwrap(), "A");
        assert!(unescape("\\q").is_err());
    }

    #[test]
    fn parse_config_line_splits_scalar_and_array_forms() {
        let (name, value) = parse_config_line("log-level = 2").unwrap();
        assert_eq!(name, "log-level");
        assert!(matches!(value, ConfigValue::Scalar(ref s) if s == "2"));

        let (name, value) = parse_config_line("exclude-files = [ a.c b.c ]").unwrap();
        assert_eq!(name, "exclude-files");
        match value {
            ConfigValue::Array(v) => assert_eq!(v, vec!["a.c".to_string(), "b.c".to_string()]),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn apply_config_text_sets_fields_and_skips_malformed_lines() {
        let mut config = Config::default();
        apply_config_text(
            &mut config,
            "test.conf",
            "# a comment\nlog-level = 4\nbad line with no equals\nstatic = no\n",
        )
        .unwrap();
        assert_eq!(config.log_level, 4);
        assert_eq!(config.filter.keep_static, false);
    }

    #[test]
    fn apply_config_text_appends_to_arrays_across_lines() {
        let mut config = Config::default();
        apply_config_text(
            &mut config,
            "test.conf",
            "exclude-files = [ a.c ]\nexclude-files = [ b.c ]\n",
        )
        .unwrap();
        assert_eq!(config.filter.exclude_files, vec!["a.c".to_string(), "b.c".to_string()]);
    }

    #[test]
    fn empty_array_value_clears_previously_set_entries() {
        let mut config = Config::default();
        config.filter.exclude_files = vec!["a.c".to_string()];
        apply_config_text(&mut config, "test.conf", "exclude-files = []\n").unwrap();
        assert!(config.filter.exclude_files.is_empty());
    }

    #[test]
    fn resolved_threads_falls_back_to_available_parallelism() {
        let config = Config::default();
        assert!(config.resolved_threads() >= 1);
    }

    #[test]
    fn load_applies_cli_flags_on_top_of_defaults() {
        let argv: Vec<String> = vec![
            PROG_NAME.to_string(),
            "--log-level=0".to_string(),
            "--no-inline".to_string(),
            "--out=-".to_string(),
        ]
        .into_iter()
        .collect();
        let config = Config::load(&argv).unwrap();
        assert_eq!(config.log_level, 0);
        assert_eq!(config.filter.keep_inline, false);
        assert_eq!(config.output_path, None);
    }
}
