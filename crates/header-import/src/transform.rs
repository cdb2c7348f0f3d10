//! Header rewriting
//!
//! Upstream Xen headers use `long` and `unsigned long` for pointer-sized
//! values. Windows is LLP64, so those become `LONG_PTR` / `ULONG_PTR` when
//! the headers are imported. Substitutions are plain text, applied per line
//! and in order: the `unsigned long` forms must go first because ` long` is a
//! suffix of them.

use crate::error::ImportError;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Ordered `(pattern, replacement)` pairs
pub const SUBSTITUTIONS: [(&str, &str); 4] = [
    (" unsigned long", " ULONG_PTR"),
    ("(unsigned long", "(ULONG_PTR"),
    (" long", " LONG_PTR"),
    ("(long", "(LONG_PTR"),
];

/// Apply [`SUBSTITUTIONS`] to one line (without its terminator)
pub fn rewrite_line(line: &str) -> String {
    let mut out = line.to_string();
    for (pattern, replacement) in SUBSTITUTIONS {
        if out.contains(pattern) {
            out = out.replace(pattern, replacement);
        }
    }
    out
}

/// Rewrite a whole header text
///
/// `\r\n` and lone `\r` terminators become `\n`. A missing newline at the end
/// of the input stays missing. Returns the new text and its line count.
pub fn rewrite_text(text: &str) -> (String, usize) {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(normalized.len() + normalized.len() / 8);
    let mut lines = 0;

    for line in normalized.split_inclusive('\n') {
        let (body, terminator) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        out.push_str(&rewrite_line(body));
        out.push_str(terminator);
        lines += 1;
    }

    (out, lines)
}

/// Read `src`, rewrite it, and write the result to `dst`
///
/// `dst` is created or truncated. Its parent directory must exist. Returns
/// the number of lines written.
pub fn rewrite_file(src: &Path, dst: &Path) -> Result<usize, ImportError> {
    let text = fs::read_to_string(src).map_err(|e| ImportError::io(src, e))?;
    let (rewritten, lines) = rewrite_text(&text);

    let file = File::create(dst).map_err(|e| ImportError::io(dst, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(rewritten.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| ImportError::io(dst, e))?;

    debug!("{} -> {} ({} lines)", src.display(), dst.display(), lines);
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_unsigned_long_forms() {
        assert_eq!(
            rewrite_line("    unsigned long mfn;"),
            "    ULONG_PTR mfn;"
        );
        assert_eq!(
            rewrite_line("#define xen_pfn_to_cr3(pfn) ((unsigned long)(pfn) << 12)"),
            "#define xen_pfn_to_cr3(pfn) ((ULONG_PTR)(pfn) << 12)"
        );
        assert!(!rewrite_line("typedef unsigned long xen_ulong_t;").contains("unsigned long"));
    }

    #[test]
    fn test_long_forms() {
        assert_eq!(rewrite_line("    long rc;"), "    LONG_PTR rc;");
        assert_eq!(rewrite_line("#define X ((long)-1)"), "#define X ((LONG_PTR)-1)");
    }

    #[test]
    fn test_no_double_substitution() {
        // ULONG_PTR must not turn into ULONG_PTR with a LONG_PTR inside
        assert_eq!(
            rewrite_line(" unsigned long x; long y;"),
            " ULONG_PTR x; LONG_PTR y;"
        );
    }

    #[test]
    fn test_literal_matching_has_no_word_boundary() {
        assert_eq!(rewrite_line(" longer"), " LONG_PTRer");
        assert_eq!(rewrite_line(" long long x;"), " LONG_PTR LONG_PTR x;");
        // No leading space or paren, no match
        assert_eq!(rewrite_line("long x;"), "long x;");
        assert_eq!(rewrite_line("\tlong x;"), "\tlong x;");
    }

    #[test]
    fn test_untouched_line() {
        let line = "#define __XEN_PUBLIC_XEN_H__";
        assert_eq!(rewrite_line(line), line);
    }

    #[test]
    fn test_rewrite_text_normalizes_line_endings() {
        let (out, lines) = rewrite_text("a\r\n unsigned long b;\rc\n");
        assert_eq!(out, "a\n ULONG_PTR b;\nc\n");
        assert_eq!(lines, 3);
    }

    #[test]
    fn test_rewrite_text_keeps_missing_final_newline() {
        let (out, lines) = rewrite_text("one\n two long");
        assert_eq!(out, "one\n two LONG_PTR");
        assert_eq!(lines, 2);

        let (out, lines) = rewrite_text("");
        assert_eq!(out, "");
        assert_eq!(lines, 0);
    }

    #[test]
    fn test_rewrite_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("memory.h");
        let dst = dir.path().join("out.h");
        fs::write(&src, "struct x {\r\n    unsigned long nr;\r\n    long rc;\r\n};\r\n").unwrap();
        fs::write(&dst, "stale content that is longer than the new file\n".repeat(10)).unwrap();

        let lines = rewrite_file(&src, &dst).unwrap();

        assert_eq!(lines, 4);
        assert_eq!(
            fs::read_to_string(&dst).unwrap(),
            "struct x {\n    ULONG_PTR nr;\n    LONG_PTR rc;\n};\n"
        );
    }

    #[test]
    fn test_rewrite_file_missing_source() {
        let dir = tempdir().unwrap();
        let err = rewrite_file(&dir.path().join("nope.h"), &dir.path().join("out.h")).unwrap_err();
        match err {
            ImportError::Io { path, .. } => assert!(path.ends_with("nope.h")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_rewrite_is_idempotent(line in "[ (a-z_;]{0,40}") {
            let once = rewrite_line(&line);
            prop_assert_eq!(rewrite_line(&once), once);
        }

        #[test]
        fn prop_no_original_tokens_survive(line in "[ (a-z]{0,40}") {
            let out = rewrite_line(&line);
            prop_assert!(!out.contains(" unsigned long"));
            prop_assert!(!out.contains("(unsigned long"));
            prop_assert!(!out.contains(" long"));
            prop_assert!(!out.contains("(long"));
        }

        #[test]
        fn prop_line_count_preserved(lines in prop::collection::vec("[ (a-z]{0,20}", 0..20)) {
            let text: String = lines.iter().map(|l| format!("{}\r\n", l)).collect();
            let (out, count) = rewrite_text(&text);
            prop_assert_eq!(count, lines.len());
            prop_assert_eq!(out.lines().count(), lines.len());
        }
    }
}
