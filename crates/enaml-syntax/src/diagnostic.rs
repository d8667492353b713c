//! Source excerpts for error reports.

use std::fmt::Write;

/// Formats a location header followed by the lines bracketing `line`,
/// with the offending line marked:
///
/// ```text
/// File "main.enaml", line 42, in Main()
///        41 Window:
/// ---->  42     title = 1 +
///        43 Field:
/// ```
///
/// Lines outside `source` are skipped; an empty `source` yields only the
/// header.
pub fn format_source_error(filename: &str, source: &str, line: usize, block: &str) -> String {
    let mut text = format!("File \"{filename}\", line {line}, in {block}()");
    let start = line.saturating_sub(1).max(1);
    let end = line + 1;
    let width = end.to_string().len();
    for (idx, src_line) in source.lines().enumerate().map(|(i, l)| (i + 1, l)) {
        if idx < start {
            continue;
        }
        if idx > end {
            break;
        }
        let marker = if idx == line { "---->" } else { "     " };
        let _ = write!(text, "\n{marker} {idx:>width$} {}", src_line.trim_end());
    }
    text
}
