//! Source-text sanitising: turn an encyclopedia extract into narration text.
//!
//! Plain-text extracts still carry section headings (`== History ==`), blank
//! separator lines and inline parentheticals such as birth dates,
//! pronunciations and citations. None of that should be read aloud.
//!
//! ## Rule Order
//!
//! Lines are filtered before parentheses are removed so a heading that
//! contains parentheses is dropped whole; whitespace is collapsed last
//! because parenthesis removal is what leaves the double spaces behind.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all sanitising rules to raw source text.
///
/// Total and side-effect free: the same input always yields the same output,
/// and empty input yields an empty string.
///
/// Rules (applied in order):
/// 1. Drop blank lines and markdown section lines (`=` prefix), join with spaces
/// 2. Remove balanced parenthetical spans, nesting included, and the gap
///    they leave before punctuation
/// 3. Collapse runs of spaces and trim the ends
pub fn sanitize(original: &str) -> String {
    let s = remove_blank_lines_and_markdown(original);
    let s = remove_parentheticals(&s);
    collapse_whitespace(&s)
}

// ── Rule 1: Blank lines and section markers ─────────────────────────────────

pub fn remove_blank_lines_and_markdown(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('=')
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Rule 2: Parenthetical spans ─────────────────────────────────────────────

/// Remove every balanced `( … )` span, including nested ones.
///
/// An opening parenthesis with no matching close is kept together with the
/// rest of the text; a stray closing parenthesis is kept as-is. When a
/// removed span is followed by punctuation, the spaces before it go too.
pub fn remove_parentheticals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('(') {
        match matching_close(&rest[open..]) {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
                if rest.starts_with(['.', ',', ';', ':', '!', '?']) {
                    out.truncate(out.trim_end_matches([' ', '\t']).len());
                }
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Byte offset of the `)` that balances the `(` at the start of `s`.
fn matching_close(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ── Rule 3: Whitespace ──────────────────────────────────────────────────────

static RE_MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

pub fn collapse_whitespace(text: &str) -> String {
    RE_MULTI_SPACE.replace_all(text, " ").trim().to_string()
}
