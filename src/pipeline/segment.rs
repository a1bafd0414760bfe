//! Sentence segmentation and the sentence-count cap.
//!
//! Boundaries come from the Unicode sentence-boundary rules (UAX #29), which
//! already keep decimals (`3.5 million`), lowercase continuations (`e.g. the`)
//! and closing quotes together. UAX #29 does break after abbreviations that
//! are followed by a capitalised word (`Dr. Smith`), so a second pass glues
//! those pieces back together.

use crate::content::Sentence;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// Abbreviations after which a full stop does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "sra", "jr", "dra", "st", "mt", "ft", "gen", "gov",
    "sen", "rep", "col", "lt", "sgt", "capt", "cmdr", "adm", "rev", "hon", "pres", "vs", "vol",
    "vols", "fig", "ch", "pp", "approx", "inc", "ltd", "co", "corp", "dept", "univ",
    "av", "ave", "blvd", "jan", "feb", "apr", "jun", "jul", "aug", "sep", "sept", "oct",
    "nov", "dec", "séc", "cf", "al",
];

/// Dotted initialisms such as `U.S.` or `a.C.`.
static RE_INITIALISM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\p{L}\.){2,}$").unwrap());

/// Split sanitised text into trimmed sentences, in source order.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut pending = String::new();

    for piece in text.split_sentence_bounds() {
        pending.push_str(piece);
        let candidate = pending.trim();
        if candidate.is_empty() {
            pending.clear();
            continue;
        }
        if ends_with_abbreviation(candidate) {
            continue;
        }
        sentences.push(candidate.to_string());
        pending.clear();
    }

    let tail = pending.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Whether the last word of `text` is an abbreviation or a single initial.
fn ends_with_abbreviation(text: &str) -> bool {
    let Some(last) = text.split_whitespace().next_back() else {
        return false;
    };
    let last = last.trim_start_matches(|c: char| !c.is_alphanumeric());
    let Some(stem) = last.strip_suffix('.') else {
        return false;
    };
    if stem.is_empty() {
        return false;
    }

    let mut chars = stem.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        // A lone capital letter is an initial ("J. R. R. Tolkien").
        return c.is_uppercase();
    }

    let lower = stem.to_lowercase();
    ABBREVIATIONS.contains(&lower.as_str()) || RE_INITIALISM.is_match(last)
}

/// Keep at most `max` sentences, dropping the tail.
pub fn cap_sentences(mut sentences: Vec<String>, max: usize) -> Vec<String> {
    sentences.truncate(max);
    sentences
}

/// Segment and cap in one step, producing fresh [`Sentence`] records.
pub fn segment(text: &str, max: usize) -> Vec<Sentence> {
    cap_sentences(split_sentences(text), max)
        .into_iter()
        .map(Sentence::new)
        .collect()
}
