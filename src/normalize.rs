//! Text canonicalisation for answer and title comparison.
//!
//! Film titles get typed with wildly inconsistent punctuation, casing and
//! accents ("Léon, *le Professionnel*!" vs "leon le professionnel"). All
//! free-text matching in the contest goes through [`normalize`] so those
//! variants compare equal.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Bracket/quote characters stripped from the very start of the input.
const LEADING_WRAPPERS: &[char] = &['<', '[', '(', '"', '\''];
/// Their counterparts, stripped from the very end.
const TRAILING_WRAPPERS: &[char] = &['>', ']', ')', '"', '\''];

/// Canonicalise a string for robust comparison.
///
/// Steps, in order: trim; strip wrapper characters at the extremities;
/// NFD-decompose and drop combining marks (diacritic-insensitive); replace
/// anything that is not a letter, digit or whitespace with a space; collapse
/// whitespace; trim; lowercase. Total function, idempotent.
pub fn normalize(text: &str) -> String {
    let s = text
        .trim()
        .trim_start_matches(LEADING_WRAPPERS)
        .trim_end_matches(TRAILING_WRAPPERS);

    let mut cleaned = String::with_capacity(s.len());
    for ch in s.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        if keeps(ch) {
            cleaned.push(ch);
        } else {
            cleaned.push(' ');
        }
    }

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Characters that survive normalisation: ASCII alphanumerics, whitespace,
/// and Latin-1 letters that have no decomposition (ø, æ, ß, ...).
fn keeps(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || ch.is_whitespace()
        || matches!(ch, '\u{00C0}'..='\u{00D6}' | '\u{00D8}'..='\u{00F6}' | '\u{00F8}'..='\u{00FF}')
}
