//! Transliteration of non-Latin scripts for search matching.

use deunicode::deunicode;

/// Transliterate a string to ASCII/Latin.
/// Uses deunicode for broad script coverage.
pub fn transliterate(s: &str) -> String {
    let result = deunicode(s);
    // Clean up: collapse multiple spaces, trim
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
