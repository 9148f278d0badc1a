use crate::translit;

/// How search text and filter text are folded before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchMode {
    pub transliterate: bool,
}

impl SearchMode {
    /// Lowercase, and transliterate to ASCII when enabled
    /// (e.g., "Иван" -> "ivan").
    pub fn normalize(&self, s: &str) -> String {
        if self.transliterate {
            translit::transliterate(s).to_lowercase()
        } else {
            s.to_lowercase()
        }
    }

    /// Normalized filter, or `None` when the query is absent or empty.
    pub fn normalize_query(&self, query: Option<&str>) -> Option<String> {
        match query {
            Some(text) if !text.is_empty() => Some(self.normalize(text)),
            _ => None,
        }
    }
}
