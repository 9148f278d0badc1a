//! Normalized contact model over a raw directory record.
//!
//! Fields are resolved on first read and memoized for the lifetime of the
//! contact. The raw record is never touched after construction, so a
//! memoized value never goes stale.

use std::cell::OnceCell;
use std::cmp::Ordering;

use clap::ValueEnum;
use serde::Deserialize;

use crate::raw::{FieldKey, RawRecord};
use crate::search::SearchMode;

#[derive(Debug)]
pub struct Contact {
    raw: RawRecord,
    mode: SearchMode,
    fields: [OnceCell<String>; FieldKey::COUNT],
    full_name: OnceCell<String>,
    search_text: OnceCell<String>,
}

impl Contact {
    #[cfg(test)]
    pub fn new(raw: RawRecord) -> Self {
        Self::with_search_mode(raw, SearchMode::default())
    }

    pub fn with_search_mode(raw: RawRecord, mode: SearchMode) -> Self {
        Self {
            raw,
            mode,
            fields: Default::default(),
            full_name: OnceCell::new(),
            search_text: OnceCell::new(),
        }
    }

    pub fn first_name(&self) -> &str {
        self.field(FieldKey::First)
    }

    pub fn middle_name(&self) -> &str {
        self.field(FieldKey::Middle)
    }

    pub fn last_name(&self) -> &str {
        self.field(FieldKey::Last)
    }

    pub fn email(&self) -> &str {
        self.field(FieldKey::Email)
    }

    pub fn phone(&self) -> &str {
        self.field(FieldKey::Phone)
    }

    pub fn chat(&self) -> &str {
        self.field(FieldKey::Chat)
    }

    pub fn id(&self) -> &str {
        self.field(FieldKey::Uid)
    }

    pub fn field(&self, key: FieldKey) -> &str {
        self.fields[key.index()].get_or_init(|| self.raw.resolve(key))
    }

    /// First, middle and last name separated by single spaces.
    pub fn full_name(&self) -> &str {
        self.full_name.get_or_init(|| {
            join_non_empty(&[self.first_name(), self.middle_name(), self.last_name()])
        })
    }

    /// Lowercased full name, email and chat handle.
    pub fn search_text(&self) -> &str {
        self.search_text.get_or_init(|| {
            let text = join_non_empty(&[self.full_name(), self.email(), self.chat()]);
            self.mode.normalize(&text)
        })
    }

    pub fn matches(&self, filter: &str) -> bool {
        self.search_text().contains(filter)
    }
}

fn join_non_empty(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts.iter().filter(|part| !part.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(part);
    }
    out
}

/// Ordering applied to the directory view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "first_name")]
    #[value(alias = "first-name")]
    First,
    #[serde(alias = "last_name")]
    #[value(alias = "last-name")]
    Last,
}

impl SortOrder {
    pub fn title(self) -> &'static str {
        match self {
            SortOrder::First => "first name",
            SortOrder::Last => "last name",
        }
    }

    /// Case-sensitive comparison on the name field this order sorts by.
    ///
    /// Strings compare by code point, which differs from UTF-16 code unit
    /// order only between supplementary-plane characters and U+E000..U+FFFF.
    pub fn compare(self, a: &Contact, b: &Contact) -> Ordering {
        match self {
            SortOrder::First => a.first_name().cmp(b.first_name()),
            SortOrder::Last => a.last_name().cmp(b.last_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawValue;

    fn person(first: &str, middle: &str, last: &str) -> Contact {
        Contact::new(
            RawRecord::new()
                .with("First", RawValue::text(first))
                .with("Middle", RawValue::text(middle))
                .with("Last", RawValue::text(last)),
        )
    }

    #[test]
    fn test_full_name_omits_empty_parts() {
        assert_eq!(person("Ann", "", "Lee").full_name(), "Ann Lee");
        assert_eq!(person("", "", "Lee").full_name(), "Lee");
        assert_eq!(person("Ann", "", "").full_name(), "Ann");
        assert_eq!(person("", "Q", "").full_name(), "Q");
        assert_eq!(person("Ann", "Q", "Lee").full_name(), "Ann Q Lee");
        assert_eq!(person("", "", "").full_name(), "");
    }

    #[test]
    fn test_missing_fields_resolve_empty() {
        let contact = Contact::new(RawRecord::new());
        assert_eq!(contact.first_name(), "");
        assert_eq!(contact.email(), "");
        assert_eq!(contact.phone(), "");
        assert_eq!(contact.chat(), "");
        assert_eq!(contact.id(), "");
        assert_eq!(contact.full_name(), "");
        assert_eq!(contact.search_text(), "");
    }

    #[test]
    fn test_search_text_lowercase_and_joined() {
        let contact = Contact::new(
            RawRecord::new()
                .with("First", RawValue::text("Ann"))
                .with("Last", RawValue::text("Lee"))
                .with("Email", RawValue::Sequence(vec![RawValue::text("A@X.com")]))
                .with("AIMInstant", RawValue::text("AnnL")),
        );
        assert_eq!(contact.search_text(), "ann lee a@x.com annl");
        assert!(contact.search_text().contains("ann lee a@x.com"));
    }

    #[test]
    fn test_search_text_skips_empty_email() {
        let contact = Contact::new(
            RawRecord::new()
                .with("Last", RawValue::text("Ng"))
                .with("AIMInstant", RawValue::text("bob")),
        );
        assert_eq!(contact.search_text(), "ng bob");
    }

    #[test]
    fn test_search_text_transliterated() {
        let contact = Contact::with_search_mode(
            RawRecord::new().with("First", RawValue::text("Иван")),
            SearchMode { transliterate: true },
        );
        assert!(contact.matches("ivan"));
    }

    #[test]
    fn test_fields_are_memoized() {
        let contact = person("Ann", "", "Lee");
        let first = contact.full_name() as *const str;
        let second = contact.full_name() as *const str;
        assert_eq!(first, second);
        assert_eq!(contact.first_name() as *const str, contact.first_name() as *const str);
    }

    #[test]
    fn test_sort_order_compare_case_sensitive() {
        let upper = person("Zed", "", "Adams");
        let lower = person("adam", "", "zane");
        assert_eq!(SortOrder::First.compare(&upper, &lower), Ordering::Less);
        assert_eq!(SortOrder::Last.compare(&upper, &lower), Ordering::Less);
        assert_eq!(SortOrder::Last.compare(&lower, &upper), Ordering::Greater);
    }

    #[test]
    fn test_sort_order_compare_by_code_point() {
        let fullwidth = person("\u{FF21}", "", "");
        let emoji = person("\u{1F600}", "", "");
        assert_eq!(SortOrder::First.compare(&fullwidth, &emoji), Ordering::Less);
    }

    #[test]
    fn test_sort_order_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            sort: SortOrder,
        }
        let parsed: Wrapper = toml::from_str("sort = \"last\"").unwrap();
        assert_eq!(parsed.sort, SortOrder::Last);
        let parsed: Wrapper = toml::from_str("sort = \"first_name\"").unwrap();
        assert_eq!(parsed.sort, SortOrder::First);
    }
}
