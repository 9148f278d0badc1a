//! Raw directory records as handed over by a directory source.
//!
//! A record maps a fixed set of field keys to values of arbitrary shape:
//! a piece of text, an ordered sequence, a nested mapping, or some other
//! scalar the directory happened to store (numbers, booleans, nulls).

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Sequence(Vec<RawValue>),
    /// Nested mapping in source order.
    Mapping(Vec<(String, RawValue)>),
    /// A scalar that is not text; never resolves.
    Other,
}

impl RawValue {
    #[cfg(test)]
    pub fn text(value: impl Into<String>) -> Self {
        RawValue::Text(value.into())
    }

    /// Depth-first search for the first text value.
    ///
    /// Sequences are walked in order, mappings in source order. Returns
    /// `None` when nothing below this value is text.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(text) => Some(text.as_str()),
            RawValue::Sequence(items) => items.iter().find_map(RawValue::first_text),
            RawValue::Mapping(entries) => entries.iter().find_map(|(_, value)| value.first_text()),
            RawValue::Other => None,
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => RawValue::Text(text),
            Value::Array(items) => RawValue::Sequence(items.into_iter().map(RawValue::from).collect()),
            Value::Object(map) => RawValue::Mapping(
                map.into_iter()
                    .map(|(key, value)| (key, RawValue::from(value)))
                    .collect(),
            ),
            Value::Null | Value::Bool(_) | Value::Number(_) => RawValue::Other,
        }
    }
}

/// Keys under which a directory stores contact fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    First,
    Middle,
    Last,
    Email,
    Phone,
    Chat,
    Uid,
}

impl FieldKey {
    #[cfg(test)]
    pub const ALL: [FieldKey; 7] = [
        FieldKey::First,
        FieldKey::Middle,
        FieldKey::Last,
        FieldKey::Email,
        FieldKey::Phone,
        FieldKey::Chat,
        FieldKey::Uid,
    ];

    pub const COUNT: usize = 7;

    pub fn key(self) -> &'static str {
        match self {
            FieldKey::First => "First",
            FieldKey::Middle => "Middle",
            FieldKey::Last => "Last",
            FieldKey::Email => "Email",
            FieldKey::Phone => "Phone",
            FieldKey::Chat => "AIMInstant",
            FieldKey::Uid => "UID",
        }
    }

    pub fn index(self) -> usize {
        match self {
            FieldKey::First => 0,
            FieldKey::Middle => 1,
            FieldKey::Last => 2,
            FieldKey::Email => 3,
            FieldKey::Phone => 4,
            FieldKey::Chat => 5,
            FieldKey::Uid => 6,
        }
    }
}

/// One contact as the directory returned it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, RawValue)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, replacing any previous value under `key`.
    #[cfg(test)]
    pub fn with(mut self, key: impl Into<String>, value: RawValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RawValue) {
        let key = key.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Resolve a field to text, empty when missing or unresolvable.
    pub fn resolve(&self, field: FieldKey) -> String {
        self.get(field.key())
            .and_then(RawValue::first_text)
            .unwrap_or_default()
            .to_string()
    }
}

impl FromIterator<(String, RawValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, RawValue)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}
