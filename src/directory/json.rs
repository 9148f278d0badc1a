use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use super::{DirectorySource, EditLauncher};
use crate::error::DirectoryResult;
use crate::raw::{RawRecord, RawValue};

/// Directory backed by a JSON file holding an array of raw records.
///
/// Each record is an object whose values may be strings, arrays, nested
/// objects or other scalars, mirroring what a native address book hands
/// out.
#[derive(Debug, Clone)]
pub struct JsonDirectory {
    path: PathBuf,
    me: Option<String>,
    editor: EditLauncher,
}

impl JsonDirectory {
    pub fn new(path: impl Into<PathBuf>, me: Option<String>, editor: EditLauncher) -> Self {
        Self {
            path: path.into(),
            me,
            editor,
        }
    }

    fn read_records(&self) -> Result<Vec<RawRecord>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        parse_records(&raw).with_context(|| format!("failed to parse {}", self.path.display()))
    }
}

/// Parse a JSON array of record objects. Entries that are not objects are
/// skipped.
pub fn parse_records(input: &str) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_str(input)?;
    let Value::Array(items) = value else {
        bail!("expected a JSON array of contact records");
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => records.push(
                map.into_iter()
                    .map(|(key, value)| (key, RawValue::from(value)))
                    .collect(),
            ),
            other => warn!(index, kind = %json_kind(&other), "skipping non-object record"),
        }
    }
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl DirectorySource for JsonDirectory {
    fn list_all(&self) -> Vec<RawRecord> {
        match self.read_records() {
            Ok(records) => {
                debug!(path = %self.path.display(), count = records.len(), "read json directory");
                records
            }
            Err(err) => {
                warn!("unable to list contacts: {err:#}");
                Vec::new()
            }
        }
    }

    fn current_user_id(&self) -> Option<String> {
        self.me.clone()
    }

    fn edit(&self, id: &str) -> DirectoryResult<()> {
        self.editor.launch(id)
    }
}
