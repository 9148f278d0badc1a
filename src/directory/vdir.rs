use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rlibphonenumber::{region_code::RegionCode, PhoneNumber, PhoneNumberFormat, PHONE_NUMBER_UTIL};
use tracing::{debug, warn};
use vcard4::property::TextOrUriProperty;
use vcard4::{parse, Vcard};

use super::{DirectorySource, EditLauncher};
use crate::error::DirectoryResult;
use crate::raw::{FieldKey, RawRecord, RawValue};

/// Directory backed by a vdir: a tree of `.vcf` files.
#[derive(Debug, Clone)]
pub struct VdirDirectory {
    root: PathBuf,
    phone_region: Option<String>,
    me: Option<String>,
    editor: EditLauncher,
}

impl VdirDirectory {
    pub fn new(
        root: impl Into<PathBuf>,
        phone_region: Option<String>,
        me: Option<String>,
        editor: EditLauncher,
    ) -> Self {
        Self {
            root: root.into(),
            phone_region,
            me,
            editor,
        }
    }

    fn read_file(&self, path: &Path) -> Result<Vec<RawRecord>> {
        let input = fs::read_to_string(path)
            .with_context(|| format!("failed to read vCard file at {}", path.display()))?;
        let cards = parse_str(&input)?;
        Ok(cards
            .iter()
            .map(|card| card_to_record(card, self.phone_region.as_deref()))
            .collect())
    }
}

impl DirectorySource for VdirDirectory {
    fn list_all(&self) -> Vec<RawRecord> {
        let files = match list_vcf_files(&self.root) {
            Ok(files) => files,
            Err(err) => {
                warn!("unable to list contacts: {err:#}");
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for path in files {
            match self.read_file(&path) {
                Ok(mut parsed) => records.append(&mut parsed),
                Err(err) => warn!(path = %path.display(), "skipping vCard file: {err:#}"),
            }
        }
        debug!(root = %self.root.display(), count = records.len(), "read vdir");
        records
    }

    fn current_user_id(&self) -> Option<String> {
        self.me.clone()
    }

    fn edit(&self, id: &str) -> DirectoryResult<()> {
        self.editor.launch(id)
    }
}

/// Parse a UTF-8 string into `Vcard` values.
pub fn parse_str(input: &str) -> Result<Vec<Vcard>> {
    parse(input)
        .map_err(|err| anyhow!(err))
        .context("parsing vCard data")
}

/// All `.vcf` files below `root`, sorted by path.
///
/// Each directory is entered once, by canonical path, so symlink cycles
/// do not repeat cards. Unreadable subdirectories are skipped; only a
/// failure to read `root` itself is an error.
pub fn list_vcf_files(root: &Path) -> Result<Vec<PathBuf>> {
    let canonical = fs::canonicalize(root)
        .with_context(|| format!("failed to read directory {}", root.display()))?;
    let mut visited = HashSet::from([canonical]);
    let mut files = Vec::new();
    collect_vcf(root, &mut visited, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_vcf(dir: &Path, visited: &mut HashSet<PathBuf>, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?;
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(err) => {
                warn!(dir = %dir.display(), "skipping directory entry: {err}");
                continue;
            }
        };

        if path.is_dir() {
            let canonical = match fs::canonicalize(&path) {
                Ok(canonical) => canonical,
                Err(err) => {
                    warn!(path = %path.display(), "skipping directory: {err}");
                    continue;
                }
            };
            if !visited.insert(canonical) {
                debug!(path = %path.display(), "directory already visited");
                continue;
            }
            if let Err(err) = collect_vcf(&path, visited, files) {
                warn!(path = %path.display(), "skipping directory: {err:#}");
            }
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("vcf"))
            .unwrap_or(false)
        {
            files.push(path);
        }
    }
    Ok(())
}

/// Present a card under the directory's fixed field keys.
///
/// N components map to first/middle/last. A card without any name
/// component falls back to its formatted name as the first name.
pub fn card_to_record(card: &Vcard, phone_region: Option<&str>) -> RawRecord {
    let mut record = RawRecord::new();

    // N components: [0]=family, [1]=given, [2]=additional
    let component = |index: usize| -> String {
        card.name
            .as_ref()
            .and_then(|name| name.value.get(index))
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    };
    let (family, given, additional) = (component(0), component(1), component(2));

    if family.is_empty() && given.is_empty() && additional.is_empty() {
        let formatted = card
            .formatted_name
            .first()
            .map(|prop| prop.value.trim().to_string())
            .unwrap_or_default();
        record.insert(FieldKey::First.key(), RawValue::Text(formatted));
    } else {
        record.insert(FieldKey::First.key(), RawValue::Text(given));
        record.insert(FieldKey::Middle.key(), RawValue::Text(additional));
        record.insert(FieldKey::Last.key(), RawValue::Text(family));
    }

    record.insert(
        FieldKey::Email.key(),
        RawValue::Sequence(
            card.email
                .iter()
                .map(|prop| RawValue::Text(prop.value.to_string()))
                .collect(),
        ),
    );

    record.insert(
        FieldKey::Phone.key(),
        RawValue::Sequence(
            card.tel
                .iter()
                .map(|prop| {
                    let raw = match prop {
                        TextOrUriProperty::Text(text) => text.value.clone(),
                        TextOrUriProperty::Uri(uri) => uri.value.to_string(),
                    };
                    RawValue::Text(phone_display_value(&raw, phone_region))
                })
                .collect(),
        ),
    );

    record.insert(
        FieldKey::Chat.key(),
        RawValue::Sequence(
            card.impp
                .iter()
                .map(|prop| RawValue::Text(chat_handle(&prop.value.to_string()).to_string()))
                .collect(),
        ),
    );

    if let Some(uid) = card_uid(card) {
        record.insert(FieldKey::Uid.key(), RawValue::Text(uid));
    }

    record
}

/// Retrieve the UID value as a string if present.
pub fn card_uid(card: &Vcard) -> Option<String> {
    match &card.uid {
        Some(TextOrUriProperty::Text(text)) => Some(text.value.clone()),
        Some(TextOrUriProperty::Uri(uri)) => Some(uri.value.to_string()),
        None => None,
    }
}

/// Strip the URI scheme off an IMPP value (`xmpp:ann@example.com`).
fn chat_handle(value: &str) -> &str {
    let Some((scheme, handle)) = value.split_once(':') else {
        return value;
    };
    let is_scheme = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if is_scheme {
        handle.trim_start_matches("//")
    } else {
        value
    }
}

fn has_tel_scheme(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() < 4 {
        return false;
    }

    bytes[0].eq_ignore_ascii_case(&b't')
        && bytes[1].eq_ignore_ascii_case(&b'e')
        && bytes[2].eq_ignore_ascii_case(&b'l')
        && bytes[3] == b':'
}

fn strip_tel_scheme(value: &str) -> &str {
    if has_tel_scheme(value) {
        value[4..].trim()
    } else {
        value
    }
}

/// Phone number as E.164 when it parses for the configured region, the
/// trimmed input (without `tel:`) otherwise.
pub fn phone_display_value(raw: &str, default_region: Option<&str>) -> String {
    let remainder = strip_tel_scheme(raw.trim());
    if remainder.is_empty() {
        return String::new();
    }
    match default_region {
        Some(region) => parse_with_regions(remainder, region).unwrap_or_else(|| remainder.to_string()),
        None => remainder.to_string(),
    }
}

fn parse_with_regions(input: &str, default_region: &str) -> Option<String> {
    let util = &*PHONE_NUMBER_UTIL;
    let mut candidates: Vec<&str> = Vec::new();

    if !default_region.is_empty() {
        candidates.push(default_region);
    }

    let unknown = RegionCode::get_unknown();
    if candidates
        .iter()
        .all(|candidate| !candidate.eq_ignore_ascii_case(unknown))
    {
        candidates.push(unknown);
    }

    for region in candidates {
        if let Ok(parsed) = util.parse(input, region) {
            return Some(format_parsed_number(&parsed));
        }
    }

    None
}

fn format_parsed_number(number: &PhoneNumber) -> String {
    let mut normalized = PHONE_NUMBER_UTIL
        .format(number, PhoneNumberFormat::E164)
        .into_owned();

    if number.has_extension() {
        let ext = number.extension();
        if !ext.is_empty() {
            normalized.push_str(";ext=");
            normalized.push_str(ext);
        }
    }

    normalized
}
