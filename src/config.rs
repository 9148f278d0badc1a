use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;
use tracing::warn;

use crate::contact::SortOrder;
use crate::search::SearchMode;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "contactdir";

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub directory: DirectoryConfig,
    pub phone_region: Option<String>,
    pub me: Option<String>,
    pub sort: SortOrder,
    pub search: SearchMode,
    pub commands: Commands,
}

// =============================================================================
// Directory Configuration
// =============================================================================

/// Where raw contact records come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryKind {
    /// A tree of vCard files
    Vdir,
    /// A JSON array of raw records
    Json,
}

impl DirectoryKind {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vdir" | "vcard" => Some(DirectoryKind::Vdir),
            "json" => Some(DirectoryKind::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub kind: DirectoryKind,
    pub path: PathBuf,
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

// =============================================================================
// External commands
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct Commands {
    pub edit: Option<CommandExec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExec {
    pub program: String,
    pub args: Vec<String>,
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    directory: Option<DirectoryFile>,
    phone_region: Option<String>,
    me: Option<String>,
    sort: Option<SortOrder>,
    search: SearchFile,
    commands: CommandsFile,
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    kind: Option<String>,
    path: Option<PathBuf>,
}

impl DirectoryFile {
    fn into_config(self) -> Result<DirectoryConfig> {
        let kind = match self.kind.as_deref() {
            Some(value) => DirectoryKind::from_str(value).ok_or_else(|| {
                anyhow!("invalid directory.kind '{}', expected one of: vdir, json", value)
            })?,
            None => DirectoryKind::Vdir,
        };

        let path = self
            .path
            .map(|path| expand_tilde(&path))
            .ok_or_else(|| anyhow!("`directory.path` must be specified in configuration"))?;

        if !path.exists() {
            warn!("configured directory does not exist: {}", path.display());
        }

        Ok(DirectoryConfig { kind, path })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SearchFile {
    transliterate: bool,
}

impl From<SearchFile> for SearchMode {
    fn from(file: SearchFile) -> Self {
        Self {
            transliterate: file.transliterate,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CommandsFile {
    edit: Option<CommandDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CommandDef {
    Simple(String),
    List(Vec<String>),
}

impl From<CommandsFile> for Commands {
    fn from(file: CommandsFile) -> Self {
        Self {
            edit: file.edit.and_then(CommandExec::from_def),
        }
    }
}

impl CommandExec {
    fn from_def(def: CommandDef) -> Option<Self> {
        match def {
            CommandDef::Simple(cmd) => {
                let trimmed = cmd.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self {
                        program: trimmed.to_string(),
                        args: Vec::new(),
                    })
                }
            }
            CommandDef::List(mut parts) => {
                if parts.is_empty() {
                    return None;
                }
                let program = parts.remove(0);
                if program.trim().is_empty() {
                    return None;
                }
                Some(Self {
                    program,
                    args: parts,
                })
            }
        }
    }
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    let dir = base.config_dir().join(APP_NAME);
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from `path`, or from the default location.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_path()?,
    };
    if !path.exists() {
        bail!(
            "configuration file not found at {}. Please create it as per docs.",
            path.display()
        );
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;

    parse(&raw, path.clone())
}

/// Parse configuration text; `config_path` is recorded for reporting.
pub fn parse(raw: &str, config_path: PathBuf) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", config_path.display()))?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", config_path.display()))?;

    let directory = cfg_file
        .directory
        .ok_or_else(|| anyhow!("`directory` must be specified in configuration"))?
        .into_config()
        .with_context(|| "failed to parse directory configuration")?;

    let phone_region = cfg_file
        .phone_region
        .as_ref()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_ascii_uppercase());

    let me = cfg_file
        .me
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    Ok(Config {
        config_path,
        directory,
        phone_region,
        me,
        sort: cfg_file.sort.unwrap_or_default(),
        search: cfg_file.search.into(),
        commands: cfg_file.commands.into(),
    })
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    let known = HashSet::from(["directory", "phone_region", "me", "sort", "search", "commands"]);
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            warn!("unknown configuration key `{}`", key);
        }
    }

    warn_unknown_section(table.get("directory"), "directory", &["kind", "path"]);
    warn_unknown_section(table.get("search"), "search", &["transliterate"]);
    warn_unknown_section(table.get("commands"), "commands", &["edit"]);
}

fn warn_unknown_section(value: Option<&toml::Value>, section: &str, known: &[&str]) {
    let Some(table) = value.and_then(|value| value.as_table()) else {
        return;
    };
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            warn!("unknown configuration key `{}.{}`", section, key);
        }
    }
}
