//! Directory source abstraction and the concrete sources backing it.
//!
//! This module provides:
//! - `DirectorySource` trait, the only boundary the cache talks to
//! - `JsonDirectory`, raw records stored as a JSON array
//! - `VdirDirectory`, a tree of vCard files
//! - `EditLauncher`, the external editor both sources hand edits to

pub mod json;
pub mod vdir;

use std::process::Command;

use tracing::debug;

use crate::config::{CommandExec, Config, DirectoryKind};
use crate::error::{DirectoryError, DirectoryResult};
use crate::raw::RawRecord;

pub use json::JsonDirectory;
pub use vdir::VdirDirectory;

const UID_PLACEHOLDER: &str = "{uid}";

/// Provider of raw contact records.
pub trait DirectorySource {
    /// Every record the directory holds. Failures degrade to an empty list.
    fn list_all(&self) -> Vec<RawRecord>;

    /// Identifier of the record describing the current user, if known.
    fn current_user_id(&self) -> Option<String>;

    /// Open the record with the given identifier in an external editor.
    fn edit(&self, id: &str) -> DirectoryResult<()>;
}

impl<S: DirectorySource + ?Sized> DirectorySource for Box<S> {
    fn list_all(&self) -> Vec<RawRecord> {
        (**self).list_all()
    }

    fn current_user_id(&self) -> Option<String> {
        (**self).current_user_id()
    }

    fn edit(&self, id: &str) -> DirectoryResult<()> {
        (**self).edit(id)
    }
}

/// Build the directory source described by the configuration.
pub fn open(config: &Config) -> Box<dyn DirectorySource> {
    let editor = EditLauncher::new(config.commands.edit.clone());
    let path = config.directory.path.clone();
    match config.directory.kind {
        DirectoryKind::Vdir => Box::new(VdirDirectory::new(
            path,
            config.phone_region.clone(),
            config.me.clone(),
            editor,
        )),
        DirectoryKind::Json => Box::new(JsonDirectory::new(path, config.me.clone(), editor)),
    }
}

/// Runs the configured edit command for a record id.
#[derive(Debug, Clone, Default)]
pub struct EditLauncher {
    command: Option<CommandExec>,
}

impl EditLauncher {
    pub fn new(command: Option<CommandExec>) -> Self {
        Self { command }
    }

    /// Arguments with `{uid}` substituted; the id is appended when no
    /// argument mentions the placeholder.
    pub fn arguments(command: &CommandExec, id: &str) -> Vec<String> {
        let mut args: Vec<String> = command
            .args
            .iter()
            .map(|arg| arg.replace(UID_PLACEHOLDER, id))
            .collect();
        if !command.args.iter().any(|arg| arg.contains(UID_PLACEHOLDER)) {
            args.push(id.to_string());
        }
        args
    }

    pub fn launch(&self, id: &str) -> DirectoryResult<()> {
        let Some(command) = self.command.as_ref() else {
            return Err(DirectoryError::EditorNotConfigured);
        };

        let args = Self::arguments(command, id);
        debug!(program = %command.program, ?args, "launching editor");

        let status = Command::new(&command.program)
            .args(&args)
            .status()
            .map_err(|source| DirectoryError::EditorSpawn {
                program: command.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(DirectoryError::EditorFailed {
                program: command.program.clone(),
                status: status.to_string(),
            });
        }

        Ok(())
    }
}
