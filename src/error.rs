use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no edit command configured; set `commands.edit` in the configuration file")]
    EditorNotConfigured,

    #[error("failed to spawn `{program}`: {source}")]
    EditorSpawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {status}")]
    EditorFailed { program: String, status: String },
}

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;
