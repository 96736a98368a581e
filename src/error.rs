use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the hand-off protocol and its collaborators.
///
/// Every variant names the operation that failed. The underlying cause, when
/// there is one, is exposed through `source()` so callers can print the chain.
#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to connect to {server}")]
    Connect {
        server: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to prepare mailbox directory {dir}")]
    Prepare {
        dir: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to list mailbox {dir}")]
    List {
        dir: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to download {} to {}", .name, .local.display())]
    Download {
        name: String,
        local: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to upload {} as {}", .local.display(), .name)]
    Upload {
        local: PathBuf,
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove {name} from mailbox")]
    Remove {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("refusing unsafe mailbox entry name {0:?}")]
    UnsafeName(String),

    #[error("duplicate entry {0:?} in one mailbox listing")]
    DuplicateEntry(String),
}

impl MailboxError {
    /// Short name of the failing operation, used as a structured log field.
    pub fn operation(&self) -> &'static str {
        match self {
            MailboxError::Config(_) => "config",
            MailboxError::Connect { .. } => "connect",
            MailboxError::Prepare { .. } => "prepare",
            MailboxError::List { .. } | MailboxError::DuplicateEntry(_) => "list",
            MailboxError::Download { .. } => "download",
            MailboxError::Upload { .. } => "upload",
            MailboxError::Remove { .. } => "remove",
            MailboxError::UnsafeName(_) => "validate",
        }
    }
}

pub type Result<T> = std::result::Result<T, MailboxError>;
