//! Mailbox backends.
//!
//! The coordinators only see the [`Mailbox`] trait: list the mailbox, copy an
//! entry out, copy a file in, delete an entry. Two backends implement it:
//!
//! - [`LocalMailbox`]: a directory on a shared mount
//! - [`SftpMailbox`]: a directory on an SFTP server (`ssh` feature)

pub mod local;
#[cfg(feature = "ssh")]
pub mod sftp;

pub use local::LocalMailbox;
#[cfg(feature = "ssh")]
pub use sftp::{SftpAuth, SftpMailbox, SftpTarget};

use crate::error::Result;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use std::io;
use std::path::Path;

/// The shared directory both sides coordinate through.
///
/// Every call is a complete operation: a copy either transfers the whole entry
/// or returns an error, there is no resumable partial state.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Human readable location, used in log lines.
    fn location(&self) -> String;

    /// Create the mailbox directory (and parents) if it does not exist.
    async fn prepare(&self) -> Result<()>;

    /// List the regular files currently in the mailbox.
    ///
    /// Directories, symlinks and other special entries are skipped, so an
    /// empty snapshot means no regular file is present. Occupancy for the push
    /// handshake and the pull idle streak is judged on regular files only.
    async fn list(&self) -> Result<Snapshot>;

    /// Copy entry `name` out of the mailbox into `local`. Returns bytes copied.
    async fn download(&self, name: &str, local: &Path) -> Result<u64>;

    /// Copy `local` into the mailbox as entry `name`. Returns bytes copied.
    async fn upload(&self, local: &Path, name: &str) -> Result<u64>;

    /// Delete entry `name` from the mailbox.
    async fn remove(&self, name: &str) -> Result<()>;
}

#[async_trait]
impl<M: Mailbox + ?Sized> Mailbox for Box<M> {
    fn location(&self) -> String {
        (**self).location()
    }

    async fn prepare(&self) -> Result<()> {
        (**self).prepare().await
    }

    async fn list(&self) -> Result<Snapshot> {
        (**self).list().await
    }

    async fn download(&self, name: &str, local: &Path) -> Result<u64> {
        (**self).download(name, local).await
    }

    async fn upload(&self, local: &Path, name: &str) -> Result<u64> {
        (**self).upload(local, name).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        (**self).remove(name).await
    }
}

/// Run blocking I/O on the blocking pool, folding a panicked or cancelled task
/// into an `io::Error`.
pub(crate) async fn blocking<F, T>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)?
}
