//! Mailbox on a locally mounted directory (NFS, SMB, or a plain folder).

use super::{blocking, Mailbox};
use crate::error::{MailboxError, Result};
use crate::snapshot::{MailboxEntry, Snapshot};
use crate::transfer::write_atomically;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct LocalMailbox {
    dir: PathBuf,
}

impl LocalMailbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    async fn read_entries(&self) -> io::Result<Vec<MailboxEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;

        while let Some(entry) = dir.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                // Removed between readdir and stat
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            if !metadata.is_file() {
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) => entries.push(MailboxEntry::new(name, metadata.len())),
                Err(raw) => {
                    tracing::warn!("Skipping mailbox entry with non UTF-8 name: {:?}", raw);
                }
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl Mailbox for LocalMailbox {
    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| MailboxError::Prepare {
                dir: self.location(),
                source,
            })
    }

    async fn list(&self) -> Result<Snapshot> {
        let entries = self
            .read_entries()
            .await
            .map_err(|source| MailboxError::List {
                dir: self.location(),
                source,
            })?;
        Snapshot::from_entries(entries)
    }

    async fn download(&self, name: &str, local: &Path) -> Result<u64> {
        let remote = self.entry_path(name);
        let dest = local.to_path_buf();

        blocking(move || {
            let mut file = std::fs::File::open(&remote)?;
            write_atomically(&dest, &mut file)
        })
        .await
        .map_err(|source| MailboxError::Download {
            name: name.to_string(),
            local: local.to_path_buf(),
            source,
        })
    }

    async fn upload(&self, local: &Path, name: &str) -> Result<u64> {
        fs::copy(local, self.entry_path(name))
            .await
            .map_err(|source| MailboxError::Upload {
                local: local.to_path_buf(),
                name: name.to_string(),
                source,
            })
    }

    async fn remove(&self, name: &str) -> Result<()> {
        fs::remove_file(self.entry_path(name))
            .await
            .map_err(|source| MailboxError::Remove {
                name: name.to_string(),
                source,
            })
    }
}
