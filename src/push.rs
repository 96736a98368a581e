//! Sender side: place files into the mailbox one at a time.
//!
//! Before each file the mailbox must be observed empty. That listing is the
//! only signal that the receiver has drained the previous file, so it is
//! repeated every push interval for as long as it takes.

use crate::error::{MailboxError, Result};
use crate::mailbox::Mailbox;
use crate::poll::Poller;
use crate::transfer::{entry_name_for, Direction, TransferRecord, TransferTimer};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub struct PushConfig {
    pub poll: Poller,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushSummary {
    pub files: u64,
    pub bytes: u64,
    /// Listings that found the mailbox occupied
    pub busy_polls: u64,
}

pub struct PushCoordinator<M> {
    mailbox: M,
    config: PushConfig,
    summary: PushSummary,
}

impl<M: Mailbox> PushCoordinator<M> {
    pub fn new(mailbox: M, config: PushConfig) -> Self {
        Self {
            mailbox,
            config,
            summary: PushSummary::default(),
        }
    }

    pub fn summary(&self) -> &PushSummary {
        &self.summary
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    /// Deliver `files` in order, waiting for an empty mailbox before each one.
    pub async fn deliver(&mut self, files: &[PathBuf]) -> Result<PushSummary> {
        let names = files
            .iter()
            .map(|f| entry_name_for(f))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "Files to push into {}: {}",
            self.mailbox.location(),
            names.join(", ")
        );

        for (file, name) in files.iter().zip(&names) {
            self.wait_for_empty().await?;
            self.place(file, name).await?;
        }

        tracing::info!(
            files = self.summary.files,
            bytes = self.summary.bytes,
            busy_polls = self.summary.busy_polls,
            "Push finished"
        );
        Ok(self.summary.clone())
    }

    /// Block until a listing comes back empty. There is no timeout.
    pub async fn wait_for_empty(&mut self) -> Result<()> {
        let mut logged = false;
        loop {
            let snapshot = self.config.poll.snapshot(&self.mailbox).await?;
            if snapshot.is_empty() {
                return Ok(());
            }

            self.summary.busy_polls += 1;
            if !logged {
                let names: Vec<_> = snapshot.names().collect();
                tracing::info!(
                    "Waiting for download of {} files: {}",
                    snapshot.len(),
                    names.join(", ")
                );
                logged = true;
            }
            self.config.poll.pause().await;
        }
    }

    /// Copy one local file into the mailbox under `name`.
    pub async fn place(&mut self, file: &Path, name: &str) -> Result<TransferRecord> {
        if !file.is_file() {
            return Err(MailboxError::Upload {
                local: file.to_path_buf(),
                name: name.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "local file is missing or not a regular file",
                ),
            });
        }

        tracing::info!("Uploading {}", file.display());
        let timer = TransferTimer::start(Direction::Upload, name);
        let bytes = self.mailbox.upload(file, name).await?;
        let record = timer.finish(bytes);
        tracing::info!("{}", record);

        self.summary.files += 1;
        self.summary.bytes += bytes;
        Ok(record)
    }
}
