//! Scripted mailbox for driving the coordinators poll by poll.
#![allow(dead_code)]

use async_trait::async_trait;
use mailslot::mailbox::Mailbox;
use mailslot::{MailboxEntry, MailboxError, Result, Snapshot};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Every call the coordinator made, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    List,
    Download(String),
    Upload(String),
    Remove(String),
}

/// One scripted answer to `list()`.
#[derive(Debug, Clone)]
pub enum Listing {
    Entries(Vec<(String, u64)>),
    Fail,
}

pub fn listing(entries: &[(&str, u64)]) -> Listing {
    Listing::Entries(
        entries
            .iter()
            .map(|(name, size)| (name.to_string(), *size))
            .collect(),
    )
}

pub fn empty() -> Listing {
    Listing::Entries(Vec::new())
}

#[derive(Default)]
struct State {
    listings: VecDeque<Listing>,
    ops: Vec<Op>,
    fail_download: Option<String>,
    fail_remove: Option<String>,
}

/// Mailbox whose listings come from a script.
///
/// Uploads, downloads and removes are only recorded, they do not change what
/// later listings return. Once the script runs out every listing is empty.
#[derive(Clone, Default)]
pub struct ScriptedMailbox {
    state: Arc<Mutex<State>>,
}

impl ScriptedMailbox {
    pub fn new(listings: Vec<Listing>) -> Self {
        let mailbox = Self::default();
        mailbox.state.lock().unwrap().listings = listings.into();
        mailbox
    }

    pub fn fail_download_of(self, name: &str) -> Self {
        self.state.lock().unwrap().fail_download = Some(name.to_string());
        self
    }

    pub fn fail_remove_of(self, name: &str) -> Self {
        self.state.lock().unwrap().fail_remove = Some(name.to_string());
        self
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn list_count(&self) -> usize {
        self.ops().iter().filter(|op| **op == Op::List).count()
    }

    fn record(&self, op: Op) {
        self.state.lock().unwrap().ops.push(op);
    }
}

#[async_trait]
impl Mailbox for ScriptedMailbox {
    fn location(&self) -> String {
        "scripted://mailbox".to_string()
    }

    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    async fn list(&self) -> Result<Snapshot> {
        self.record(Op::List);
        let next = self.state.lock().unwrap().listings.pop_front();
        match next {
            Some(Listing::Entries(entries)) => Snapshot::from_entries(
                entries
                    .into_iter()
                    .map(|(name, size)| MailboxEntry::new(name, size)),
            ),
            Some(Listing::Fail) => Err(MailboxError::List {
                dir: self.location(),
                source: io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"),
            }),
            None => Snapshot::from_entries(Vec::new()),
        }
    }

    async fn download(&self, name: &str, local: &Path) -> Result<u64> {
        self.record(Op::Download(name.to_string()));
        if self.state.lock().unwrap().fail_download.as_deref() == Some(name) {
            return Err(MailboxError::Download {
                name: name.to_string(),
                local: local.to_path_buf(),
                source: io::Error::other("read failed"),
            });
        }
        std::fs::write(local, name.as_bytes()).map_err(|source| MailboxError::Download {
            name: name.to_string(),
            local: local.to_path_buf(),
            source,
        })?;
        Ok(name.len() as u64)
    }

    async fn upload(&self, local: &Path, name: &str) -> Result<u64> {
        self.record(Op::Upload(name.to_string()));
        let len = std::fs::metadata(local)
            .map_err(|source| MailboxError::Upload {
                local: local.to_path_buf(),
                name: name.to_string(),
                source,
            })?
            .len();
        Ok(len)
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.record(Op::Remove(name.to_string()));
        if self.state.lock().unwrap().fail_remove.as_deref() == Some(name) {
            return Err(MailboxError::Remove {
                name: name.to_string(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
            });
        }
        Ok(())
    }
}

/// Write small files into `dir` and return their paths in order.
pub fn write_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, format!("contents of {}", name)).unwrap();
            path
        })
        .collect()
}
