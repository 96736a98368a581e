//! Point-in-time listings of the mailbox.

use crate::error::{MailboxError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One file as observed in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxEntry {
    pub name: String,
    /// Size in bytes at observation time
    pub size: u64,
}

impl MailboxEntry {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// The entries returned by a single listing call.
///
/// Names are unique. Iteration is ordered by name so that every pass over a
/// snapshot visits entries in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<String, u64>,
    taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot stamped with the current time.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = MailboxEntry>,
    {
        Self::with_timestamp(entries, Utc::now())
    }

    /// Build a snapshot with an explicit timestamp.
    pub fn with_timestamp<I>(entries: I, taken_at: DateTime<Utc>) -> Result<Self>
    where
        I: IntoIterator<Item = MailboxEntry>,
    {
        let mut map = BTreeMap::new();
        for entry in entries {
            if map.insert(entry.name.clone(), entry.size).is_some() {
                return Err(MailboxError::DuplicateEntry(entry.name));
            }
        }
        Ok(Self {
            entries: map,
            taken_at,
        })
    }

    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            taken_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn size_of(&self, name: &str) -> Option<u64> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(name, size)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(name, size)| (name.as_str(), *size))
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Copy of this snapshot with the given names dropped.
    ///
    /// Used after consumption so a later file re-using a consumed name has no
    /// history and must be observed twice before it is judged.
    pub fn without<'a, I>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut entries = self.entries.clone();
        for name in names {
            entries.remove(name);
        }
        Self {
            entries,
            taken_at: self.taken_at,
        }
    }
}
