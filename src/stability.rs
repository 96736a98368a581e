//! Stability detection between two consecutive mailbox snapshots.
//!
//! A file is judged finished when its size did not change across one poll
//! interval. The check is a pure function of the two snapshots: the same pair
//! always produces the same [`Assessment`].
//!
//! ```text
//!   previous        current         verdict
//!   a.txt  100      a.txt  100  ->  Stable
//!   b.txt   50      b.txt  120  ->  Growing
//!                   c.txt   10  ->  (none, first sighting)
//!   d.txt   70                  ->  (none, vanished)
//! ```

use crate::snapshot::Snapshot;
use std::collections::BTreeMap;

/// Judgement for a name present in both snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Same size in both snapshots, safe to consume
    Stable { size: u64 },
    /// Size changed, a writer is probably still appending
    Growing { previous: u64, current: u64 },
}

impl Verdict {
    pub fn is_stable(&self) -> bool {
        matches!(self, Verdict::Stable { .. })
    }
}

/// Result of comparing two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assessment {
    verdicts: BTreeMap<String, Verdict>,
    /// Seen for the first time, no verdict until the next poll
    fresh: Vec<String>,
    /// Present before, gone now
    vanished: Vec<String>,
}

impl Assessment {
    pub fn verdict(&self, name: &str) -> Option<Verdict> {
        self.verdicts.get(name).copied()
    }

    /// All verdicts in name order.
    pub fn verdicts(&self) -> impl Iterator<Item = (&str, Verdict)> {
        self.verdicts.iter().map(|(name, v)| (name.as_str(), *v))
    }

    /// Stable entries in name order, with their size.
    pub fn stable(&self) -> impl Iterator<Item = (&str, u64)> {
        self.verdicts.iter().filter_map(|(name, v)| match v {
            Verdict::Stable { size } => Some((name.as_str(), *size)),
            Verdict::Growing { .. } => None,
        })
    }

    pub fn growing(&self) -> impl Iterator<Item = &str> {
        self.verdicts
            .iter()
            .filter(|(_, v)| !v.is_stable())
            .map(|(name, _)| name.as_str())
    }

    pub fn fresh(&self) -> &[String] {
        &self.fresh
    }

    pub fn vanished(&self) -> &[String] {
        &self.vanished
    }

    pub fn has_stable(&self) -> bool {
        self.verdicts.values().any(Verdict::is_stable)
    }
}

/// Compare `previous` against `current`.
pub fn assess(previous: &Snapshot, current: &Snapshot) -> Assessment {
    let mut assessment = Assessment::default();

    for (name, size) in current.iter() {
        match previous.size_of(name) {
            Some(prev) if prev == size => {
                assessment
                    .verdicts
                    .insert(name.to_string(), Verdict::Stable { size });
            }
            Some(prev) => {
                assessment.verdicts.insert(
                    name.to_string(),
                    Verdict::Growing {
                        previous: prev,
                        current: size,
                    },
                );
            }
            None => assessment.fresh.push(name.to_string()),
        }
    }

    assessment.vanished = previous
        .names()
        .filter(|name| !current.contains(name))
        .map(str::to_string)
        .collect();

    assessment
}
