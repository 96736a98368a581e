//! Transfer bookkeeping and local file helpers shared by the backends.

use crate::error::{MailboxError, Result};
use indicatif::{HumanBytes, HumanDuration};
use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Component, Path};
use std::time::{Duration, Instant};

/// Which way bytes moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Mailbox -> local (pull)
    Download,
    /// Local -> mailbox (push)
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => f.write_str("downloaded"),
            Direction::Upload => f.write_str("uploaded"),
        }
    }
}

/// Started when a copy begins, turned into a [`TransferRecord`] when it ends.
#[derive(Debug)]
pub struct TransferTimer {
    name: String,
    direction: Direction,
    started: Instant,
}

impl TransferTimer {
    pub fn start(direction: Direction, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction,
            started: Instant::now(),
        }
    }

    pub fn finish(self, bytes: u64) -> TransferRecord {
        TransferRecord {
            name: self.name,
            direction: self.direction,
            bytes,
            elapsed: self.started.elapsed(),
        }
    }
}

/// A completed copy. Only used for logging and summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub name: String,
    pub direction: Direction,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl TransferRecord {
    /// Bytes per second, or `None` when the copy was too quick to measure.
    pub fn rate(&self) -> Option<u64> {
        let secs = self.elapsed.as_secs_f64();
        if secs <= f64::EPSILON {
            return None;
        }
        Some((self.bytes as f64 / secs) as u64)
    }
}

impl fmt::Display for TransferRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} - {} in {}",
            self.direction,
            self.name,
            HumanBytes(self.bytes),
            HumanDuration(self.elapsed)
        )?;
        match self.rate() {
            Some(rate) => write!(f, " - {}/s", HumanBytes(rate)),
            None => Ok(()),
        }
    }
}

/// Check that a mailbox entry name is a single plain path component.
///
/// Entry names come from a remote listing and are joined onto local paths, so
/// anything that could climb out of the destination directory is refused.
pub fn validate_entry_name(name: &str) -> Result<()> {
    let unsafe_name = || MailboxError::UnsafeName(name.to_string());

    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(unsafe_name());
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(unsafe_name()),
    }
}

/// Base name a local file is placed under in the mailbox.
pub fn entry_name_for(local: &Path) -> Result<String> {
    let name = local
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            MailboxError::Config(format!(
                "{} has no usable file name",
                local.display()
            ))
        })?
        .to_string();
    validate_entry_name(&name)?;
    Ok(name)
}

/// Stream `reader` into `dest` through a temporary file in the same directory.
///
/// The destination only appears once every byte has been written and synced;
/// on error the temporary file is removed and `dest` is left untouched.
pub fn write_atomically<R: Read>(dest: &Path, reader: &mut R) -> io::Result<u64> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".mailslot-")
        .suffix(".tmp")
        .tempfile_in(parent)?;

    let bytes = io::copy(reader, temp.as_file_mut())?;
    temp.as_file_mut().flush()?;
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| e.error)?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_rate_handles_instant_transfers() {
        let record = TransferRecord {
            name: "a.txt".into(),
            direction: Direction::Download,
            bytes: 100,
            elapsed: Duration::ZERO,
        };
        assert_eq!(record.rate(), None);
        let line = record.to_string();
        assert!(line.starts_with("downloaded a.txt - 100 B in "), "{line}");
        assert!(!line.contains("/s"), "{line}");
    }

    #[test]
    fn test_rate_for_measured_transfer() {
        let record = TransferRecord {
            name: "big.iso".into(),
            direction: Direction::Upload,
            bytes: 4096,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(record.rate(), Some(2048));
        assert!(record.to_string().starts_with("uploaded big.iso"));
    }

    #[test]
    fn test_timer_records_bytes() {
        let record = TransferTimer::start(Direction::Upload, "x").finish(42);
        assert_eq!(record.name, "x");
        assert_eq!(record.bytes, 42);
        assert_eq!(record.direction, Direction::Upload);
    }

    #[test]
    fn test_validate_entry_name() {
        assert!(validate_entry_name("report.csv").is_ok());
        assert!(validate_entry_name(".hidden").is_ok());

        for bad in ["", ".", "..", "../etc/passwd", "a/b", "/abs", "a\\b"] {
            assert!(
                matches!(validate_entry_name(bad), Err(MailboxError::UnsafeName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_entry_name_for_uses_base_name() {
        assert_eq!(
            entry_name_for(&PathBuf::from("/data/out/a.txt")).unwrap(),
            "a.txt"
        );
        assert!(entry_name_for(&PathBuf::from("/")).is_err());
    }

    #[test]
    fn test_write_atomically_replaces_destination() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("a.txt");
        std::fs::write(&dest, "old contents that are longer").unwrap();

        let bytes = write_atomically(&dest, &mut "new".as_bytes()).unwrap();

        assert_eq!(bytes, 3);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "new");
        // no temp files left behind
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomically_leaves_nothing_on_failure() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("connection reset"))
            }
        }

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("a.txt");

        assert!(write_atomically(&dest, &mut Broken).is_err());
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
