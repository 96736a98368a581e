//! Mailbox on a remote SFTP server.
//!
//! libssh2 calls are blocking, so every operation runs on tokio's blocking
//! pool. The session and SFTP channel live behind one mutex: the coordinators
//! are sequential anyway and libssh2 sessions are not meant to be driven from
//! several threads at once.

use super::{blocking, Mailbox};
use crate::error::{MailboxError, Result};
use crate::snapshot::{MailboxEntry, Snapshot};
use crate::transfer::write_atomically;
use async_trait::async_trait;
use ssh2::{Session, Sftp};
use std::io::{self, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const DEFAULT_SSH_PORT: u16 = 22;

/// How to authenticate the SSH session.
#[derive(Clone)]
pub enum SftpAuth {
    Password(String),
    IdentityFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    /// Keys offered by a running ssh-agent
    Agent,
}

impl std::fmt::Debug for SftpAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SftpAuth::Password(_) => f.write_str("Password(<redacted>)"),
            SftpAuth::IdentityFile { path, .. } => {
                f.debug_struct("IdentityFile").field("path", path).finish()
            }
            SftpAuth::Agent => f.write_str("Agent"),
        }
    }
}

/// Where the remote mailbox lives and how to reach it.
#[derive(Debug, Clone)]
pub struct SftpTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: SftpAuth,
    /// Mailbox directory on the server
    pub dir: String,
}

impl SftpTarget {
    pub fn server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Connection {
    // Kept so the session outlives the SFTP channel
    _session: Session,
    sftp: Sftp,
}

pub struct SftpMailbox {
    conn: Arc<Mutex<Connection>>,
    dir: String,
    label: String,
}

impl SftpMailbox {
    /// Open the TCP connection, authenticate and start the SFTP subsystem.
    pub async fn connect(target: SftpTarget) -> Result<Self> {
        let server = target.server();
        let label = format!("sftp://{}@{}{}", target.user, server, target.dir);
        let dir = target.dir.trim_end_matches('/').to_string();

        tracing::debug!("Connecting to {} as {} ({:?})", server, target.user, target.auth);

        let conn = blocking(move || open_connection(&target))
            .await
            .map_err(|source| MailboxError::Connect { server, source })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dir: if dir.is_empty() { "/".to_string() } else { dir },
            label,
        })
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        if self.dir == "/" {
            PathBuf::from(format!("/{}", name))
        } else {
            PathBuf::from(format!("{}/{}", self.dir, name))
        }
    }

    /// Run `f` against the SFTP channel on the blocking pool.
    async fn with_sftp<F, T>(&self, f: F) -> io::Result<T>
    where
        F: FnOnce(&Sftp) -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| io::Error::other("sftp connection lock poisoned"))?;
            f(&guard.sftp)
        })
        .await
    }
}

fn open_connection(target: &SftpTarget) -> io::Result<Connection> {
    let tcp = TcpStream::connect((target.host.as_str(), target.port))?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.handshake()?;

    match &target.auth {
        SftpAuth::Password(password) => session.userauth_password(&target.user, password)?,
        SftpAuth::IdentityFile { path, passphrase } => {
            session.userauth_pubkey_file(&target.user, None, path, passphrase.as_deref())?
        }
        SftpAuth::Agent => session.userauth_agent(&target.user)?,
    }

    if !session.authenticated() {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("authentication rejected for user {}", target.user),
        ));
    }

    let sftp = session.sftp()?;
    Ok(Connection {
        _session: session,
        sftp,
    })
}

/// `mkdir -p` over SFTP.
fn mkdir_all(sftp: &Sftp, dir: &str) -> io::Result<()> {
    for prefix in dir_prefixes(dir) {
        let path = Path::new(&prefix);
        match sftp.stat(path) {
            Ok(stat) if stat.is_dir() => continue,
            Ok(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and is not a directory", prefix),
                ))
            }
            Err(_) => sftp.mkdir(path, 0o755)?,
        }
    }

    Ok(())
}

/// Every ancestor of `dir`, shortest first, ending with `dir` itself.
/// Empty segments are skipped and a leading `/` is kept.
fn dir_prefixes(dir: &str) -> Vec<String> {
    let mut current = if dir.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };

    let mut prefixes = Vec::new();
    for part in dir.split('/').filter(|p| !p.is_empty()) {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(part);
        prefixes.push(current.clone());
    }
    prefixes
}

#[async_trait]
impl Mailbox for SftpMailbox {
    fn location(&self) -> String {
        self.label.clone()
    }

    async fn prepare(&self) -> Result<()> {
        let dir = self.dir.clone();
        self.with_sftp(move |sftp| mkdir_all(sftp, &dir))
            .await
            .map_err(|source| MailboxError::Prepare {
                dir: self.location(),
                source,
            })
    }

    async fn list(&self) -> Result<Snapshot> {
        let dir = PathBuf::from(&self.dir);
        let entries = self
            .with_sftp(move |sftp| {
                let listing = sftp.readdir(&dir)?;
                let mut entries = Vec::with_capacity(listing.len());
                for (path, stat) in listing {
                    if !stat.is_file() {
                        continue;
                    }
                    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                        tracing::warn!("Skipping mailbox entry with unusable name: {:?}", path);
                        continue;
                    };
                    entries.push(MailboxEntry::new(name, stat.size.unwrap_or(0)));
                }
                Ok(entries)
            })
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

        self.with_sftp(move |sftp| {
            let mut file = sftp.open(&remote)?;
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
        let remote = self.entry_path(name);
        let source_path = local.to_path_buf();

        self.with_sftp(move |sftp| {
            let mut src = std::fs::File::open(&source_path)?;
            let mut dst = sftp.create(&remote)?;
            let bytes = io::copy(&mut src, &mut dst)?;
            dst.flush()?;
            Ok(bytes)
        })
        .await
        .map_err(|source| MailboxError::Upload {
            local: local.to_path_buf(),
            name: name.to_string(),
            source,
        })
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let remote = self.entry_path(name);

        self.with_sftp(move |sftp| Ok(sftp.unlink(&remote)?))
            .await
            .map_err(|source| MailboxError::Remove {
                name: name.to_string(),
                source,
            })
    }
}
