//! Configuration: command line, optional TOML file, defaults.
//!
//! Values are resolved in that order (command line wins). Everything is
//! validated here so that a bad setup fails before any connection is made.
//!
//! ```toml
//! role = "pull"
//! list_retries = 2
//!
//! [mailbox]
//! dir = "/upload/slot"
//! server = "files.example.com:22"
//! user = "transfer"
//! identity_file = "~/.ssh/id_ed25519"
//!
//! [pull]
//! interval_secs = 10
//! stop_after_empty_polls = 2
//! local_dir = "~/inbox"
//!
//! [push]
//! interval_secs = 10
//! ```

use crate::cli::Cli;
use crate::error::{MailboxError, Result};
use crate::poll::Poller;
use crate::pull::PullConfig;
use crate::push::PushConfig;
use crate::transfer::entry_name_for;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(feature = "ssh")]
use crate::mailbox::sftp::{SftpAuth, SftpTarget, DEFAULT_SSH_PORT};

pub const DEFAULT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_STOP_AFTER_EMPTY_POLLS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Place files into the mailbox
    Push,
    /// Drain files out of the mailbox
    Pull,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Push => f.write_str("push"),
            Role::Pull => f.write_str("pull"),
        }
    }
}

/// Contents of the TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub role: Option<Role>,
    pub list_retries: Option<u32>,
    pub mailbox: MailboxSection,
    pub pull: PullSection,
    pub push: PushSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailboxSection {
    pub dir: Option<String>,
    pub server: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub identity_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PullSection {
    pub interval_secs: Option<u64>,
    pub stop_after_empty_polls: Option<i64>,
    pub local_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushSection {
    pub interval_secs: Option<u64>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| MailboxError::Config(format!("invalid config: {}", e)))
    }

    /// Load `explicit` if given (it must exist), otherwise the default config
    /// file if there is one.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => expand_tilde(path),
            None => match default_config_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };

        let text = std::fs::read_to_string(&path).map_err(|e| {
            MailboxError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Self::parse(&text)
    }
}

/// `<config dir>/mailslot/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mailslot").join("config.toml"))
}

/// Expand tilde (~) in paths to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if path_str == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    } else if let Some(rest) = path_str.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        }
    } else {
        path.to_path_buf()
    }
}

/// Split `host`, `host:port` or `[v6]:port`.
pub fn parse_server(server: &str, default_port: u16) -> Result<(String, u16)> {
    let invalid = || MailboxError::Config(format!("invalid server address {:?}", server));
    let server = server.trim();
    if server.is_empty() {
        return Err(invalid());
    }

    if let Some(rest) = server.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match tail {
            "" => default_port,
            _ => tail
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .ok_or_else(invalid)?,
        };
        return Ok((host.to_string(), port));
    }

    match server.split_once(':') {
        // More than one colon without brackets: bare IPv6 address
        Some((_, rest)) if rest.contains(':') => Ok((server.to_string(), default_port)),
        Some((host, port)) if !host.is_empty() => {
            Ok((host.to_string(), port.parse().map_err(|_| invalid())?))
        }
        Some(_) => Err(invalid()),
        None => Ok((server.to_string(), default_port)),
    }
}

/// Where the mailbox lives.
#[derive(Debug, Clone)]
pub enum MailboxTarget {
    Local(PathBuf),
    #[cfg(feature = "ssh")]
    Sftp(SftpTarget),
}

/// Fully resolved and validated settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub role: Role,
    pub mailbox: MailboxTarget,
    pub pull: PullConfig,
    pub push: PushConfig,
    pub files: Vec<PathBuf>,
}

impl Settings {
    /// Merge command line and file config, then validate.
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self> {
        let role = cli
            .role
            .or(file.role)
            .ok_or_else(|| MailboxError::Config("need a role: --role push or --role pull".into()))?;

        let dir = cli
            .dir
            .clone()
            .or(file.mailbox.dir.clone())
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| MailboxError::Config("need a mailbox directory: --dir".into()))?;

        let mailbox = resolve_mailbox(cli, &file.mailbox, dir)?;
        let list_retries = cli.list_retries.or(file.list_retries).unwrap_or(0);

        let pull_interval = cli
            .pull_interval
            .or(file.pull.interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        let pull = PullConfig {
            local_dir: expand_tilde(
                &cli.local_dir
                    .clone()
                    .or(file.pull.local_dir.clone())
                    .unwrap_or_else(|| PathBuf::from(".")),
            ),
            poll: Poller::new(Duration::from_secs(pull_interval)).with_list_retries(list_retries),
            stop_after_empty_polls: cli
                .stop_after_empty_polls
                .or(file.pull.stop_after_empty_polls)
                .unwrap_or(DEFAULT_STOP_AFTER_EMPTY_POLLS),
        };

        let push_interval = cli
            .push_interval
            .or(file.push.interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        let push = PushConfig {
            poll: Poller::new(Duration::from_secs(push_interval)).with_list_retries(list_retries),
        };

        let settings = Self {
            role,
            mailbox,
            pull,
            push,
            files: cli.files.clone(),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        match self.role {
            Role::Push => {
                if self.files.is_empty() {
                    return Err(MailboxError::Config("push needs at least one file".into()));
                }
                for file in &self.files {
                    if !file.is_file() {
                        return Err(MailboxError::Config(format!(
                            "{} is not a readable file",
                            file.display()
                        )));
                    }
                    entry_name_for(file)?;
                }
            }
            Role::Pull => {
                if !self.files.is_empty() {
                    return Err(MailboxError::Config(
                        "file arguments are only accepted with --role push".into(),
                    ));
                }
                if self.pull.local_dir.exists() && !self.pull.local_dir.is_dir() {
                    return Err(MailboxError::Config(format!(
                        "local dir {} is not a directory",
                        self.pull.local_dir.display()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(feature = "ssh")]
fn resolve_mailbox(cli: &Cli, section: &MailboxSection, dir: String) -> Result<MailboxTarget> {
    let Some(server) = cli.sftp_server.as_ref().or(section.server.as_ref()) else {
        return Ok(MailboxTarget::Local(expand_tilde(Path::new(&dir))));
    };

    let (host, port) = parse_server(server, DEFAULT_SSH_PORT)?;
    let user = cli
        .sftp_user
        .clone()
        .or(section.user.clone())
        .unwrap_or_else(whoami::username);

    let auth = if let Some(password) = cli.sftp_password.clone().or(section.password.clone()) {
        SftpAuth::Password(password)
    } else if let Some(identity) = cli.identity.as_ref().or(section.identity_file.as_ref()) {
        SftpAuth::IdentityFile {
            path: expand_tilde(identity),
            passphrase: None,
        }
    } else {
        SftpAuth::Agent
    };

    Ok(MailboxTarget::Sftp(SftpTarget {
        host,
        port,
        user,
        auth,
        dir,
    }))
}

#[cfg(not(feature = "ssh"))]
fn resolve_mailbox(cli: &Cli, section: &MailboxSection, dir: String) -> Result<MailboxTarget> {
    if cli.sftp_server.is_some() || section.server.is_some() {
        return Err(MailboxError::Config(
            "SFTP mailboxes need the `ssh` feature".into(),
        ));
    }
    Ok(MailboxTarget::Local(expand_tilde(Path::new(&dir))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(role: Option<Role>, dir: &str) -> Cli {
        Cli {
            role,
            dir: Some(dir.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_role_is_config_error() {
        let err = Settings::resolve(&cli(None, "/tmp/mb"), FileConfig::default()).unwrap_err();
        assert!(matches!(err, MailboxError::Config(ref m) if m.contains("role")));
    }

    #[test]
    fn test_missing_dir_is_config_error() {
        let cli = Cli {
            role: Some(Role::Pull),
            ..Default::default()
        };
        let err = Settings::resolve(&cli, FileConfig::default()).unwrap_err();
        assert!(matches!(err, MailboxError::Config(ref m) if m.contains("--dir")));
    }

    #[test]
    fn test_pull_defaults() {
        let settings =
            Settings::resolve(&cli(Some(Role::Pull), "/srv/slot"), FileConfig::default()).unwrap();

        assert_eq!(settings.role, Role::Pull);
        assert_eq!(settings.pull.poll.interval, Duration::from_secs(10));
        assert_eq!(settings.pull.poll.list_retries, 0);
        assert_eq!(settings.pull.stop_after_empty_polls, 2);
        assert_eq!(settings.pull.local_dir, PathBuf::from("."));
        assert_eq!(settings.push.poll.interval, Duration::from_secs(10));
        assert!(matches!(settings.mailbox, MailboxTarget::Local(ref p) if p == Path::new("/srv/slot")));
    }

    #[test]
    fn test_command_line_overrides_file() {
        let file = FileConfig::parse(
            r#"
            role = "push"
            list_retries = 4

            [mailbox]
            dir = "/from/file"

            [pull]
            interval_secs = 30
            stop_after_empty_polls = 7
            "#,
        )
        .unwrap();

        let cli = Cli {
            role: Some(Role::Pull),
            dir: Some("/from/cli".into()),
            stop_after_empty_polls: Some(-1),
            ..Default::default()
        };
        let settings = Settings::resolve(&cli, file).unwrap();

        assert_eq!(settings.role, Role::Pull);
        assert!(matches!(settings.mailbox, MailboxTarget::Local(ref p) if p == Path::new("/from/cli")));
        assert_eq!(settings.pull.poll.interval, Duration::from_secs(30));
        assert_eq!(settings.pull.poll.list_retries, 4);
        assert_eq!(settings.pull.stop_after_empty_polls, -1);
    }

    #[test]
    fn test_unknown_config_key_is_rejected() {
        let err = FileConfig::parse("colour = true").unwrap_err();
        assert!(matches!(err, MailboxError::Config(_)));
    }

    #[test]
    fn test_push_requires_existing_files() {
        let tmp = TempDir::new().unwrap();
        let present = tmp.path().join("a.txt");
        std::fs::write(&present, "x").unwrap();

        let mut cli = cli(Some(Role::Push), "/srv/slot");
        let err = Settings::resolve(&cli, FileConfig::default()).unwrap_err();
        assert!(matches!(err, MailboxError::Config(ref m) if m.contains("at least one file")));

        cli.files = vec![present.clone(), tmp.path().join("missing.txt")];
        let err = Settings::resolve(&cli, FileConfig::default()).unwrap_err();
        assert!(matches!(err, MailboxError::Config(ref m) if m.contains("missing.txt")));

        cli.files = vec![present];
        assert!(Settings::resolve(&cli, FileConfig::default()).is_ok());
    }

    #[test]
    fn test_pull_rejects_file_arguments() {
        let mut cli = cli(Some(Role::Pull), "/srv/slot");
        cli.files = vec![PathBuf::from("a.txt")];
        assert!(Settings::resolve(&cli, FileConfig::default()).is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let err = FileConfig::load(Some(&tmp.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, MailboxError::Config(_)));
    }

    #[test]
    fn test_load_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mailslot.toml");
        std::fs::write(&path, "[push]\ninterval_secs = 1\n").unwrap();

        let file = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(file.push.interval_secs, Some(1));
        assert!(file.role.is_none());
    }

    #[test]
    fn test_parse_server() {
        assert_eq!(parse_server("host", 22).unwrap(), ("host".into(), 22));
        assert_eq!(parse_server("host:2222", 22).unwrap(), ("host".into(), 2222));
        assert_eq!(parse_server("[::1]:2200", 22).unwrap(), ("::1".into(), 2200));
        assert_eq!(parse_server("[::1]", 22).unwrap(), ("::1".into(), 22));
        assert_eq!(parse_server("fe80::1", 22).unwrap(), ("fe80::1".into(), 22));
        assert!(parse_server("host:port", 22).is_err());
        assert!(parse_server(":22", 22).is_err());
        assert!(parse_server("", 22).is_err());
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde(Path::new("/abs/path")), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/inbox")), home.join("inbox"));
            assert_eq!(expand_tilde(Path::new("~")), home);
        }
    }

    #[cfg(feature = "ssh")]
    #[test]
    fn test_sftp_target_auth_preference() {
        let mut cli = cli(Some(Role::Pull), "/upload");
        cli.sftp_server = Some("files.example.com:2222".into());
        cli.sftp_user = Some("transfer".into());
        cli.identity = Some(PathBuf::from("/keys/id_ed25519"));

        let settings = Settings::resolve(&cli, FileConfig::default()).unwrap();
        let MailboxTarget::Sftp(target) = settings.mailbox else {
            panic!("expected sftp target");
        };
        assert_eq!(target.host, "files.example.com");
        assert_eq!(target.port, 2222);
        assert_eq!(target.user, "transfer");
        assert_eq!(target.dir, "/upload");
        assert!(matches!(target.auth, SftpAuth::IdentityFile { ref path, .. } if path == Path::new("/keys/id_ed25519")));

        cli.sftp_password = Some("secret".into());
        let settings = Settings::resolve(&cli, FileConfig::default()).unwrap();
        let MailboxTarget::Sftp(target) = settings.mailbox else {
            panic!("expected sftp target");
        };
        assert!(matches!(target.auth, SftpAuth::Password(_)));
    }
}
