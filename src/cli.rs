use crate::config::Role;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "mailslot")]
#[command(version)]
#[command(about = "Hand files from a sender to a receiver through a shared single-slot mailbox directory")]
#[command(after_help = "Examples:\n  \
    mailslot --role push --sftp-server files.example.com --dir /upload/slot a.bin b.bin\n  \
    mailslot --role pull --sftp-server files.example.com --dir /upload/slot --local-dir inbox\n  \
    mailslot --role pull --dir /mnt/share/slot --stop-after-empty-polls 0")]
pub struct Cli {
    /// Which side of the hand-off to run
    #[arg(long, value_enum, env = "MAILSLOT_ROLE")]
    pub role: Option<Role>,

    /// Mailbox directory (on the SFTP server, or a local/shared path without --sftp-server)
    #[arg(long, env = "MAILSLOT_DIR")]
    pub dir: Option<String>,

    /// SFTP server as host or host:port
    #[arg(long, env = "MAILSLOT_SFTP_SERVER")]
    pub sftp_server: Option<String>,

    /// SFTP user (defaults to the local user)
    #[arg(long, env = "MAILSLOT_SFTP_USER")]
    pub sftp_user: Option<String>,

    /// SFTP password
    #[arg(long, env = "MAILSLOT_SFTP_PASSWORD", hide_env_values = true)]
    pub sftp_password: Option<String>,

    /// Private key for SFTP authentication (ssh-agent is used when neither this nor a password is set)
    #[arg(long, env = "MAILSLOT_IDENTITY")]
    pub identity: Option<PathBuf>,

    /// Seconds between polls on the pull side [default: 10]
    #[arg(long, value_name = "SECS")]
    pub pull_interval: Option<u64>,

    /// Seconds between polls on the push side [default: 10]
    #[arg(long, value_name = "SECS")]
    pub push_interval: Option<u64>,

    /// Stop pulling after this many consecutive empty polls; 0 or less runs forever [default: 2]
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub stop_after_empty_polls: Option<i64>,

    /// Retry a failed mailbox listing this many times before giving up [default: 0]
    #[arg(long, value_name = "N")]
    pub list_retries: Option<u32>,

    /// Where pulled files are written [default: .]
    #[arg(long)]
    pub local_dir: Option<PathBuf>,

    /// Config file (TOML)
    #[arg(long, env = "MAILSLOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Files to push, delivered in order
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
