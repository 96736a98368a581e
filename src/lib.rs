//! Single-slot file hand-off through a shared directory.
//!
//! A sender ([`push::PushCoordinator`]) and a receiver ([`pull::PullCoordinator`])
//! never talk to each other. They only look at the mailbox directory:
//!
//! - the sender places a file only when the mailbox is empty
//! - the receiver consumes a file once its size held still for one poll
//!   ([`stability::assess`]), then deletes it, which frees the slot
//!
//! The mailbox itself is behind the [`mailbox::Mailbox`] trait, with an SFTP
//! backend and a local-directory backend.

pub mod cli;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod poll;
pub mod pull;
pub mod push;
pub mod snapshot;
pub mod stability;
pub mod transfer;

pub use error::{MailboxError, Result};
pub use snapshot::{MailboxEntry, Snapshot};
