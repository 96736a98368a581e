//! Receiver side: drain stable files out of the mailbox.
//!
//! Each poll lists the mailbox and compares the listing with the one before
//! it. Files whose size held still across the interval are downloaded and then
//! deleted, one at a time, before the next listing is taken. A run of empty
//! listings ends the loop once it reaches `stop_after_empty_polls`.
//!
//! ```text
//!        empty & previous empty          streak >= threshold
//!   Idle ----------------------> Idle ----------------------> Terminal
//!    |  ^
//!    |  | empty & previous empty
//!    v  |
//!   Comparing --(stable)--> download + remove --> Comparing
//! ```

use crate::error::Result;
use crate::mailbox::Mailbox;
use crate::poll::Poller;
use crate::snapshot::Snapshot;
use crate::stability::assess;
use crate::transfer::{validate_entry_name, Direction, TransferRecord, TransferTimer};
use std::path::PathBuf;
use std::time::Duration;

/// Pull side settings.
#[derive(Debug, Clone)]
pub struct PullConfig {
    /// Directory downloaded files are written to
    pub local_dir: PathBuf,
    pub poll: Poller,
    /// Consecutive empty polls before giving up. Zero or negative polls forever.
    pub stop_after_empty_polls: i64,
}

impl PullConfig {
    pub fn new(local_dir: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            local_dir: local_dir.into(),
            poll: Poller::new(interval),
            stop_after_empty_polls: 2,
        }
    }

    fn stop_threshold(&self) -> Option<u64> {
        u64::try_from(self.stop_after_empty_polls)
            .ok()
            .filter(|n| *n > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullPhase {
    /// Nothing known, nothing in the mailbox
    Idle,
    /// Files are being tracked between polls
    Comparing,
    /// Idle threshold reached, no further polls
    Terminal,
}

/// What happened during one poll.
#[derive(Debug, Clone)]
pub struct PollReport {
    pub phase: PullPhase,
    pub consumed: Vec<TransferRecord>,
    pub growing: Vec<String>,
    /// First sighting, judged on the next poll
    pub fresh: Vec<String>,
    pub empty_streak: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullSummary {
    pub files: u64,
    pub bytes: u64,
    pub polls: u64,
}

pub struct PullCoordinator<M> {
    mailbox: M,
    config: PullConfig,
    /// Stability history; consumed names are dropped from it
    previous: Option<Snapshot>,
    /// Whether the last raw listing was empty, consumed files included
    previous_was_empty: bool,
    empty_streak: u64,
    phase: PullPhase,
    summary: PullSummary,
    waiting_logged: bool,
    growing_logged: bool,
}

impl<M: Mailbox> PullCoordinator<M> {
    pub fn new(mailbox: M, config: PullConfig) -> Self {
        Self {
            mailbox,
            config,
            previous: None,
            previous_was_empty: true,
            empty_streak: 0,
            phase: PullPhase::Idle,
            summary: PullSummary::default(),
            waiting_logged: false,
            growing_logged: false,
        }
    }

    pub fn phase(&self) -> PullPhase {
        self.phase
    }

    pub fn empty_streak(&self) -> u64 {
        self.empty_streak
    }

    pub fn summary(&self) -> &PullSummary {
        &self.summary
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    /// Poll until the idle threshold is reached.
    pub async fn run(&mut self) -> Result<PullSummary> {
        tracing::info!(
            "Pulling from {} into {}",
            self.mailbox.location(),
            self.config.local_dir.display()
        );

        while self.phase != PullPhase::Terminal {
            let report = self.poll_once().await?;
            if report.phase == PullPhase::Terminal {
                break;
            }
            self.config.poll.pause().await;
        }

        tracing::info!(
            files = self.summary.files,
            bytes = self.summary.bytes,
            polls = self.summary.polls,
            "Pull finished"
        );
        Ok(self.summary.clone())
    }

    /// One listing, comparison and consumption cycle.
    ///
    /// Every stable file found by this poll is downloaded and removed before
    /// this returns. A download or remove failure is returned as is; nothing is
    /// retried.
    pub async fn poll_once(&mut self) -> Result<PollReport> {
        if self.phase == PullPhase::Terminal {
            return Ok(self.report(Vec::new(), Vec::new(), Vec::new()));
        }

        let current = self.config.poll.snapshot(&self.mailbox).await?;
        self.summary.polls += 1;
        let previous = self.previous.take().unwrap_or_else(Snapshot::empty);

        let previous_was_empty =
            std::mem::replace(&mut self.previous_was_empty, current.is_empty());

        if current.is_empty() && previous_was_empty {
            self.phase = PullPhase::Idle;
            self.empty_streak += 1;
            self.growing_logged = false;

            if !self.waiting_logged {
                tracing::info!("Waiting for files");
                self.waiting_logged = true;
            }
            tracing::debug!(empty_streak = self.empty_streak, "Mailbox empty");

            if let Some(threshold) = self.config.stop_threshold() {
                if self.empty_streak >= threshold {
                    tracing::info!("No new files after {} empty polls, exiting", threshold);
                    self.phase = PullPhase::Terminal;
                }
            }

            self.previous = Some(current);
            return Ok(self.report(Vec::new(), Vec::new(), Vec::new()));
        }

        self.phase = PullPhase::Comparing;
        if !current.is_empty() {
            self.empty_streak = 0;
            self.waiting_logged = false;
        }

        let assessment = assess(&previous, &current);

        for name in assessment.vanished() {
            tracing::debug!("{} left the mailbox", name);
        }
        for name in assessment.fresh() {
            tracing::debug!("New file {} seen, waiting for it to settle", name);
        }

        let growing: Vec<String> = assessment.growing().map(str::to_string).collect();
        if growing.is_empty() {
            self.growing_logged = false;
        } else if !self.growing_logged {
            tracing::info!("Upload in progress: {}", growing.join(", "));
            self.growing_logged = true;
        }

        let mut consumed = Vec::new();
        for (name, size) in assessment.stable() {
            tracing::debug!(size, "{} is stable", name);
            consumed.push(self.consume(name).await?);
        }

        if assessment.has_stable() {
            self.empty_streak = 0;
        }

        self.previous = Some(current.without(consumed.iter().map(|r| r.name.as_str())));

        Ok(self.report(consumed, growing, assessment.fresh().to_vec()))
    }

    /// Download `name` into the local directory, then delete it from the mailbox.
    async fn consume(&mut self, name: &str) -> Result<TransferRecord> {
        validate_entry_name(name)?;
        let local = self.config.local_dir.join(name);

        tracing::info!("Download and delete {}", name);
        let timer = TransferTimer::start(Direction::Download, name);
        let bytes = self.mailbox.download(name, &local).await?;
        let record = timer.finish(bytes);
        tracing::info!("{}", record);

        self.mailbox.remove(name).await?;
        tracing::info!("Removed {} from {}", name, self.mailbox.location());

        self.summary.files += 1;
        self.summary.bytes += bytes;
        Ok(record)
    }

    fn report(
        &self,
        consumed: Vec<TransferRecord>,
        growing: Vec<String>,
        fresh: Vec<String>,
    ) -> PollReport {
        PollReport {
            phase: self.phase,
            consumed,
            growing,
            fresh,
            empty_streak: self.empty_streak,
        }
    }
}
