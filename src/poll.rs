//! Polling helpers shared by both coordinators.

use crate::error::Result;
use crate::mailbox::Mailbox;
use crate::snapshot::Snapshot;
use std::time::Duration;

/// Fixed-interval poller over a mailbox.
///
/// Listing failures are retried up to `list_retries` times, waiting one
/// interval between attempts. With the default of zero the first failure is
/// returned straight away.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    pub interval: Duration,
    pub list_retries: u32,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            list_retries: 0,
        }
    }

    pub fn with_list_retries(mut self, retries: u32) -> Self {
        self.list_retries = retries;
        self
    }

    /// Take one snapshot of the mailbox.
    pub async fn snapshot<M: Mailbox + ?Sized>(&self, mailbox: &M) -> Result<Snapshot> {
        let mut attempt = 0;
        loop {
            match mailbox.list().await {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) if attempt < self.list_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        retries = self.list_retries,
                        "Listing failed, retrying: {}",
                        err
                    );
                    self.pause().await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Sleep for one poll interval.
    pub async fn pause(&self) {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}
