//! Run-level options.

use std::time::Duration;

use serde::Deserialize;

use crate::channel::PtyConfig;
use crate::error::{DriverError, Result};

/// Options for one job run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Most devices worked on at once; 0 means no limit.
    pub max_concurrency: usize,

    /// Upper bound on the whole run, in seconds.
    pub deadline_secs: Option<u64>,

    /// How long cancelled workers get to report after the deadline.
    pub cancel_grace_secs: u64,

    /// Dial and authentication timeout, in seconds.
    pub connect_timeout_secs: u64,

    /// Pause after each write, in milliseconds.
    pub settle_millis: u64,

    /// Bytes from the end of the output searched for the prompt.
    pub search_depth: usize,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 0,
            deadline_secs: None,
            cancel_grace_secs: 5,
            connect_timeout_secs: 10,
            settle_millis: 3,
            search_depth: 1000,
        }
    }
}

impl JobOptions {
    /// Limit concurrency.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Set a run-level deadline.
    ///
    /// Deadlines are kept in whole seconds. A fractional `deadline` is
    /// rounded up, so the run never gets less time than asked for.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        let secs = deadline.as_secs() + u64::from(deadline.subsec_nanos() > 0);
        self.deadline_secs = Some(secs.max(1));
        self
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Channel settings derived from these options.
    pub fn pty_config(&self) -> PtyConfig {
        PtyConfig {
            search_depth: self.search_depth,
            settle_delay: Duration::from_millis(self.settle_millis),
            ..PtyConfig::default()
        }
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.search_depth == 0 {
            return Err(DriverError::InvalidConfig {
                message: "search_depth must be greater than zero".to_string(),
            }
            .into());
        }
        if self.connect_timeout_secs == 0 {
            return Err(DriverError::InvalidConfig {
                message: "connect_timeout_secs must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
