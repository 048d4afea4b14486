//! Read deadline and activity tracking

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use th_core::StreamError;

/// Tracks the last successful read and bounds every read by a deadline
#[derive(Debug, Clone)]
pub struct Liveness {
    read_timeout: Duration,
    last_activity: Instant,
}

impl Liveness {
    /// Start tracking with the given read deadline
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            read_timeout,
            last_activity: Instant::now(),
        }
    }

    /// Record a successful read
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Time of the last successful read
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Read deadline
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Run one read, failing with [`StreamError::Timeout`] once the deadline
    /// passes
    pub async fn guard<F: Future>(&self, read: F) -> Result<F::Output, StreamError> {
        tokio::time::timeout(self.read_timeout, read)
            .await
            .map_err(|_| StreamError::Timeout(self.read_timeout))
    }
}
