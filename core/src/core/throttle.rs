//! Fixed inter-request delay for the fuzz engine.
//!
//! Every request is followed by the same sleep, whether it succeeded or
//! failed and however slow the target was. There is no backoff and no token
//! bucket.

use tokio::time::{sleep, Duration};

pub const DEFAULT_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct ThrottleController {
    delay: Duration,
}

impl ThrottleController {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Sleeps for the configured delay. No-op when the delay is 0.
    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for ThrottleController {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DELAY_MS))
    }
}
