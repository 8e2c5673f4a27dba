//! Bounded retry with a fixed pause between attempts.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `operation` until it succeeds or `max_attempts` is reached.
    /// There is no pause after the final failed attempt.
    pub fn run<T, E, F>(&self, context: &str, mut operation: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation() {
                Ok(value) => break Ok(value),
                Err(err) if attempt >= max_attempts => break Err(err),
                Err(err) => {
                    log::warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {}ms.",
                        attempt,
                        max_attempts,
                        context,
                        err,
                        self.delay.as_millis()
                    );
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}
