/// Fixed-delay retry schedule for representation polling.
///
/// Every retry waits the same delay. The schedule is exhausted either
/// after `max_attempts` retries or when sleeping again would run past
/// the deadline (the invocation's time budget), whichever comes first.
/// Calling `reset()` returns it to a fresh state.
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    max_attempts: u32,
    deadline: Option<Instant>,
    /// Number of retries handed out so far (resets on `reset()`).
    pub attempt: u32,
}

impl Backoff {
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
            deadline: None,
            attempt: 0,
        }
    }

    /// Stops handing out delays that would end after `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the delay before the next retry, or `None` once the
    /// schedule is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.exceeded_max_attempts() {
            return None;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() + self.delay > deadline {
                return None;
            }
        }
        self.attempt += 1;
        Some(self.delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Returns true if every allowed retry has been handed out.
    pub fn exceeded_max_attempts(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}
