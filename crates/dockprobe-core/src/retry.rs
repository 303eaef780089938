use crate::clock::Clock;
use crate::error::ProbeError;
use std::time::Duration;

/// Outcome of a single poll attempt.
#[derive(Debug)]
pub enum Poll<T> {
    Ready(T),
    Pending,
    /// Stop polling immediately with this error.
    Abort(ProbeError),
}

/// Why a poll loop gave up.
#[derive(Debug)]
pub enum PollFailure {
    TimedOut { elapsed: Duration, attempts: usize },
    Aborted(ProbeError),
}

/// Fixed-interval polling bounded by a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub deadline: Duration,
}

impl RetryPolicy {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }

    /// Call `attempt` until it is ready, aborts, or the deadline passes.
    ///
    /// The first attempt happens immediately; later ones are spaced by
    /// `interval` as measured by `clock`.
    pub fn run<T>(
        &self,
        clock: &dyn Clock,
        mut attempt: impl FnMut() -> Poll<T>,
    ) -> Result<T, PollFailure> {
        let start = clock.now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match attempt() {
                Poll::Ready(value) => return Ok(value),
                Poll::Abort(err) => return Err(PollFailure::Aborted(err)),
                Poll::Pending => {}
            }

            let elapsed = clock.elapsed_since(start);
            if elapsed >= self.deadline {
                return Err(PollFailure::TimedOut { elapsed, attempts });
            }
            clock.sleep(self.interval.min(self.deadline - elapsed));
        }
    }
}
