use std::time::{Duration, Instant};

use super::error::{IntersectionError, Result};

/// Wall-clock compute budget captured at the start of a top-level call.
///
/// Every inner loop (descent steps, Newton iterations, marching steps)
/// checks the deadline cooperatively; exceeding it aborts the current
/// operation with [`IntersectionError::Timeout`].
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Whether the budget has run out.
    pub fn exceeded(&self) -> bool {
        self.started.elapsed() > self.budget
    }

    pub fn check(&self) -> Result<()> {
        if self.exceeded() {
            Err(IntersectionError::Timeout)
        } else {
            Ok(())
        }
    }
}
