use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};

/// A point in time as seen by the session loop.
///
/// Throttling and elapsed-time bookkeeping use the
/// monotonic half only; the wall-clock half is used for
/// labels and file names.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    pub monotonic: Instant,
    pub wall: NaiveDateTime,
}

impl Timestamp {
    pub fn now() -> Self {
        Timestamp {
            monotonic: Instant::now(),
            wall: Local::now().naive_local(),
        }
    }

    /// Both clocks advanced by `by`.
    pub fn advanced(self, by: Duration) -> Self {
        Timestamp {
            monotonic: self.monotonic + by,
            wall: self.wall + chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero()),
        }
    }
}
