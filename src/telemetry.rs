//! Periodic per-zone statistics, persisted as CSV.
//!
//! Each emitted row has the form
//!
//! ```text
//! Zone 1,06/21/2023.14:05:09,24.51,22.83,27.1
//! ```
//!
//! i.e. `name, MM/DD/YYYY.HH:MM:SS, avg, min, max`, with no
//! header row.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use serde_derive::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::zone::{Zone, ZoneStats};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
const TIMESTAMP_FORMAT: &str = "%m/%d/%Y.%H:%M:%S";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub zone: String,
    pub timestamp: String,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl TelemetryRecord {
    pub fn new(zone: &Zone, stats: &ZoneStats, at: NaiveDateTime) -> Self {
        TelemetryRecord {
            zone: zone.name.clone(),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            avg: stats.avg,
            min: stats.min_value,
            max: stats.max_value,
        }
    }
}

/// Destination of telemetry rows.
pub trait TelemetrySink {
    fn append(&mut self, record: &TelemetryRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Appends rows to a CSV stream.
pub struct CsvTelemetry<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvTelemetry<W> {
    pub fn new(inner: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::CRLF)
            .from_writer(inner);
        CsvTelemetry { writer }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::persistence("telemetry", e.error().to_string()))
    }
}

impl CsvTelemetry<File> {
    /// Open `path` for appending, creating it if needed.
    pub fn append_to(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::persistence("telemetry", e))?;
        Ok(CsvTelemetry::new(file))
    }
}

impl<W: Write> TelemetrySink for CsvTelemetry<W> {
    fn append(&mut self, record: &TelemetryRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .map_err(|e| Error::persistence("telemetry", e))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::persistence("telemetry", e))
    }
}

/// Throttles telemetry to one batch per interval.
///
/// The next deadline is set from the time of the emitting
/// call, so a loop iterating faster than the interval emits
/// exactly once per interval.
#[derive(Debug, Clone)]
pub struct TelemetryWriter {
    next_write: Instant,
    interval: Duration,
}

impl TelemetryWriter {
    /// First batch is due at `start`.
    pub fn new(start: Instant, interval: Duration) -> Self {
        TelemetryWriter {
            next_write: start,
            interval,
        }
    }

    pub fn next_write(&self) -> Instant {
        self.next_write
    }

    /// Emit one row per zone if the deadline has passed.
    /// Never blocks; returns the number of rows written.
    ///
    /// The deadline advances even if the sink fails, so a
    /// broken sink is retried once per interval rather than
    /// once per frame.
    pub fn poll<S: TelemetrySink + ?Sized>(
        &mut self,
        now: Instant,
        wall: NaiveDateTime,
        zones: &[Zone],
        stats: &[ZoneStats],
        sink: &mut S,
    ) -> Result<usize> {
        if now < self.next_write {
            return Ok(0);
        }
        self.next_write = now + self.interval;

        let mut written = 0;
        for (zone, stats) in zones.iter().zip(stats.iter()) {
            sink.append(&TelemetryRecord::new(zone, stats, wall))?;
            written += 1;
        }
        sink.flush()?;
        debug!(rows = written, "telemetry written");
        Ok(written)
    }
}
