//! Rectangular measurement zones and their statistics.

use std::ops::Range;

use itertools::iproduct;
use serde_derive::*;

use crate::error::{Error, Result};
use crate::frame::TemperatureMatrix;
use crate::stats::{Position, Stats};
use crate::temperature::round_to;

/// Named sub-region `[row_low, row_high) x [col_low, col_high)`
/// of the temperature matrix.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Zone {
    pub name: String,
    pub row_low: usize,
    pub row_high: usize,
    pub col_low: usize,
    pub col_high: usize,
}

impl Zone {
    pub fn new(name: impl Into<String>, rows: Range<usize>, cols: Range<usize>) -> Self {
        Zone {
            name: name.into(),
            row_low: rows.start,
            row_high: rows.end,
            col_low: cols.start,
            col_high: cols.end,
        }
    }

    /// Zone covering the whole `height x width` sensor.
    pub fn whole(height: usize, width: usize) -> Self {
        Zone::new("All", 0..height, 0..width)
    }

    pub fn rows(&self) -> Range<usize> {
        self.row_low..self.row_high
    }

    pub fn cols(&self) -> Range<usize> {
        self.col_low..self.col_high
    }

    /// Checks the zone is non-empty and inside a
    /// `height x width` sensor. Zones are never clipped.
    pub fn validate(&self, height: usize, width: usize) -> Result<()> {
        let fits = self.row_low < self.row_high
            && self.row_high <= height
            && self.col_low < self.col_high
            && self.col_high <= width;
        if fits {
            Ok(())
        } else {
            Err(Error::ZoneBounds {
                name: self.name.clone(),
                row_low: self.row_low,
                row_high: self.row_high,
                col_low: self.col_low,
                col_high: self.col_high,
                height,
                width,
            })
        }
    }
}

/// The five zones of the stock TC001 layout.
pub fn default_zones() -> Vec<Zone> {
    vec![
        Zone::new("Zone 1", 0..64, 0..64),
        Zone::new("Zone 2", 0..64, 64..128),
        Zone::new("Zone 3", 0..64, 128..192),
        Zone::new("Zone 4", 64..128, 0..64),
        Zone::new("Zone 5", 128..172, 128..172),
    ]
}

/// Statistics of one zone for one frame. Positions are
/// absolute `(row, col)` in the full matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneStats {
    pub avg: f64,
    pub min_value: f64,
    pub min_pos: Position,
    pub max_value: f64,
    pub max_pos: Position,
}

impl From<&Stats> for ZoneStats {
    fn from(stats: &Stats) -> Self {
        ZoneStats {
            avg: round_to(stats.mean(), 2),
            min_value: stats.min().value,
            min_pos: stats.min().pos,
            max_value: stats.max().value,
            max_pos: stats.max().pos,
        }
    }
}

/// Compute statistics of `zone` over `matrix`, scanning in
/// row-major order.
///
/// # Panics
///
/// If the zone does not lie inside the matrix; zones are
/// expected to be [validated](Zone::validate) up front.
pub fn compute_stats(matrix: &TemperatureMatrix, zone: &Zone) -> ZoneStats {
    let stats: Stats = iproduct!(zone.rows(), zone.cols())
        .map(|pos| (pos, matrix[pos]))
        .collect();
    ZoneStats::from(&stats)
}

/// Validated zone set for a fixed sensor size.
#[derive(Debug, Clone)]
pub struct ZoneAnalyzer {
    zones: Vec<Zone>,
    whole: Zone,
}

impl ZoneAnalyzer {
    /// Fails with [`Error::ZoneBounds`] on the first zone
    /// outside the sensor.
    pub fn new(zones: Vec<Zone>, height: usize, width: usize) -> Result<Self> {
        for zone in zones.iter() {
            zone.validate(height, width)?;
        }
        Ok(ZoneAnalyzer {
            zones,
            whole: Zone::whole(height, width),
        })
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Statistics for every configured zone, in
    /// configuration order.
    pub fn analyze(&self, matrix: &TemperatureMatrix) -> Vec<ZoneStats> {
        self.zones
            .iter()
            .map(|zone| compute_stats(matrix, zone))
            .collect()
    }

    /// Statistics over the whole sensor.
    pub fn whole_frame(&self, matrix: &TemperatureMatrix) -> ZoneStats {
        compute_stats(matrix, &self.whole)
    }
}
