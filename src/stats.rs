//! Running statistics over temperature values.

use std::ops::AddAssign;

/// `(row, col)` position in a temperature matrix.
pub type Position = (usize, usize);

/// A value together with where it was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    pub value: f64,
    pub pos: Position,
}

/// Accumulates count, sum and positioned extrema.
///
/// Extrema are replaced only on a strictly better value, so
/// when values are fed in row-major order the first
/// occurrence of an extremum is kept.
#[derive(Debug, Clone)]
pub struct Stats {
    count: usize,
    sum: f64,
    min: Extremum,
    max: Extremum,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            count: 0,
            sum: 0.,
            min: Extremum {
                value: f64::INFINITY,
                pos: (0, 0),
            },
            max: Extremum {
                value: f64::NEG_INFINITY,
                pos: (0, 0),
            },
        }
    }
}

impl Stats {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    pub fn min(&self) -> Extremum {
        self.min
    }

    pub fn max(&self) -> Extremum {
        self.max
    }
}

impl AddAssign<(Position, f64)> for Stats {
    fn add_assign(&mut self, (pos, value): (Position, f64)) {
        self.count += 1;
        self.sum += value;
        if value < self.min.value {
            self.min = Extremum { value, pos };
        }
        if value > self.max.value {
            self.max = Extremum { value, pos };
        }
    }
}

impl std::iter::FromIterator<(Position, f64)> for Stats {
    fn from_iter<I: IntoIterator<Item = (Position, f64)>>(iter: I) -> Self {
        let mut stats = Stats::default();
        for item in iter {
            stats += item;
        }
        stats
    }
}
