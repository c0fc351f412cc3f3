//! Functions to compute temperature from raw sensor values.
//!
//! The TC001 thermal plane stores, per pixel, a 14-bit
//! Kelvin reading multiplied by 16 and shifted left by two
//! bits. Both steps collapse into a single division:
//!
//! ```text
//! kelvin  = (raw >> 2) / 16 = raw / 64
//! celsius = raw / 64 - 273.15
//! ```
//!
//! Values are rounded to two decimals, which is the
//! resolution reported everywhere downstream.

const CELICIUS_OFFSET: f64 = 273.15;
const RAW_PER_KELVIN: f64 = 64.;

/// Recombine the two little-endian bytes of a thermal
/// plane pixel.
#[inline]
pub fn raw_from_bytes(lo: u8, hi: u8) -> u16 {
    (u16::from(hi) << 8) | u16::from(lo)
}

/// Convert a raw sensor count to degrees celsius, rounded
/// to two decimals.
#[inline]
pub fn raw_to_celsius(raw: u16) -> f64 {
    round_to(f64::from(raw) / RAW_PER_KELVIN - CELICIUS_OFFSET, 2)
}

/// Round half away from zero to `decimals` places.
#[inline]
pub fn round_to(val: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (val * factor).round() / factor
}
