//! Split raw TC001 capture buffers into their visual and
//! thermal planes.
//!
//! A capture buffer holds two planes of `width * height`
//! two-byte pixels, one after the other:
//!
//! - `0x0..`: visual plane, YUYV interleaved luma/chroma
//! - `plane_len..`: thermal plane, raw sensor counts, low
//!   byte first
//!
//! Matrices are always indexed `(row, col)`.

use byteordered::ByteOrdered;
use ndarray::Array2;

use crate::error::{Error, Result};
use crate::temperature::raw_to_celsius;

/// Default sensor width of the TC001.
pub const SENSOR_WIDTH: usize = 256;
/// Default sensor height of the TC001.
pub const SENSOR_HEIGHT: usize = 192;

const BYTES_PER_PIXEL: usize = 2;

/// Calibrated celsius values, `height x width`.
pub type TemperatureMatrix = Array2<f64>;

/// Buffer as delivered by the capture device.
#[derive(Debug, Clone)]
pub struct RawFrame(pub Vec<u8>);

impl From<Vec<u8>> for RawFrame {
    fn from(bytes: Vec<u8>) -> Self {
        RawFrame(bytes)
    }
}

/// Displayable half of a frame, left untouched for the
/// renderer.
#[derive(Debug, Clone)]
pub struct VisualPlane {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl VisualPlane {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Luma of the pixel at `(row, col)`.
    #[inline]
    pub fn luma(&self, row: usize, col: usize) -> u8 {
        self.data[(row * self.width + col) * BYTES_PER_PIXEL]
    }
}

#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub visual: VisualPlane,
    pub temperatures: TemperatureMatrix,
}

/// Temperature at the centre of the sensor, used for the
/// crosshair readout.
pub fn center_temperature(matrix: &TemperatureMatrix) -> f64 {
    let (ht, wid) = matrix.dim();
    matrix[(ht / 2, wid / 2)]
}

#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    width: usize,
    height: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        FrameDecoder::new(SENSOR_WIDTH, SENSOR_HEIGHT)
    }
}

impl FrameDecoder {
    pub fn new(width: usize, height: usize) -> Self {
        FrameDecoder { width, height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes in one plane.
    pub fn plane_len(&self) -> usize {
        self.width * self.height * BYTES_PER_PIXEL
    }

    /// Bytes in a full capture buffer.
    pub fn frame_len(&self) -> usize {
        2 * self.plane_len()
    }

    pub fn decode(&self, frame: RawFrame) -> Result<DecodedFrame> {
        decode(frame, self.width, self.height)
    }
}

/// Decode a capture buffer for a `width x height` sensor.
///
/// Fails with [`Error::FrameFormat`] when the buffer is not
/// exactly two planes long; a mismatched frame is never
/// partially decoded.
pub fn decode(frame: RawFrame, width: usize, height: usize) -> Result<DecodedFrame> {
    let RawFrame(mut bytes) = frame;
    let plane_len = width * height * BYTES_PER_PIXEL;
    let format_error = |actual| Error::FrameFormat {
        expected: 2 * plane_len,
        actual,
        width,
        height,
    };
    if bytes.len() != 2 * plane_len {
        return Err(format_error(bytes.len()));
    }

    let thermal = bytes.split_off(plane_len);
    let mut rdr = ByteOrdered::le(&thermal[..]);
    let mut values = Vec::with_capacity(width * height);
    for _ in 0..width * height {
        let raw = rdr.read_u16().map_err(|_| format_error(thermal.len()))?;
        values.push(raw_to_celsius(raw));
    }

    let temperatures = Array2::from_shape_vec((height, width), values)
        .map_err(|_| format_error(2 * plane_len))?;
    let visual = VisualPlane {
        data: bytes,
        width,
        height,
    };
    Ok(DecodedFrame {
        visual,
        temperatures,
    })
}
