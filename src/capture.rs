//! Frame sources.
//!
//! The TC001 enumerates as a UVC camera delivering YUYV
//! frames of `width x 2*height`: the visual plane stacked
//! on the thermal plane. Frames are pulled through V4L2
//! memory-mapped streaming.

use std::io::{self, ErrorKind};
use std::time::Duration;

use tracing::{debug, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use crate::error::{Error, Result};
use crate::frame::RawFrame;

/// Consecutive hard read failures after which a source is
/// considered gone.
pub const MAX_READ_FAILURES: u32 = 25;

const STREAM_BUFFERS: u32 = 4;
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

pub trait CaptureDevice {
    /// `false` once the source is exhausted.
    fn is_open(&self) -> bool;

    /// Next full frame, or `None` if none could be read
    /// this time around.
    fn next_frame(&mut self) -> Option<RawFrame>;
}

/// Anything handing out one raw buffer per call.
pub trait FrameStream {
    fn next_buffer(&mut self) -> io::Result<Vec<u8>>;
}

/// Applies the read-error policy on top of a [`FrameStream`]:
///
/// - end of stream closes the source;
/// - timeouts and interrupts yield no frame;
/// - other errors yield no frame, and the source closes
///   after [`MAX_READ_FAILURES`] of them in a row.
pub struct StreamCapture<S> {
    stream: S,
    failures: u32,
    open: bool,
}

impl<S: FrameStream> StreamCapture<S> {
    pub fn new(stream: S) -> Self {
        StreamCapture {
            stream,
            failures: 0,
            open: true,
        }
    }
}

impl<S: FrameStream> CaptureDevice for StreamCapture<S> {
    fn is_open(&self) -> bool {
        self.open
    }

    fn next_frame(&mut self) -> Option<RawFrame> {
        if !self.open {
            return None;
        }
        match self.stream.next_buffer() {
            Ok(buf) => {
                self.failures = 0;
                Some(RawFrame(buf))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("capture source exhausted");
                self.open = false;
                None
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                ) =>
            {
                None
            }
            Err(e) => {
                self.failures += 1;
                warn!(failures = self.failures, "capture read failed: {}", e);
                if self.failures >= MAX_READ_FAILURES {
                    warn!("giving up on capture source");
                    self.open = false;
                }
                None
            }
        }
    }
}

/// V4L2 memory-mapped capture stream.
pub struct V4lStream {
    stream: MmapStream<'static>,
}

impl FrameStream for V4lStream {
    fn next_buffer(&mut self) -> io::Result<Vec<u8>> {
        let (buf, meta) = self.stream.next()?;
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        Ok(buf[..used].to_vec())
    }
}

pub type V4lCapture = StreamCapture<V4lStream>;

impl V4lCapture {
    /// Open `/dev/video{index}` and start streaming YUYV
    /// frames for a `width x height` sensor.
    pub fn open_device(index: u32, width: usize, height: usize) -> Result<Self> {
        let device = format!("/dev/video{}", index);
        let capture_error = |source| Error::Capture {
            device: device.clone(),
            source,
        };

        let dev = Device::new(index as usize).map_err(capture_error)?;
        let mut fmt = dev.format().map_err(capture_error)?;
        fmt.width = width as u32;
        fmt.height = 2 * height as u32;
        fmt.fourcc = FourCC::new(b"YUYV");
        let actual = dev.set_format(&fmt).map_err(capture_error)?;
        if (actual.width, actual.height) != (fmt.width, fmt.height) || actual.fourcc != fmt.fourcc {
            return Err(capture_error(io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "device negotiated {}x{} {}, expected {}x{} YUYV",
                    actual.width, actual.height, actual.fourcc, fmt.width, fmt.height
                ),
            )));
        }

        let mut stream = MmapStream::with_buffers(&dev, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(capture_error)?;
        stream.set_timeout(DEQUEUE_TIMEOUT);
        Ok(StreamCapture::new(V4lStream { stream }))
    }
}
