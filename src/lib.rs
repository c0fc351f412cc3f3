//! Live viewer and logger for the TOPDON TC001 thermal
//! camera.
//!
//! The camera delivers each frame as two stacked planes of
//! `256 x 192` two-byte pixels: a visual (YUYV) plane and a
//! thermal plane of little-endian raw sensor values. This
//! crate provides:
//!
//! 1. [Decoding](frame::FrameDecoder) frames into a
//! displayable plane and a [temperature] matrix in celsius.
//!
//! 2. Per-[zone] statistics: average, and minimum and
//! maximum with their `(row, col)` positions.
//!
//! 3. An interactive [session](app::Session) driven by
//! [key events](input::InputEvent): rendering controls,
//! snapshots, MJPEG recordings and periodic CSV
//! [telemetry].
//!
//! # Usage
//!
//! ```rust
//! # fn test_compile() -> anyhow::Result<()> {
//! use tc001::{FrameDecoder, RawFrame, ZoneAnalyzer, default_zones};
//!
//! let decoder = FrameDecoder::default();
//! let frame = decoder.decode(RawFrame(vec![0; decoder.frame_len()]))?;
//!
//! let analyzer = ZoneAnalyzer::new(default_zones(), decoder.height(), decoder.width())?;
//! for stats in analyzer.analyze(&frame.temperatures) {
//!     println!("{:.2} {:?}", stats.avg, stats.max_pos);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Whole sessions are put together from a [`Config`] and a
//! set of [sinks](app::Sinks); see the `tc001` binary.

pub mod error;
pub mod logger;

pub mod temperature;
pub mod frame;
pub mod stats;
pub mod zone;

pub mod colormap;
pub mod clock;
pub mod session;
pub mod input;
pub mod keyboard;
pub mod render;

pub mod avi;
pub mod persist;
pub mod telemetry;
pub mod capture;

pub mod config;
pub mod app;
pub mod cli;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::frame::{DecodedFrame, FrameDecoder, RawFrame, TemperatureMatrix};
pub use crate::zone::{default_zones, Zone, ZoneAnalyzer, ZoneStats};
