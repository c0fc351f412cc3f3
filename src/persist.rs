//! Snapshot and recording sinks.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use image::{imageops, imageops::FilterType, RgbImage};
use tracing::{info, warn};

use crate::avi::{Append, AviWriter, MAX_FILE_LEN};
use crate::error::{Error, Result};

/// Persists single rendered frames.
pub trait SnapshotSink {
    /// Save `frame`, returning the label shown on the HUD.
    fn save(&mut self, frame: &RgbImage, at: NaiveDateTime) -> Result<String>;
}

/// Streams rendered frames while a recording is active.
pub trait Recorder {
    fn start(&mut self, width: u32, height: u32, fps: u32, at: NaiveDateTime) -> Result<()>;
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;
    /// Close the active recording, if any. Idempotent.
    fn stop(&mut self) -> Result<()>;
    fn is_active(&self) -> bool;
}

/// `TC001{YYYYMMDD-HHMMSS}.png`
pub fn snapshot_file_name(at: NaiveDateTime) -> String {
    format!("TC001{}.png", at.format("%Y%m%d-%H%M%S"))
}

/// `{YYYYMMDD--HHMMSS}output.avi`
pub fn recording_file_name(at: NaiveDateTime) -> String {
    format!("{}output.avi", at.format("%Y%m%d--%H%M%S"))
}

/// Writes snapshots as 8-bit RGB PNGs into a directory.
pub struct PngSnapshots {
    dir: PathBuf,
}

impl PngSnapshots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PngSnapshots { dir: dir.into() }
    }
}

impl SnapshotSink for PngSnapshots {
    fn save(&mut self, frame: &RgbImage, at: NaiveDateTime) -> Result<String> {
        let path = self.dir.join(snapshot_file_name(at));
        write_png(&path, frame).map_err(|e| Error::persistence("snapshot", e))?;
        info!(path = %path.display(), "snapshot saved");
        Ok(at.format("%H:%M:%S").to_string())
    }
}

fn write_png(path: &Path, frame: &RgbImage) -> anyhow::Result<()> {
    let image_writer = BufWriter::new(File::create(path)?);
    let mut png_writer = {
        let (wid, ht) = frame.dimensions();
        let mut encoder = png::Encoder::new(image_writer, wid, ht);
        encoder.set_color(png::ColorType::RGB);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.write_header()?
    };
    png_writer.write_image_data(frame.as_raw())?;
    Ok(())
}

/// Records Motion-JPEG AVI files into a directory.
///
/// A recording that outgrows one file continues in numbered
/// segments: `{stamp}output.avi`, `{stamp}output-1.avi`, ...
pub struct AviRecorder {
    dir: PathBuf,
    limit: u64,
    active: Option<Segment>,
}

struct Segment {
    writer: AviWriter<BufWriter<File>>,
    started: NaiveDateTime,
    fps: u32,
    index: u32,
}

impl AviRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        AviRecorder::with_limit(dir, MAX_FILE_LEN)
    }

    /// Recorder starting a new segment once a file would
    /// exceed `limit` bytes.
    pub fn with_limit(dir: impl Into<PathBuf>, limit: u64) -> Self {
        AviRecorder {
            dir: dir.into(),
            limit,
            active: None,
        }
    }

    fn open_segment(
        &self,
        width: u32,
        height: u32,
        fps: u32,
        started: NaiveDateTime,
        index: u32,
    ) -> Result<Segment> {
        let path = self.dir.join(segment_file_name(started, index));
        let writer = File::create(&path)
            .and_then(|f| AviWriter::with_limit(BufWriter::new(f), width, height, fps, self.limit))
            .map_err(|e| Error::persistence("recording", e))?;
        info!(path = %path.display(), width, height, fps, "recording opened");
        Ok(Segment {
            writer,
            started,
            fps,
            index,
        })
    }

    /// Finish the full segment and open the next one.
    fn roll_over(&mut self) -> Result<()> {
        let (width, height, fps, started, index) = match self.active.as_ref() {
            Some(seg) => {
                let (width, height) = seg.writer.dimensions();
                (width, height, seg.fps, seg.started, seg.index + 1)
            }
            None => return Ok(()),
        };
        self.stop()?;
        self.active = Some(self.open_segment(width, height, fps, started, index)?);
        Ok(())
    }
}

/// Name of the `index`-th file of a recording.
fn segment_file_name(at: NaiveDateTime, index: u32) -> String {
    match index {
        0 => recording_file_name(at),
        n => format!("{}output-{}.avi", at.format("%Y%m%d--%H%M%S"), n),
    }
}

impl Recorder for AviRecorder {
    fn start(&mut self, width: u32, height: u32, fps: u32, at: NaiveDateTime) -> Result<()> {
        self.stop()?;
        self.active = Some(self.open_segment(width, height, fps, at, 0)?);
        Ok(())
    }

    /// Frames whose size differs from the recording (the
    /// scale changed mid-recording) are resized to fit.
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let (wid, ht) = match self.active.as_ref() {
            Some(seg) => seg.writer.dimensions(),
            None => return Ok(()),
        };
        let resized;
        let frame = if frame.dimensions() == (wid, ht) {
            frame
        } else {
            resized = imageops::resize(frame, wid, ht, FilterType::Triangle);
            &resized
        };

        for _ in 0..2 {
            let seg = match self.active.as_mut() {
                Some(seg) => seg,
                None => return Ok(()),
            };
            let appended = seg
                .writer
                .write_frame(frame)
                .map_err(|e| Error::persistence("recording", e))?;
            if appended == Append::Written {
                return Ok(());
            }
            self.roll_over()?;
        }
        Err(Error::persistence(
            "recording",
            "frame does not fit in a fresh segment",
        ))
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(mut seg) = self.active.take() {
            let frames = seg.writer.frames();
            seg.writer
                .finish()
                .map_err(|e| Error::persistence("recording", e))?;
            info!(frames, segment = seg.index, "recording closed");
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for AviRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{:#}", anyhow::Error::from(e));
        }
    }
}
