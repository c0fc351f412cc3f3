//! Minimal Motion-JPEG AVI writer.
//!
//! # Layout
//!
//! ```text
//! RIFF 'AVI '
//!   LIST 'hdrl'
//!     'avih'            main header (frame count patched on finish)
//!     LIST 'strl'
//!       'strh'          video stream header (length patched on finish)
//!       'strf'          BITMAPINFOHEADER, MJPG
//!   LIST 'movi'
//!     '00dc' ...        one JPEG per frame, padded to even size
//!   'idx1'              keyframe index, offsets relative to 'movi'
//! ```
//!
//! Sizes that are only known at the end are written as zero
//! and patched in [`AviWriter::finish`]. Dropping an
//! unfinished writer finishes it.
//!
//! All size fields are 32-bit. A writer stops accepting
//! frames before the file would grow past its limit
//! ([`MAX_FILE_LEN`] by default) and reports
//! [`Append::Full`]; callers continue in a new file.

use std::convert::TryFrom;
use std::io::{self, Seek, SeekFrom, Write};

use byteordered::ByteOrdered;
use image::{codecs::jpeg::JpegEncoder, ColorType, RgbImage};
use tracing::error;

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;
const JPEG_QUALITY: u8 = 90;
const INDEX_ENTRY_LEN: u64 = 16;

/// AVI 1.0 readers commonly refuse files past 1 GiB.
pub const MAX_FILE_LEN: u64 = 1 << 30;

/// Result of offering a frame to an [`AviWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    Written,
    /// The frame would push the file past its limit and was
    /// not written.
    Full,
}

fn to_u32(val: u64, what: &str) -> io::Result<u32> {
    u32::try_from(val).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} of {} does not fit an AVI size field", what, val),
        )
    })
}

struct IndexEntry {
    offset: u32,
    size: u32,
}

pub struct AviWriter<W: Write + Seek> {
    out: W,
    width: u32,
    height: u32,
    index: Vec<IndexEntry>,
    limit: u64,
    riff_size_pos: u64,
    total_frames_pos: u64,
    stream_length_pos: u64,
    movi_size_pos: u64,
    movi_start: u64,
    finished: bool,
}

impl<W: Write + Seek> AviWriter<W> {
    /// Write the headers for a `width x height` stream at
    /// `fps` frames per second.
    pub fn new(out: W, width: u32, height: u32, fps: u32) -> io::Result<Self> {
        AviWriter::with_limit(out, width, height, fps, MAX_FILE_LEN)
    }

    /// As [`new`](AviWriter::new), refusing frames once the
    /// file would exceed `limit` bytes.
    pub fn with_limit(mut out: W, width: u32, height: u32, fps: u32, limit: u64) -> io::Result<Self> {
        let fps = fps.max(1);

        out.write_all(b"RIFF")?;
        let riff_size_pos = out.stream_position()?;
        ByteOrdered::le(&mut out).write_u32(0)?;
        out.write_all(b"AVI ")?;

        // hdrl: 'hdrl' + avih chunk + strl list
        out.write_all(b"LIST")?;
        ByteOrdered::le(&mut out).write_u32(4 + (8 + 56) + (8 + 116))?;
        out.write_all(b"hdrl")?;

        out.write_all(b"avih")?;
        ByteOrdered::le(&mut out).write_u32(56)?;
        {
            let mut w = ByteOrdered::le(&mut out);
            w.write_u32(1_000_000 / fps)?; // microseconds per frame
            w.write_u32(width * height * 3 * fps)?; // max bytes per second
            w.write_u32(0)?; // padding granularity
            w.write_u32(AVIF_HASINDEX)?;
        }
        let total_frames_pos = out.stream_position()?;
        {
            let mut w = ByteOrdered::le(&mut out);
            w.write_u32(0)?; // total frames
            w.write_u32(0)?; // initial frames
            w.write_u32(1)?; // streams
            w.write_u32(width * height * 3)?; // suggested buffer size
            w.write_u32(width)?;
            w.write_u32(height)?;
            for _ in 0..4 {
                w.write_u32(0)?;
            }
        }

        // strl: 'strl' + strh chunk + strf chunk
        out.write_all(b"LIST")?;
        ByteOrdered::le(&mut out).write_u32(4 + (8 + 56) + (8 + 40))?;
        out.write_all(b"strl")?;

        out.write_all(b"strh")?;
        ByteOrdered::le(&mut out).write_u32(56)?;
        out.write_all(b"vids")?;
        out.write_all(b"MJPG")?;
        {
            let mut w = ByteOrdered::le(&mut out);
            w.write_u32(0)?; // flags
            w.write_u16(0)?; // priority
            w.write_u16(0)?; // language
            w.write_u32(0)?; // initial frames
            w.write_u32(1)?; // scale
            w.write_u32(fps)?; // rate
            w.write_u32(0)?; // start
        }
        let stream_length_pos = out.stream_position()?;
        {
            let mut w = ByteOrdered::le(&mut out);
            w.write_u32(0)?; // length in frames
            w.write_u32(width * height * 3)?; // suggested buffer size
            w.write_u32(u32::MAX)?; // quality: driver default
            w.write_u32(0)?; // sample size
            w.write_i16(0)?;
            w.write_i16(0)?;
            w.write_i16(width as i16)?;
            w.write_i16(height as i16)?;
        }

        out.write_all(b"strf")?;
        ByteOrdered::le(&mut out).write_u32(40)?;
        {
            let mut w = ByteOrdered::le(&mut out);
            w.write_u32(40)?;
            w.write_i32(width as i32)?;
            w.write_i32(height as i32)?;
            w.write_u16(1)?; // planes
            w.write_u16(24)?; // bit count
        }
        out.write_all(b"MJPG")?;
        {
            let mut w = ByteOrdered::le(&mut out);
            w.write_u32(width * height * 3)?;
            for _ in 0..4 {
                w.write_u32(0)?;
            }
        }

        out.write_all(b"LIST")?;
        let movi_size_pos = out.stream_position()?;
        ByteOrdered::le(&mut out).write_u32(0)?;
        let movi_start = out.stream_position()?;
        out.write_all(b"movi")?;

        Ok(AviWriter {
            out,
            width,
            height,
            index: vec![],
            limit: limit.min(u64::from(u32::MAX)),
            riff_size_pos,
            total_frames_pos,
            stream_length_pos,
            movi_size_pos,
            movi_start,
            finished: false,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames(&self) -> usize {
        self.index.len()
    }

    /// Append one frame. The frame must match the stream
    /// dimensions.
    pub fn write_frame(&mut self, frame: &RgbImage) -> io::Result<Append> {
        if self.finished {
            return Err(io::Error::new(io::ErrorKind::Other, "recording already finished"));
        }
        if frame.dimensions() != (self.width, self.height) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "frame is {:?}, stream is {:?}",
                    frame.dimensions(),
                    (self.width, self.height)
                ),
            ));
        }

        let mut jpeg = vec![];
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode(frame.as_raw(), self.width, self.height, ColorType::Rgb8)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        let pos = self.out.stream_position()?;
        let chunk_len = 8 + (jpeg.len() + jpeg.len() % 2) as u64;
        let index_len = 8 + INDEX_ENTRY_LEN * (self.index.len() as u64 + 1);
        if pos + chunk_len + index_len > self.limit {
            if self.index.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "frame does not fit in an empty recording",
                ));
            }
            return Ok(Append::Full);
        }
        let offset = to_u32(pos - self.movi_start, "frame offset")?;
        let size = to_u32(jpeg.len() as u64, "frame size")?;

        self.out.write_all(b"00dc")?;
        ByteOrdered::le(&mut self.out).write_u32(size)?;
        self.out.write_all(&jpeg)?;
        if jpeg.len() % 2 == 1 {
            self.out.write_all(&[0])?;
        }
        self.index.push(IndexEntry { offset, size });
        Ok(Append::Written)
    }

    /// Write the index and patch all deferred sizes.
    /// Idempotent. Fails rather than write a size that does
    /// not fit its field.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let movi_end = self.out.stream_position()?;
        let frames = to_u32(self.index.len() as u64, "frame count")?;
        let index_size = to_u32(INDEX_ENTRY_LEN * u64::from(frames), "index size")?;
        self.out.write_all(b"idx1")?;
        ByteOrdered::le(&mut self.out).write_u32(index_size)?;
        for entry in self.index.iter() {
            self.out.write_all(b"00dc")?;
            let mut w = ByteOrdered::le(&mut self.out);
            w.write_u32(AVIIF_KEYFRAME)?;
            w.write_u32(entry.offset)?;
            w.write_u32(entry.size)?;
        }
        let end = self.out.stream_position()?;

        let riff_size = to_u32(end - 8, "file size")?;
        let movi_size = to_u32(movi_end - self.movi_start, "movi size")?;
        self.patch(self.riff_size_pos, riff_size)?;
        self.patch(self.total_frames_pos, frames)?;
        self.patch(self.stream_length_pos, frames)?;
        self.patch(self.movi_size_pos, movi_size)?;

        self.out.seek(SeekFrom::Start(end))?;
        self.out.flush()
    }

    fn patch(&mut self, pos: u64, val: u32) -> io::Result<()> {
        self.out.seek(SeekFrom::Start(pos))?;
        ByteOrdered::le(&mut self.out).write_u32(val)
    }
}

impl<W: Write + Seek> Drop for AviWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            error!("failed to finalize recording: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::io::Cursor;
    use std::rc::Rc;

    fn u32_at(bytes: &[u8], pos: usize) -> u32 {
        u32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
    }

    fn frame(width: u32, height: u32, shade: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb([shade, 0, 255 - shade]))
    }

    #[test]
    fn headers_are_patched_on_finish() {
        let mut bytes = vec![];
        {
            let mut avi = AviWriter::new(Cursor::new(&mut bytes), 32, 24, 25).unwrap();
            for shade in [0u8, 128, 255].iter() {
                assert_eq!(avi.write_frame(&frame(32, 24, *shade)).unwrap(), Append::Written);
            }
            assert_eq!(avi.frames(), 3);
            avi.finish().unwrap();
        }

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4) as usize, bytes.len() - 8);
        assert_eq!(&bytes[8..12], b"AVI ");
        assert_eq!(&bytes[12..16], b"LIST");
        assert_eq!(&bytes[20..28], b"hdrlavih");
        // avih: us/frame, then total frames after three more words
        assert_eq!(u32_at(&bytes, 32), 40_000);
        assert_eq!(u32_at(&bytes, 48), 3);
        assert_eq!(u32_at(&bytes, 64), 32);
        assert_eq!(u32_at(&bytes, 68), 24);

        assert_eq!(&bytes[212..216], b"LIST");
        assert_eq!(&bytes[220..224], b"movi");
        assert_eq!(&bytes[224..228], b"00dc");

        let idx = bytes.len() - (8 + 3 * 16);
        assert_eq!(&bytes[idx..idx + 4], b"idx1");
        assert_eq!(u32_at(&bytes, idx + 4), 48);
        // first index entry points just past 'movi'
        assert_eq!(u32_at(&bytes, idx + 16), 4);
        // movi list spans up to the index
        assert_eq!(u32_at(&bytes, 216) as usize, idx - 220);
    }

    #[test]
    fn rejects_mismatched_frame() {
        let mut avi = AviWriter::new(Cursor::new(vec![]), 32, 24, 25).unwrap();
        assert!(avi.write_frame(&frame(16, 24, 0)).is_err());
        assert_eq!(avi.frames(), 0);
    }

    #[test]
    fn drop_finalizes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.avi");
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut avi = AviWriter::new(file, 8, 8, 25).unwrap();
            avi.write_frame(&frame(8, 8, 10)).unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(u32_at(&bytes, 4) as usize, bytes.len() - 8);
        assert_eq!(u32_at(&bytes, 48), 1);
    }

    #[test]
    fn stops_at_size_limit() {
        let mut bytes = vec![];
        let written = {
            let mut avi = AviWriter::with_limit(Cursor::new(&mut bytes), 8, 8, 25, 4096).unwrap();
            let mut written = 0;
            while avi.write_frame(&frame(8, 8, 10)).unwrap() == Append::Written {
                written += 1;
                assert!(written < 100);
            }
            assert_eq!(avi.frames(), written);
            avi.finish().unwrap();
            written
        };

        assert!(written >= 1);
        assert!(bytes.len() <= 4096);
        assert_eq!(u32_at(&bytes, 4) as usize, bytes.len() - 8);
        assert_eq!(u32_at(&bytes, 48) as usize, written);
    }

    #[test]
    fn first_frame_over_limit_is_an_error() {
        let mut avi = AviWriter::with_limit(Cursor::new(vec![]), 8, 8, 25, 300).unwrap();
        assert!(avi.write_frame(&frame(8, 8, 10)).is_err());
    }

    /// Seekable sink keeping only the bytes written. A
    /// pending `skip` moves the next write that far ahead.
    #[derive(Default)]
    struct Sparse {
        bytes: BTreeMap<u64, u8>,
        pos: u64,
        skip: Rc<Cell<u64>>,
    }

    impl Sparse {
        fn len(&self) -> u64 {
            self.bytes.keys().next_back().map_or(0, |last| last + 1)
        }

        fn u32_at(&self, pos: u64) -> u32 {
            let byte = |i: u64| self.bytes.get(&(pos + i)).copied().unwrap_or(0);
            u32::from_le_bytes([byte(0), byte(1), byte(2), byte(3)])
        }
    }

    impl Write for Sparse {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.pos += self.skip.replace(0);
            for (i, b) in buf.iter().enumerate() {
                self.bytes.insert(self.pos + i as u64, *b);
            }
            self.pos += buf.len() as u64;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for Sparse {
        fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
            self.pos = match to {
                SeekFrom::Start(pos) => pos,
                SeekFrom::Current(delta) => (self.pos as i64 + delta) as u64,
                SeekFrom::End(delta) => (self.len() as i64 + delta) as u64,
            };
            Ok(self.pos)
        }
    }

    #[test]
    fn oversized_file_is_never_patched_with_truncated_sizes() {
        let mut sink = Sparse::default();
        let skip = sink.skip.clone();
        {
            let mut avi = AviWriter::with_limit(&mut sink, 8, 8, 25, u64::MAX).unwrap();
            assert_eq!(avi.write_frame(&frame(8, 8, 10)).unwrap(), Append::Written);
            skip.set(4_500_000_000);
            assert_eq!(avi.write_frame(&frame(8, 8, 20)).unwrap(), Append::Written);
            // past the 32-bit limit: no more frames
            assert_eq!(avi.write_frame(&frame(8, 8, 30)).unwrap(), Append::Full);
            assert!(avi.finish().is_err());
        }
        assert!(sink.len() > 4_500_000_000);
        // the RIFF size is left unset rather than wrapped
        assert_eq!(sink.u32_at(4), 0);
    }
}
