//! The per-frame session loop.
//!
//! One iteration is: decode, analyze, render, dispatch the
//! input event, forward to the recorder, emit telemetry.
//! Persistence failures are logged and never stop the loop.

use image::RgbImage;
use tracing::{error, info, warn};

use crate::capture::CaptureDevice;
use crate::clock::Timestamp;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::{center_temperature, DecodedFrame, FrameDecoder, RawFrame};
use crate::input::{InputDispatcher, InputEvent, Request};
use crate::persist::{Recorder, SnapshotSink};
use crate::render::render;
use crate::session::SessionState;
use crate::telemetry::{TelemetrySink, TelemetryWriter};
use crate::zone::{ZoneAnalyzer, ZoneStats};

/// Whatever displays frames; windowing is out of our hands
/// so this only receives requests.
pub trait Surface {
    fn show(&mut self, frame: &RgbImage, hud: &[String], readout: &Readout);
    fn resize(&mut self, width: u32, height: u32);
    fn set_fullscreen(&mut self, fullscreen: bool);
}

/// Surface for headless runs.
#[derive(Debug, Default)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn show(&mut self, _frame: &RgbImage, _hud: &[String], _readout: &Readout) {}

    fn resize(&mut self, width: u32, height: u32) {
        info!(width, height, "resize requested");
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        info!(fullscreen, "fullscreen requested");
    }
}

/// External collaborators of a session.
pub struct Sinks {
    pub surface: Box<dyn Surface>,
    pub recorder: Box<dyn Recorder>,
    pub snapshots: Box<dyn SnapshotSink>,
    /// `None` disables telemetry.
    pub telemetry: Option<Box<dyn TelemetrySink>>,
}

/// Measurements of one frame.
#[derive(Debug, Clone)]
pub struct Readout {
    /// Temperature under the crosshair.
    pub center: f64,
    pub whole: ZoneStats,
    /// In zone configuration order.
    pub zones: Vec<ZoneStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Session {
    decoder: FrameDecoder,
    analyzer: ZoneAnalyzer,
    dispatcher: InputDispatcher,
    state: SessionState,
    telemetry: TelemetryWriter,
    sinks: Sinks,
    closed: bool,
}

impl Session {
    pub fn new(config: &Config, sinks: Sinks, start: Timestamp) -> Result<Self> {
        config.validate()?;
        Ok(Session {
            decoder: FrameDecoder::new(config.width, config.height),
            analyzer: config.analyzer()?,
            dispatcher: InputDispatcher::default(),
            state: SessionState::new(config.width as u32, config.height as u32),
            telemetry: TelemetryWriter::new(start.monotonic, config.telemetry_interval()),
            sinks,
            closed: false,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Decode and process one frame. A malformed frame is
    /// dropped with a warning and the event is not consumed.
    pub fn step(
        &mut self,
        frame: RawFrame,
        event: InputEvent,
        at: Timestamp,
    ) -> Result<(Flow, Readout)> {
        let decoded = self.decoder.decode(frame)?;
        Ok(self.process(&decoded, event, at))
    }

    /// Run one iteration over an already decoded frame.
    pub fn process(
        &mut self,
        decoded: &DecodedFrame,
        event: InputEvent,
        at: Timestamp,
    ) -> (Flow, Readout) {
        let temps = &decoded.temperatures;
        let readout = Readout {
            center: center_temperature(temps),
            whole: self.analyzer.whole_frame(temps),
            zones: self.analyzer.analyze(temps),
        };

        let frame = render(&decoded.visual, &self.state);
        let hud = self.state.hud_lines(readout.whole.avg);
        self.sinks.surface.show(&frame, &hud, &readout);

        let mut flow = Flow::Continue;
        if let Some(request) = self.dispatcher.apply(&mut self.state, event, at.monotonic) {
            flow = self.fulfil(request, &frame, at);
        }

        if self.state.is_recording() {
            if self.sinks.recorder.is_active() {
                self.state.tick(at.monotonic);
                if let Err(e) = self.sinks.recorder.write_frame(&frame) {
                    log_persistence(e);
                }
            } else {
                warn!("recorder closed underneath the session");
                self.state.stop_recording();
            }
        }

        if let Some(sink) = self.sinks.telemetry.as_mut() {
            let res = self.telemetry.poll(
                at.monotonic,
                at.wall,
                self.analyzer.zones(),
                &readout.zones,
                sink.as_mut(),
            );
            if let Err(e) = res {
                log_persistence(e);
            }
        }

        (flow, readout)
    }

    fn fulfil(&mut self, request: Request, frame: &RgbImage, at: Timestamp) -> Flow {
        match request {
            Request::Resize { width, height } => self.sinks.surface.resize(width, height),
            Request::Fullscreen(on) => {
                self.sinks.surface.set_fullscreen(on);
                if !on {
                    let (width, height) = self.state.scaled_size();
                    self.sinks.surface.resize(width, height);
                }
            }
            Request::StartRecording { width, height, fps } => {
                if let Err(e) = self.sinks.recorder.start(width, height, fps, at.wall) {
                    log_persistence(e);
                    self.state.stop_recording();
                }
            }
            Request::StopRecording => {
                if let Err(e) = self.sinks.recorder.stop() {
                    log_persistence(e);
                }
            }
            Request::Snapshot => match self.sinks.snapshots.save(frame, at.wall) {
                Ok(label) => self.state.record_snapshot(label),
                Err(e) => log_persistence(e),
            },
            Request::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Pump frames from `capture` until it closes or a quit
    /// event arrives. Events are polled every iteration but
    /// only consumed by a decoded frame, except quit, which
    /// ends the loop even while no frames arrive.
    pub fn run<C, F>(&mut self, capture: &mut C, mut next_event: F)
    where
        C: CaptureDevice + ?Sized,
        F: FnMut() -> InputEvent,
    {
        let mut pending = InputEvent::None;
        while capture.is_open() {
            if pending == InputEvent::None {
                pending = next_event();
            }
            if pending == InputEvent::Quit {
                info!("quit requested");
                break;
            }
            let frame = match capture.next_frame() {
                Some(frame) => frame,
                None => continue,
            };
            let decoded = match self.decoder.decode(frame) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("dropping frame: {}", e);
                    continue;
                }
            };
            let event = std::mem::replace(&mut pending, InputEvent::None);
            self.process(&decoded, event, Timestamp::now());
        }
        self.close();
    }

    /// Close the recorder and flush telemetry. Called on
    /// every exit path, including drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.state.stop_recording() {
            info!("recording stopped on shutdown");
        }
        if let Err(e) = self.sinks.recorder.stop() {
            log_persistence(e);
        }
        if let Some(sink) = self.sinks.telemetry.as_mut() {
            if let Err(e) = sink.flush() {
                log_persistence(e);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn log_persistence(e: Error) {
    error!("{:#}", anyhow::Error::from(e));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::AviRecorder;
    use crate::zone::Zone;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::telemetry::TelemetryRecord;
    use chrono::NaiveDateTime;

    #[derive(Default)]
    struct Log {
        frames_recorded: usize,
        recordings: Vec<(u32, u32, u32)>,
        stops: usize,
        snapshots: usize,
        rows: Vec<TelemetryRecord>,
        flushes: usize,
        resizes: Vec<(u32, u32)>,
        shown: usize,
    }

    type Shared = Arc<Mutex<Log>>;

    struct FakeSurface(Shared);
    impl Surface for FakeSurface {
        fn show(&mut self, _: &RgbImage, _: &[String], _: &Readout) {
            self.0.lock().unwrap().shown += 1;
        }
        fn resize(&mut self, width: u32, height: u32) {
            self.0.lock().unwrap().resizes.push((width, height));
        }
        fn set_fullscreen(&mut self, _: bool) {}
    }

    struct FakeRecorder {
        log: Shared,
        active: bool,
        fail: bool,
    }
    impl Recorder for FakeRecorder {
        fn start(&mut self, width: u32, height: u32, fps: u32, _: NaiveDateTime) -> Result<()> {
            if self.fail {
                return Err(Error::persistence("recording", "disk full"));
            }
            self.active = true;
            self.log.lock().unwrap().recordings.push((width, height, fps));
            Ok(())
        }
        fn write_frame(&mut self, _: &RgbImage) -> Result<()> {
            if self.active {
                self.log.lock().unwrap().frames_recorded += 1;
            }
            Ok(())
        }
        fn stop(&mut self) -> Result<()> {
            if self.active {
                self.active = false;
                self.log.lock().unwrap().stops += 1;
            }
            Ok(())
        }
        fn is_active(&self) -> bool {
            self.active
        }
    }

    struct FakeSnapshots(Shared);
    impl SnapshotSink for FakeSnapshots {
        fn save(&mut self, _: &RgbImage, at: NaiveDateTime) -> Result<String> {
            self.0.lock().unwrap().snapshots += 1;
            Ok(at.format("%H:%M:%S").to_string())
        }
    }

    struct FakeTelemetry(Shared);
    impl TelemetrySink for FakeTelemetry {
        fn append(&mut self, record: &TelemetryRecord) -> Result<()> {
            self.0.lock().unwrap().rows.push(record.clone());
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            self.0.lock().unwrap().flushes += 1;
            Ok(())
        }
    }

    fn small_config() -> Config {
        Config {
            width: 16,
            height: 12,
            zones: vec![
                Zone::new("Left", 0..12, 0..8),
                Zone::new("Right", 0..12, 8..16),
            ],
            ..Config::default()
        }
    }

    fn session(config: &Config, fail_recording: bool) -> (Session, Shared, Timestamp) {
        let log = Shared::default();
        let sinks = Sinks {
            surface: Box::new(FakeSurface(log.clone())),
            recorder: Box::new(FakeRecorder {
                log: log.clone(),
                active: false,
                fail: fail_recording,
            }),
            snapshots: Box::new(FakeSnapshots(log.clone())),
            telemetry: Some(Box::new(FakeTelemetry(log.clone()))),
        };
        let start = Timestamp::now();
        (Session::new(config, sinks, start).unwrap(), log, start)
    }

    fn frame(config: &Config, hot: (usize, usize)) -> RawFrame {
        let plane = config.width * config.height * 2;
        let mut bytes = vec![0u8; 2 * plane];
        let idx = plane + (hot.0 * config.width + hot.1) * 2;
        bytes[idx] = 0x40;
        bytes[idx + 1] = 0x44;
        RawFrame(bytes)
    }

    #[test]
    fn end_to_end_hot_pixel() {
        let config = Config::default();
        let (mut session, log, start) = session(&config, false);
        let (flow, readout) = session
            .step(frame(&config, (10, 20)), InputEvent::None, start)
            .unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(readout.whole.max_pos, (10, 20));
        assert_eq!(readout.whole.max_value, -0.15);
        assert_eq!(readout.whole.min_value, -273.15);
        assert_eq!(readout.whole.min_pos, (0, 0));
        assert_eq!(readout.center, -273.15);
        // Zone 1 covers (10, 20)
        assert_eq!(readout.zones[0].max_pos, (10, 20));
        assert_eq!(readout.zones[1].max_value, -273.15);

        let log = log.lock().unwrap();
        assert_eq!(log.shown, 1);
        assert_eq!(log.rows.len(), 5);
        assert_eq!(log.rows[0].max, -0.15);
    }

    #[test]
    fn malformed_frame_is_rejected() {
        let config = small_config();
        let (mut session, log, start) = session(&config, false);
        let res = session.step(RawFrame(vec![0; 10]), InputEvent::Quit, start);
        assert!(matches!(res, Err(Error::FrameFormat { .. })));
        assert_eq!(log.lock().unwrap().shown, 0);
    }

    #[test]
    fn recording_forwards_frames_until_stopped() {
        let config = small_config();
        let (mut session, log, start) = session(&config, false);
        let tick = |i: u64| start.advanced(Duration::from_millis(40 * i));

        session
            .step(frame(&config, (0, 0)), InputEvent::StartRecording, tick(0))
            .unwrap();
        for i in 1..=50 {
            session
                .step(frame(&config, (0, 0)), InputEvent::None, tick(i))
                .unwrap();
        }
        assert_eq!(session.state().elapsed_label(), "00:00:02");
        session
            .step(frame(&config, (0, 0)), InputEvent::StopRecording, tick(51))
            .unwrap();
        session
            .step(frame(&config, (0, 0)), InputEvent::None, tick(52))
            .unwrap();

        assert_eq!(session.state().elapsed_label(), "00:00:00");
        let log = log.lock().unwrap();
        assert_eq!(log.recordings, vec![(48, 36, 25)]);
        assert_eq!(log.frames_recorded, 51);
        assert_eq!(log.stops, 1);
    }

    #[test]
    fn failed_recording_start_returns_to_idle() {
        let config = small_config();
        let (mut session, log, start) = session(&config, true);
        session
            .step(frame(&config, (0, 0)), InputEvent::StartRecording, start)
            .unwrap();
        assert!(!session.state().is_recording());
        assert!(log.lock().unwrap().recordings.is_empty());
    }

    #[test]
    fn snapshot_updates_label() {
        let config = small_config();
        let (mut session, log, start) = session(&config, false);
        session
            .step(frame(&config, (0, 0)), InputEvent::TakeSnapshot, start)
            .unwrap();
        assert_eq!(
            session.state().last_snapshot_label(),
            start.wall.format("%H:%M:%S").to_string()
        );
        assert!(!session.state().is_recording());
        assert_eq!(log.lock().unwrap().snapshots, 1);
    }

    #[test]
    fn scale_change_resizes_surface() {
        let config = small_config();
        let (mut session, log, start) = session(&config, false);
        session
            .step(frame(&config, (0, 0)), InputEvent::IncreaseScale, start)
            .unwrap();
        assert_eq!(log.lock().unwrap().resizes, vec![(64, 48)]);
    }

    #[test]
    fn telemetry_once_per_interval() {
        let config = small_config();
        let (mut session, log, start) = session(&config, false);
        for i in 0..750 {
            let at = start.advanced(Duration::from_millis(40 * i));
            session
                .step(frame(&config, (0, 0)), InputEvent::None, at)
                .unwrap();
        }
        let log = log.lock().unwrap();
        assert_eq!(log.rows.len(), 6 * 2);
        assert_eq!(log.rows[0].zone, "Left");
        assert_eq!(log.rows[1].zone, "Right");
    }

    struct Frames {
        left: Vec<RawFrame>,
    }
    impl CaptureDevice for Frames {
        fn is_open(&self) -> bool {
            !self.left.is_empty()
        }
        fn next_frame(&mut self) -> Option<RawFrame> {
            self.left.pop()
        }
    }

    #[test]
    fn run_stops_on_quit_and_closes_recorder() {
        let config = small_config();
        let (mut session, log, _) = session(&config, false);
        let mut capture = Frames {
            left: (0..10).map(|_| frame(&config, (1, 1))).collect(),
        };
        // popped first, dropped without consuming an event
        capture.left.push(RawFrame(vec![1, 2, 3]));
        let mut events = vec![InputEvent::StartRecording, InputEvent::None, InputEvent::Quit]
            .into_iter();

        session.run(&mut capture, || events.next().unwrap_or(InputEvent::None));

        assert!(!session.state().is_recording());
        let log = log.lock().unwrap();
        assert_eq!(log.shown, 2);
        assert_eq!(log.stops, 1);
        assert!(log.flushes >= 1);
        // malformed + two processed frames; quit needs no frame
        assert_eq!(capture.left.len(), 8);
    }

    /// Open source that never delivers a frame.
    struct Stalled {
        polls: usize,
    }
    impl CaptureDevice for Stalled {
        fn is_open(&self) -> bool {
            self.polls < 10_000
        }
        fn next_frame(&mut self) -> Option<RawFrame> {
            self.polls += 1;
            None
        }
    }

    #[test]
    fn quit_ends_run_without_frames() {
        let config = small_config();
        let (mut session, log, _) = session(&config, false);
        let mut capture = Stalled { polls: 0 };
        let mut events = vec![InputEvent::None; 5].into_iter().chain(Some(InputEvent::Quit));

        session.run(&mut capture, || events.next().unwrap_or(InputEvent::None));

        assert_eq!(capture.polls, 5);
        assert_eq!(log.lock().unwrap().shown, 0);
    }

    #[test]
    fn recorder_closed_underneath_returns_to_idle() {
        let config = small_config();
        let (mut session, log, start) = session(&config, false);
        session
            .step(frame(&config, (0, 0)), InputEvent::StartRecording, start)
            .unwrap();
        session.sinks.recorder.stop().unwrap();
        session
            .step(frame(&config, (0, 0)), InputEvent::None, start)
            .unwrap();
        assert!(!session.state().is_recording());
        assert_eq!(log.lock().unwrap().frames_recorded, 1);
    }

    #[test]
    fn dropping_session_finalizes_recording() {
        let config = small_config();
        let dir = tempfile::tempdir().unwrap();
        let log = Shared::default();
        let sinks = Sinks {
            surface: Box::new(FakeSurface(log.clone())),
            recorder: Box::new(AviRecorder::new(dir.path())),
            snapshots: Box::new(FakeSnapshots(log.clone())),
            telemetry: None,
        };
        let start = Timestamp::now();
        {
            let mut session = Session::new(&config, sinks, start).unwrap();
            session
                .step(frame(&config, (0, 0)), InputEvent::StartRecording, start)
                .unwrap();
            for i in 1..4 {
                let at = start.advanced(Duration::from_millis(40 * i));
                session
                    .step(frame(&config, (i as usize, 0)), InputEvent::None, at)
                    .unwrap();
            }
            assert!(session.state().is_recording());
        }

        let recordings: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().map_or(false, |ext| ext == "avi"))
            .collect();
        assert_eq!(recordings.len(), 1);
        let bytes = std::fs::read(&recordings[0]).unwrap();
        let u32_at = |pos: usize| {
            u32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
        };
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(4) as usize, bytes.len() - 8);
        // avih total frames
        assert_eq!(u32_at(48), 4);
        assert_eq!(&bytes[bytes.len() - (8 + 4 * 16)..][..4], b"idx1");
    }
}
