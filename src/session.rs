//! Interactive display and recording parameters.
//!
//! A single [`SessionState`] is owned by the main loop and
//! only changed through the
//! [`InputDispatcher`](crate::input::InputDispatcher).

use std::time::{Duration, Instant};

use crate::colormap::Colormap;
use crate::frame::{SENSOR_HEIGHT, SENSOR_WIDTH};
use crate::temperature::round_to;

pub const MIN_SCALE: u32 = 1;
pub const MAX_SCALE: u32 = 5;
pub const MAX_CONTRAST: f64 = 3.0;
pub const RECORDING_FPS: u32 = 25;

const IDLE_ELAPSED: &str = "00:00:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    /// Recording since the given instant.
    Recording { since: Instant },
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) sensor_width: u32,
    pub(crate) sensor_height: u32,
    pub(crate) blur_radius: u32,
    pub(crate) threshold: u32,
    pub(crate) scale: u32,
    pub(crate) contrast: f64,
    pub(crate) colormap_index: usize,
    pub(crate) hud_visible: bool,
    pub(crate) fullscreen: bool,
    pub(crate) recording: RecordingState,
    pub(crate) elapsed_label: String,
    pub(crate) last_snapshot_label: String,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::new(SENSOR_WIDTH as u32, SENSOR_HEIGHT as u32)
    }
}

impl SessionState {
    pub fn new(sensor_width: u32, sensor_height: u32) -> Self {
        SessionState {
            sensor_width,
            sensor_height,
            blur_radius: 0,
            threshold: 2,
            scale: 3,
            contrast: 1.0,
            colormap_index: 0,
            hud_visible: true,
            fullscreen: false,
            recording: RecordingState::Idle,
            elapsed_label: IDLE_ELAPSED.into(),
            last_snapshot_label: "None".into(),
        }
    }

    pub fn blur_radius(&self) -> u32 {
        self.blur_radius
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn contrast(&self) -> f64 {
        self.contrast
    }

    pub fn colormap_index(&self) -> usize {
        self.colormap_index
    }

    pub fn colormap(&self) -> Colormap {
        Colormap::from_index(self.colormap_index)
    }

    pub fn hud_visible(&self) -> bool {
        self.hud_visible
    }

    pub fn fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn recording(&self) -> RecordingState {
        self.recording
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.recording, RecordingState::Recording { .. })
    }

    pub fn elapsed_label(&self) -> &str {
        &self.elapsed_label
    }

    pub fn last_snapshot_label(&self) -> &str {
        &self.last_snapshot_label
    }

    /// Output size after scaling, `(width, height)`.
    pub fn scaled_size(&self) -> (u32, u32) {
        (self.sensor_width * self.scale, self.sensor_height * self.scale)
    }

    pub(crate) fn step_blur(&mut self, up: bool) {
        self.blur_radius = step_floor_zero(self.blur_radius, up);
    }

    pub(crate) fn step_threshold(&mut self, up: bool) {
        self.threshold = step_floor_zero(self.threshold, up);
    }

    /// Returns whether the scale changed.
    pub(crate) fn step_scale(&mut self, up: bool) -> bool {
        let next = if up {
            (self.scale + 1).min(MAX_SCALE)
        } else {
            self.scale.saturating_sub(1).max(MIN_SCALE)
        };
        let changed = next != self.scale;
        self.scale = next;
        changed
    }

    pub(crate) fn step_contrast(&mut self, up: bool) {
        let delta = if up { 0.1 } else { -0.1 };
        self.contrast = round_to(self.contrast + delta, 1).max(0.).min(MAX_CONTRAST);
    }

    pub(crate) fn cycle_colormap(&mut self, table_len: usize) {
        self.colormap_index = (self.colormap_index + 1) % table_len;
    }

    /// `Idle -> Recording`. Returns `false` when already
    /// recording, in which case nothing changes.
    pub(crate) fn start_recording(&mut self, now: Instant) -> bool {
        if self.is_recording() {
            return false;
        }
        self.recording = RecordingState::Recording { since: now };
        self.elapsed_label = IDLE_ELAPSED.into();
        true
    }

    /// `Recording -> Idle`. Returns `false` when idle.
    pub(crate) fn stop_recording(&mut self) -> bool {
        if !self.is_recording() {
            return false;
        }
        self.recording = RecordingState::Idle;
        self.elapsed_label = IDLE_ELAPSED.into();
        true
    }

    pub(crate) fn record_snapshot(&mut self, label: String) {
        self.last_snapshot_label = label;
    }

    /// Refresh the elapsed label while recording.
    pub(crate) fn tick(&mut self, now: Instant) {
        if let RecordingState::Recording { since } = self.recording {
            self.elapsed_label = format_elapsed(now.saturating_duration_since(since));
        }
    }

    /// Lines of the on-screen menu, empty when the HUD is
    /// hidden.
    pub fn hud_lines(&self, avg_temp: f64) -> Vec<String> {
        if !self.hud_visible {
            return vec![];
        }
        vec![
            format!("Avg Temp: {} C", avg_temp),
            format!("Label Threshold: {} C", self.threshold),
            format!("Colormap: {}", self.colormap()),
            format!("Blur: {}", self.blur_radius),
            format!("Scaling: {}", self.scale),
            format!("Contrast: {:.1}", self.contrast),
            format!("Snapshot: {}", self.last_snapshot_label),
            format!("Recording: {}", self.elapsed_label),
        ]
    }
}

fn step_floor_zero(val: u32, up: bool) -> u32 {
    if up {
        val + 1
    } else {
        val.saturating_sub(1)
    }
}

/// `HH:MM:SS`; hours keep growing past 99.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
