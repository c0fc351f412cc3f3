//! Input events and their effect on the session.

use std::time::Instant;

use tracing::info;

use crate::colormap::Colormap;
use crate::session::{SessionState, RECORDING_FPS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    IncreaseBlur,
    DecreaseBlur,
    IncreaseThreshold,
    DecreaseThreshold,
    IncreaseScale,
    DecreaseScale,
    IncreaseContrast,
    DecreaseContrast,
    EnterFullscreen,
    ExitFullscreen,
    ToggleHud,
    CycleColormap,
    StartRecording,
    StopRecording,
    TakeSnapshot,
    Quit,
    None,
}

const KEY_ESCAPE: u8 = 27;

impl InputEvent {
    /// Translate a keyboard key into an event using the
    /// stock TC001 bindings.
    pub fn from_key(key: u8) -> Self {
        match key {
            b'a' => InputEvent::IncreaseBlur,
            b'z' => InputEvent::DecreaseBlur,
            b's' => InputEvent::IncreaseThreshold,
            b'x' => InputEvent::DecreaseThreshold,
            b'd' => InputEvent::IncreaseScale,
            b'c' => InputEvent::DecreaseScale,
            b'f' => InputEvent::IncreaseContrast,
            b'v' => InputEvent::DecreaseContrast,
            b'q' => InputEvent::EnterFullscreen,
            b'w' => InputEvent::ExitFullscreen,
            b'h' => InputEvent::ToggleHud,
            b'm' => InputEvent::CycleColormap,
            b'r' => InputEvent::StartRecording,
            b't' => InputEvent::StopRecording,
            b'p' => InputEvent::TakeSnapshot,
            KEY_ESCAPE => InputEvent::Quit,
            _ => InputEvent::None,
        }
    }
}

/// Work the session loop must carry out on behalf of a
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Resize { width: u32, height: u32 },
    Fullscreen(bool),
    StartRecording { width: u32, height: u32, fps: u32 },
    StopRecording,
    Snapshot,
    Quit,
}

#[derive(Debug, Clone, Copy)]
pub struct InputDispatcher {
    colormaps: usize,
}

impl Default for InputDispatcher {
    fn default() -> Self {
        InputDispatcher::new(Colormap::ALL.len())
    }
}

impl InputDispatcher {
    /// Dispatcher cycling through `colormaps` entries.
    pub fn new(colormaps: usize) -> Self {
        InputDispatcher {
            colormaps: colormaps.max(1),
        }
    }

    /// Apply one event to `state`. Out-of-range adjustments
    /// are absorbed by clamping.
    pub fn apply(&self, state: &mut SessionState, event: InputEvent, now: Instant) -> Option<Request> {
        match event {
            InputEvent::IncreaseBlur | InputEvent::DecreaseBlur => {
                state.step_blur(event == InputEvent::IncreaseBlur)
            }
            InputEvent::IncreaseThreshold | InputEvent::DecreaseThreshold => {
                state.step_threshold(event == InputEvent::IncreaseThreshold)
            }
            InputEvent::IncreaseScale | InputEvent::DecreaseScale => {
                if state.step_scale(event == InputEvent::IncreaseScale) && !state.fullscreen {
                    let (width, height) = state.scaled_size();
                    return Some(Request::Resize { width, height });
                }
            }
            InputEvent::IncreaseContrast | InputEvent::DecreaseContrast => {
                state.step_contrast(event == InputEvent::IncreaseContrast)
            }
            InputEvent::EnterFullscreen | InputEvent::ExitFullscreen => {
                state.fullscreen = event == InputEvent::EnterFullscreen;
                return Some(Request::Fullscreen(state.fullscreen));
            }
            InputEvent::ToggleHud => state.hud_visible = !state.hud_visible,
            InputEvent::CycleColormap => state.cycle_colormap(self.colormaps),
            InputEvent::StartRecording => {
                if state.start_recording(now) {
                    let (width, height) = state.scaled_size();
                    info!(width, height, "recording started");
                    return Some(Request::StartRecording {
                        width,
                        height,
                        fps: RECORDING_FPS,
                    });
                }
            }
            InputEvent::StopRecording => {
                if state.stop_recording() {
                    info!("recording stopped");
                    return Some(Request::StopRecording);
                }
            }
            InputEvent::TakeSnapshot => return Some(Request::Snapshot),
            InputEvent::Quit => return Some(Request::Quit),
            InputEvent::None => (),
        }
        None
    }
}
