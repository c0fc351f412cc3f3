mod args;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::{debug, info, warn};

use tc001::{
    app::{Readout, Session, Sinks, Surface},
    capture::V4lCapture,
    clock::Timestamp,
    keyboard::KeyEvents,
    logger,
    persist::{AviRecorder, PngSnapshots},
    telemetry::{CsvTelemetry, TelemetrySink},
    Config,
};

use args::Args;

/// Headless surface: reports the crosshair and frame
/// extrema once a second.
struct LogSurface {
    last: Option<Instant>,
}

impl Surface for LogSurface {
    fn show(&mut self, _frame: &RgbImage, _hud: &[String], readout: &Readout) {
        let now = Instant::now();
        if matches!(self.last, Some(t) if now - t < Duration::from_secs(1)) {
            return;
        }
        self.last = Some(now);
        info!(
            center = readout.center,
            max = readout.whole.max_value,
            min = readout.whole.min_value,
            avg = readout.whole.avg,
            "frame"
        );
    }

    fn resize(&mut self, width: u32, height: u32) {
        debug!(width, height, "resize");
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        debug!(fullscreen, "fullscreen");
    }
}

fn main() -> Result<()> {
    logger::init();
    let args = Args::from_cmd_line()?;
    let config = Config::from_env()?;

    let mut capture = V4lCapture::open_device(args.device, config.width, config.height)
        .context("could not start capture")?;
    info!(device = args.device, "capture opened");

    let telemetry = match CsvTelemetry::append_to(&config.telemetry_path) {
        Ok(sink) => Some(Box::new(sink) as Box<dyn TelemetrySink>),
        Err(e) => {
            warn!("telemetry disabled: {:#}", anyhow::Error::from(e));
            None
        }
    };
    let sinks = Sinks {
        surface: Box::new(LogSurface { last: None }),
        recorder: Box::new(AviRecorder::new(&config.output_dir)),
        snapshots: Box::new(PngSnapshots::new(&config.output_dir)),
        telemetry,
    };

    let keys = KeyEvents::stdin().context("could not read keyboard")?;
    keys.quit_on_signal().context("could not install termination handler")?;
    let mut session = Session::new(&config, sinks, Timestamp::now())?;
    session.run(&mut capture, || keys.poll());
    info!("session closed");
    Ok(())
}
