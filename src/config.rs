//! Startup configuration.
//!
//! Defaults reproduce the stock TC001 setup. They can be
//! overridden by a JSON file named in the `TC001_CONFIG`
//! environment variable; any field left out keeps its
//! default:
//!
//! ```json
//! {
//!   "zones": [
//!     { "name": "Bench", "row_low": 40, "row_high": 90, "col_low": 100, "col_high": 180 }
//!   ],
//!   "telemetry_path": "bench.csv"
//! }
//! ```

use std::{env, fs::File, io::BufReader, io::Read, path::PathBuf, time::Duration};

use serde_derive::*;
use tracing::info;

use crate::error::{Error, Result};
use crate::frame::{SENSOR_HEIGHT, SENSOR_WIDTH};
use crate::telemetry::DEFAULT_INTERVAL;
use crate::zone::{default_zones, Zone, ZoneAnalyzer};

pub const CONFIG_ENV: &str = "TC001_CONFIG";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub width: usize,
    pub height: usize,
    pub zones: Vec<Zone>,
    pub telemetry_path: PathBuf,
    pub telemetry_interval_secs: u64,
    /// Directory receiving snapshots and recordings.
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            width: SENSOR_WIDTH,
            height: SENSOR_HEIGHT,
            zones: default_zones(),
            telemetry_path: "data.csv".into(),
            telemetry_interval_secs: DEFAULT_INTERVAL.as_secs(),
            output_dir: ".".into(),
        }
    }
}

impl Config {
    /// Defaults, or the file named by `TC001_CONFIG`.
    pub fn from_env() -> Result<Self> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => {
                let path = PathBuf::from(path);
                info!(path = %path.display(), "loading configuration");
                let file = File::open(&path)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                Config::from_reader(BufReader::new(file))
            }
            None => {
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        let config: Config =
            serde_json::from_reader(rdr).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Zones must fit the sensor; the interval must be
    /// positive.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "sensor size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.telemetry_interval_secs == 0 {
            return Err(Error::Config("telemetry interval must be positive".into()));
        }
        for zone in self.zones.iter() {
            zone.validate(self.height, self.width)?;
        }
        Ok(())
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_secs(self.telemetry_interval_secs)
    }

    pub fn analyzer(&self) -> Result<ZoneAnalyzer> {
        ZoneAnalyzer::new(self.zones.clone(), self.height, self.width)
    }
}
