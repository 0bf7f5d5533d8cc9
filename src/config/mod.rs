/**
 * Configuration
 *
 * Everything is plain JSON, loaded once at startup. Every field has a
 * default, so an empty object `{}` is a complete configuration:
 * pan servo on pin 6, tilt servo on pin 5, both 500..2500, 2 s pacing,
 * no offsets, pigpio daemon on localhost.
 */

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actuator::{Axis, AxisCalibration};
use crate::error::{PanTiltError, PanTiltResult};
use crate::pwm::pigpio::{DEFAULT_HOST, DEFAULT_PORT};
use crate::pwm::serial::DEFAULT_BAUD;

/// Ground location of the platform, degrees (north / east positive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocationFile {
    Wrapped { location_data: Location },
    Bare(Location),
}

impl Location {
    /// Reads `{"location_data": {"latitude": .., "longitude": ..}}` or a
    /// bare `{"latitude": .., "longitude": ..}` object.
    pub fn load<P: AsRef<Path>>(path: P) -> PanTiltResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> PanTiltResult<Self> {
        let location = match serde_json::from_str::<LocationFile>(text)? {
            LocationFile::Wrapped { location_data } => location_data,
            LocationFile::Bare(location) => location,
        };
        location.validate()?;
        Ok(location)
    }

    pub fn validate(&self) -> PanTiltResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(PanTiltError::Config(format!("latitude {} out of range", self.latitude)));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(PanTiltError::Config(format!("longitude {} out of range", self.longitude)));
        }
        Ok(())
    }
}

/// Construction-time settings of the controller. No runtime reconfiguration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub pan: AxisCalibration,
    pub tilt: AxisCalibration,
    /// Minimum time between two applied setpoints
    pub pacing_secs: f64,
    /// Mechanical zero correction, degrees
    pub pan_offset: f64,
    pub tilt_offset: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            pan: AxisCalibration::new(6, 500, 2500),
            tilt: AxisCalibration::new(5, 500, 2500),
            pacing_secs: 2.0,
            pan_offset: 0.0,
            tilt_offset: 0.0,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> PanTiltResult<()> {
        self.pan.validate(Axis::Pan)?;
        self.tilt.validate(Axis::Tilt)?;
        check_seconds("pacing_secs", self.pacing_secs)?;
        if !self.pan_offset.is_finite() || !self.tilt_offset.is_finite() {
            return Err(PanTiltError::Config("axis offsets must be finite".into()));
        }
        Ok(())
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_secs_f64(self.pacing_secs)
    }
}

/// Which PWM backend to drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Pigpio {
        #[serde(default = "default_pigpio_host")]
        host: String,
        #[serde(default = "default_pigpio_port")]
        port: u16,
        /// Launched when the daemon is not reachable; empty = never launch
        #[serde(default = "default_daemon_command")]
        daemon_command: Vec<String>,
        #[serde(default = "default_startup_timeout")]
        startup_timeout_secs: f64,
    },
    Serial {
        port: String,
        #[serde(default = "default_baud")]
        baud: u32,
    },
    /// Log drive values instead of touching hardware
    DryRun,
}

fn default_pigpio_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_pigpio_port() -> u16 {
    DEFAULT_PORT
}

fn default_daemon_command() -> Vec<String> {
    vec!["sudo".to_string(), "pigpiod".to_string()]
}

fn default_startup_timeout() -> f64 {
    5.0
}

fn default_baud() -> u32 {
    DEFAULT_BAUD
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Pigpio {
            host: default_pigpio_host(),
            port: default_pigpio_port(),
            daemon_command: default_daemon_command(),
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

/// Sun following
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub poll_interval_secs: f64,
    /// Compass bearing the middle of the pan travel points at
    pub heading_deg: f64,
    /// Keep issuing setpoints while the sun is below the horizon
    pub track_below_horizon: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60.0,
            heading_deg: 180.0,
            track_below_horizon: false,
        }
    }
}

/// Synthetic back-and-forth pattern for exercising the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub start_deg: f64,
    pub end_deg: f64,
    pub step_deg: f64,
    /// Pause after each batch of setpoints is queued
    pub rest_secs: f64,
    /// Hold the next batch back until the previous one has been applied
    pub wait_for_drain: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            start_deg: 0.0,
            end_deg: 180.0,
            step_deg: 1.0,
            rest_secs: 1.0,
            wait_for_drain: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(flatten)]
    pub controller: ControllerConfig,
    pub backend: BackendConfig,
    pub location: Option<Location>,
    pub tracker: TrackerConfig,
    pub sweep: SweepConfig,
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> PanTiltResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> PanTiltResult<Self> {
        let config: AppConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PanTiltResult<()> {
        self.controller.validate()?;
        if let Some(location) = &self.location {
            location.validate()?;
        }
        if let BackendConfig::Pigpio { startup_timeout_secs, .. } = &self.backend {
            check_seconds("startup_timeout_secs", *startup_timeout_secs)?;
        }
        check_seconds("tracker.poll_interval_secs", self.tracker.poll_interval_secs)?;
        check_seconds("sweep.rest_secs", self.sweep.rest_secs)?;
        if !(self.sweep.step_deg > 0.0) || !self.sweep.step_deg.is_finite() {
            return Err(PanTiltError::Config("sweep.step_deg must be positive".into()));
        }
        if !self.sweep.start_deg.is_finite() || !self.sweep.end_deg.is_finite() {
            return Err(PanTiltError::Config("sweep bounds must be finite".into()));
        }
        Ok(())
    }
}

fn check_seconds(name: &str, value: f64) -> PanTiltResult<()> {
    // Duration::from_secs_f64 panics outside this range
    if !value.is_finite() || value < 0.0 || value > 1.0e9 {
        return Err(PanTiltError::Config(format!("{} must be a non-negative number of seconds, got {}", name, value)));
    }
    Ok(())
}
