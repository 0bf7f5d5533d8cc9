/**
 * Actuator Module
 *
 * One `Actuator` per physical axis:
 * - maps a logical angle to a clamped drive value (calibration)
 * - reports clamp events to the shared saturation counters
 * - issues the drive value to the PWM backend
 */

pub mod calibration;
pub mod servo;

pub use calibration::{AxisCalibration, DriveDecision, Saturation, DISABLED_DRIVE, FULL_SWEEP_DEGREES};
pub use servo::{Actuator, SaturationCounts, SaturationStats};

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Pan,
    Tilt,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Pan => f.write_str("pan"),
            Axis::Tilt => f.write_str("tilt"),
        }
    }
}
