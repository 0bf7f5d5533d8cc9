/**
 * Axis calibration
 *
 * Maps a logical angle in [0, FULL_SWEEP_DEGREES] linearly onto the drive
 * range [min_drive, max_drive] of one servo, then clamps the result.
 *
 * Clamp order (first match wins):
 *   raw > max_drive          -> max_drive   (saturated high)
 *   0 < raw < min_drive      -> min_drive   (saturated low)
 *   raw < 0                  -> 0           (output disabled, servo released)
 *   otherwise                -> trunc(raw)
 */

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PanTiltError, PanTiltResult};
use crate::pwm::PinId;
use super::Axis;

/// Physical travel of the servos, in degrees
pub const FULL_SWEEP_DEGREES: f64 = 210.0;

/// Drive value understood by the backend as "signal off"
pub const DISABLED_DRIVE: u16 = 0;

/// Per-axis servo wiring and pulse range.
///
/// Field aliases accept the `pwm_pin` / `low_duty` / `high_duty` naming used
/// by older servo definition files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisCalibration {
    #[serde(alias = "pwm_pin")]
    pub pin: PinId,
    #[serde(alias = "low_duty")]
    pub min_drive: u16,
    #[serde(alias = "high_duty")]
    pub max_drive: u16,
}

/// Which clamp branch fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Saturation {
    High,
    Low,
    Disabled,
}

impl fmt::Display for Saturation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Saturation::High => "saturated high",
            Saturation::Low => "saturated low",
            Saturation::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

/// Result of mapping one logical angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveDecision {
    /// Unclamped linear mapping
    pub raw: f64,
    /// Value to send to the backend
    pub value: u16,
    pub saturation: Option<Saturation>,
}

impl AxisCalibration {
    pub fn new(pin: PinId, min_drive: u16, max_drive: u16) -> Self {
        Self { pin, min_drive, max_drive }
    }

    /// Rejects `min_drive > max_drive`.
    pub fn validate(&self, axis: Axis) -> PanTiltResult<()> {
        if self.min_drive > self.max_drive {
            return Err(PanTiltError::InvalidCalibration {
                axis,
                min_drive: self.min_drive,
                max_drive: self.max_drive,
            });
        }
        Ok(())
    }

    pub fn raw_drive(&self, logical_angle: f64) -> f64 {
        let min = self.min_drive as f64;
        let max = self.max_drive as f64;
        min + (logical_angle / FULL_SWEEP_DEGREES) * (max - min)
    }

    pub fn drive_for(&self, logical_angle: f64) -> DriveDecision {
        let raw = self.raw_drive(logical_angle);
        let min = self.min_drive as f64;
        let max = self.max_drive as f64;

        let (value, saturation) = if raw > max {
            (self.max_drive, Some(Saturation::High))
        } else if raw < min && raw > 0.0 {
            (self.min_drive, Some(Saturation::Low))
        } else if raw < 0.0 || raw.is_nan() {
            (DISABLED_DRIVE, Some(Saturation::Disabled))
        } else {
            // 0 <= raw <= max_drive here, so the cast cannot wrap
            (raw.trunc() as u16, None)
        };

        DriveDecision { raw, value, saturation }
    }
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self {
            pin: 0,
            min_drive: 500,
            max_drive: 2500,
        }
    }
}
