use std::time::Duration;

use time::OffsetDateTime;

use crate::actuator::FULL_SWEEP_DEGREES;
use crate::config::{Location, TrackerConfig};
use crate::setpoint::SetpointCommand;
use super::ephemeris::{Ephemeris, SolarPosition};
use super::SetpointSource;

/// Points the platform at the sun once per poll interval.
///
/// Pan travel is centred on `heading_deg`: an azimuth equal to the heading
/// maps to the middle of the servo range. Tilt follows the sun altitude
/// directly.
pub struct SolarTracker<E: Ephemeris> {
    ephemeris: E,
    location: Location,
    config: TrackerConfig,
    last: Option<SolarPosition>,
}

impl<E: Ephemeris> SolarTracker<E> {
    pub fn new(ephemeris: E, location: Location, config: TrackerConfig) -> Self {
        SolarTracker {
            ephemeris,
            location,
            config,
            last: None,
        }
    }

    pub fn last_position(&self) -> Option<SolarPosition> {
        self.last
    }

    pub fn position(&self, now: OffsetDateTime) -> SolarPosition {
        self.ephemeris.position(self.location.latitude, self.location.longitude, now)
    }

    pub fn to_setpoint(&self, pos: &SolarPosition) -> SetpointCommand {
        // bearing relative to the heading, wrapped to [-180, 180)
        let relative = (pos.azimuth_deg - self.config.heading_deg + 180.0).rem_euclid(360.0) - 180.0;
        SetpointCommand::new(relative + FULL_SWEEP_DEGREES / 2.0, pos.altitude_deg)
    }
}

impl<E: Ephemeris> SetpointSource for SolarTracker<E> {
    fn name(&self) -> &str {
        "solar"
    }

    fn next_batch(&mut self, now: OffsetDateTime) -> Vec<SetpointCommand> {
        let pos = self.position(now);
        self.last = Some(pos);

        if !pos.is_above_horizon() && !self.config.track_below_horizon {
            log::debug!("sun below horizon ({:.1}°), holding", pos.altitude_deg);
            return Vec::new();
        }

        let cmd = self.to_setpoint(&pos);
        log::info!(
            "sun az {:.1}° alt {:.1}° ({:.0} W/m²) -> pan {:.1}° tilt {:.1}°",
            pos.azimuth_deg,
            pos.altitude_deg,
            pos.irradiance,
            cmd.pan_angle,
            cmd.tilt_angle
        );
        vec![cmd]
    }

    fn rest(&self) -> Duration {
        Duration::from_secs_f64(self.config.poll_interval_secs)
    }
}
