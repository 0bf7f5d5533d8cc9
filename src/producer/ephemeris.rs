//! Sun position source used by the solar tracker.

use std::f64::consts::PI;

use time::{OffsetDateTime, UtcOffset};

/// Where the sun is, seen from one ground location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPosition {
    /// Degrees above the horizon (negative at night)
    pub altitude_deg: f64,
    /// Degrees clockwise from true north
    pub azimuth_deg: f64,
    /// Direct-beam irradiance, W/m²
    pub irradiance: f64,
}

impl SolarPosition {
    pub fn is_above_horizon(&self) -> bool {
        self.altitude_deg > 0.0
    }
}

pub trait Ephemeris: Send + Sync {
    fn position(&self, latitude: f64, longitude: f64, time: OffsetDateTime) -> SolarPosition;
}

/// Low-precision analytic model (fractional-year series for declination
/// and equation of time). Good to a fraction of a degree, which is well
/// below servo resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxSolarEphemeris;

impl Ephemeris for ApproxSolarEphemeris {
    fn position(&self, latitude: f64, longitude: f64, time: OffsetDateTime) -> SolarPosition {
        let utc = time.to_offset(UtcOffset::UTC);
        let day = utc.ordinal() as f64;
        let minutes = utc.hour() as f64 * 60.0 + utc.minute() as f64 + utc.second() as f64 / 60.0;

        let gamma = 2.0 * PI / 365.0 * (day - 1.0 + (minutes / 60.0 - 12.0) / 24.0);

        let eq_time = 229.18
            * (0.000075 + 0.001868 * gamma.cos()
                - 0.032077 * gamma.sin()
                - 0.014615 * (2.0 * gamma).cos()
                - 0.040849 * (2.0 * gamma).sin());

        let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
            - 0.006758 * (2.0 * gamma).cos()
            + 0.000907 * (2.0 * gamma).sin()
            - 0.002697 * (3.0 * gamma).cos()
            + 0.00148 * (3.0 * gamma).sin();

        let true_solar_minutes = minutes + eq_time + 4.0 * longitude;
        let hour_angle = (true_solar_minutes / 4.0 - 180.0).to_radians();
        let lat = latitude.to_radians();

        let cos_zenith = (lat.sin() * decl.sin() + lat.cos() * decl.cos() * hour_angle.cos()).clamp(-1.0, 1.0);
        let altitude_deg = 90.0 - cos_zenith.acos().to_degrees();

        // measured from south, then shifted to a north reference
        let from_south = hour_angle.sin().atan2(hour_angle.cos() * lat.sin() - decl.tan() * lat.cos());
        let azimuth_deg = (from_south.to_degrees() + 180.0).rem_euclid(360.0);

        SolarPosition {
            altitude_deg,
            azimuth_deg,
            irradiance: direct_irradiance(day, altitude_deg),
        }
    }
}

/// Clear-sky direct-beam irradiance for a day of year and sun altitude.
pub fn direct_irradiance(day_of_year: f64, altitude_deg: f64) -> f64 {
    if altitude_deg <= 0.0 {
        return 0.0;
    }
    let flux = 1160.0 + 75.0 * (2.0 * PI / 365.0 * (day_of_year - 275.0)).sin();
    let optical_depth = 0.174 + 0.035 * (2.0 * PI / 365.0 * (day_of_year - 100.0)).sin();
    let air_mass = 1.0 / altitude_deg.to_radians().sin();
    flux * (-optical_depth * air_mass).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const LONDON: (f64, f64) = (51.5, -0.12);

    #[test]
    fn test_london_summer_solstice_noon() {
        let pos = ApproxSolarEphemeris.position(LONDON.0, LONDON.1, datetime!(2024-06-21 12:00 UTC));
        // 90 - 51.5 + 23.44
        assert!((pos.altitude_deg - 61.9).abs() < 1.5, "altitude {}", pos.altitude_deg);
        assert!((pos.azimuth_deg - 180.0).abs() < 5.0, "azimuth {}", pos.azimuth_deg);
        assert!(pos.irradiance > 800.0 && pos.irradiance < 1200.0, "irradiance {}", pos.irradiance);
    }

    #[test]
    fn test_equator_equinox_sun_overhead() {
        let pos = ApproxSolarEphemeris.position(0.0, 0.0, datetime!(2024-03-20 12:07 UTC));
        assert!(pos.altitude_deg > 85.0, "altitude {}", pos.altitude_deg);
    }

    #[test]
    fn test_morning_sun_is_in_the_east() {
        let pos = ApproxSolarEphemeris.position(LONDON.0, LONDON.1, datetime!(2024-06-21 07:00 UTC));
        assert!(pos.is_above_horizon());
        assert!(pos.azimuth_deg > 45.0 && pos.azimuth_deg < 135.0, "azimuth {}", pos.azimuth_deg);
    }

    #[test]
    fn test_local_offset_is_normalised() {
        let utc = ApproxSolarEphemeris.position(LONDON.0, LONDON.1, datetime!(2024-06-21 12:00 UTC));
        let bst = ApproxSolarEphemeris.position(LONDON.0, LONDON.1, datetime!(2024-06-21 13:00 +1));
        assert!((utc.altitude_deg - bst.altitude_deg).abs() < 1e-9);
    }

    #[test]
    fn test_night_has_no_irradiance() {
        let pos = ApproxSolarEphemeris.position(LONDON.0, LONDON.1, datetime!(2024-12-21 00:00 UTC));
        assert!(!pos.is_above_horizon());
        assert_eq!(pos.irradiance, 0.0);
    }
}
