use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{PanTiltError, PanTiltResult};
use crate::pwm::PwmBackend;
use super::calibration::{AxisCalibration, Saturation, DISABLED_DRIVE};
use super::Axis;

/// Clamp event counters, shared between the actuators of one controller
#[derive(Debug, Default)]
pub struct SaturationStats {
    high: AtomicU64,
    low: AtomicU64,
    disabled: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaturationCounts {
    pub high: u64,
    pub low: u64,
    pub disabled: u64,
}

impl SaturationStats {
    pub fn record(&self, kind: Saturation) {
        let counter = match kind {
            Saturation::High => &self.high,
            Saturation::Low => &self.low,
            Saturation::Disabled => &self.disabled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SaturationCounts {
        SaturationCounts {
            high: self.high.load(Ordering::Relaxed),
            low: self.low.load(Ordering::Relaxed),
            disabled: self.disabled.load(Ordering::Relaxed),
        }
    }
}

/// One servo axis bound to a PWM backend.
///
/// Holds no position state: `apply` is a pure transform followed by a
/// single backend call, so it is safe to call from several threads.
pub struct Actuator {
    axis: Axis,
    calibration: AxisCalibration,
    backend: Arc<dyn PwmBackend>,
    stats: Arc<SaturationStats>,
}

impl fmt::Debug for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actuator")
            .field("axis", &self.axis)
            .field("calibration", &self.calibration)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Actuator {
    pub fn new(
        axis: Axis,
        calibration: AxisCalibration,
        backend: Arc<dyn PwmBackend>,
        stats: Arc<SaturationStats>,
    ) -> PanTiltResult<Self> {
        calibration.validate(axis)?;
        Ok(Self {
            axis,
            calibration,
            backend,
            stats,
        })
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn calibration(&self) -> &AxisCalibration {
        &self.calibration
    }

    /// Drives the servo towards `logical_angle` and returns the drive value
    /// that was issued.
    ///
    /// Out-of-range angles are clamped, never rejected. Only a backend
    /// failure produces an error.
    pub fn apply(&self, logical_angle: f64) -> PanTiltResult<u16> {
        let decision = self.calibration.drive_for(logical_angle);

        if let Some(kind) = decision.saturation {
            self.stats.record(kind);
            log::warn!(
                "{} (pin {}): {} at {:.1}° -> raw {:.1}, sending {}",
                self.axis,
                self.calibration.pin,
                kind,
                logical_angle,
                decision.raw,
                decision.value
            );
        }

        self.write(decision.value)?;
        Ok(decision.value)
    }

    /// Drops the signal so the servo is released.
    pub fn disable(&self) -> PanTiltResult<()> {
        self.write(DISABLED_DRIVE)
    }

    fn write(&self, value: u16) -> PanTiltResult<()> {
        self.backend
            .set_drive(self.calibration.pin, value)
            .map_err(|source| PanTiltError::HardwareUnavailable {
                axis: self.axis,
                pin: self.calibration.pin,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pwm::MemoryBackend;

    fn pan(backend: &Arc<MemoryBackend>, stats: &Arc<SaturationStats>) -> Actuator {
        Actuator::new(
            Axis::Pan,
            AxisCalibration::new(6, 500, 2500),
            backend.clone(),
            stats.clone(),
        )
        .unwrap()
    }

    #[test]
    fn test_apply_issues_value_on_pin() {
        let backend = Arc::new(MemoryBackend::new());
        let stats = Arc::new(SaturationStats::default());
        let servo = pan(&backend, &stats);

        assert_eq!(servo.apply(0.0).unwrap(), 500);
        assert_eq!(servo.apply(210.0).unwrap(), 2500);
        assert_eq!(servo.apply(2.0).unwrap(), 519);
        assert_eq!(backend.values_for(6), vec![500, 2500, 519]);
        assert_eq!(stats.snapshot(), SaturationCounts::default());
    }

    #[test]
    fn test_clamp_events_are_counted_not_errors() {
        let backend = Arc::new(MemoryBackend::new());
        let stats = Arc::new(SaturationStats::default());
        let servo = pan(&backend, &stats);

        assert_eq!(servo.apply(500.0).unwrap(), 2500);
        assert_eq!(servo.apply(-5.0).unwrap(), 500);
        assert_eq!(servo.apply(-90.0).unwrap(), 0);
        assert_eq!(servo.apply(-91.0).unwrap(), 0);

        assert_eq!(
            stats.snapshot(),
            SaturationCounts { high: 1, low: 1, disabled: 2 }
        );
        assert_eq!(backend.values_for(6), vec![2500, 500, 0, 0]);
    }

    #[test]
    fn test_disable_sends_zero() {
        let backend = Arc::new(MemoryBackend::new());
        let stats = Arc::new(SaturationStats::default());
        let servo = pan(&backend, &stats);

        servo.disable().unwrap();
        assert_eq!(backend.last_value(6), Some(0));
    }

    #[test]
    fn test_backend_failure_names_axis_and_pin() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_pin(6);
        let stats = Arc::new(SaturationStats::default());
        let servo = pan(&backend, &stats);

        match servo.apply(90.0) {
            Err(PanTiltError::HardwareUnavailable { axis, pin, .. }) => {
                assert_eq!(axis, Axis::Pan);
                assert_eq!(pin, 6);
            }
            other => panic!("expected hardware error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_calibration_fails_fast() {
        let backend = Arc::new(MemoryBackend::new());
        let result = Actuator::new(
            Axis::Tilt,
            AxisCalibration::new(5, 2500, 500),
            backend.clone(),
            Arc::new(SaturationStats::default()),
        );
        assert!(matches!(result, Err(PanTiltError::InvalidCalibration { .. })));
        assert!(backend.records().is_empty());
    }
}
