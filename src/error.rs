//! Error types shared by the controller, the actuators and the PWM backends.

use thiserror::Error;

use crate::actuator::Axis;

pub type PanTiltResult<T> = Result<T, PanTiltError>;

/// Failure reported by a PWM backend for a single call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend could not be reached (daemon down, link closed)
    #[error("PWM backend unreachable: {0}")]
    Unreachable(String),

    /// Backend answered but refused the request
    #[error("PWM backend rejected pin {pin}: code {code}")]
    Rejected { pin: u8, code: i32 },

    #[error("PWM backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial link error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Errors surfaced by the pan/tilt subsystem.
///
/// Clamped angles are never errors; only hardware failures and broken
/// construction invariants end up here.
#[derive(Debug, Error)]
pub enum PanTiltError {
    #[error("hardware unavailable on {axis} axis (pin {pin}): {source}")]
    HardwareUnavailable {
        axis: Axis,
        pin: u8,
        #[source]
        source: BackendError,
    },

    #[error("invalid calibration for {axis} axis: min_drive {min_drive} > max_drive {max_drive}")]
    InvalidCalibration {
        axis: Axis,
        min_drive: u16,
        max_drive: u16,
    },

    /// The setpoint queue was closed for shutdown
    #[error("setpoint queue closed")]
    QueueClosed,

    #[error("controller already started")]
    AlreadyStarted,

    /// A setpoint producer thread panicked
    #[error("producer '{0}' panicked")]
    ProducerPanicked(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PanTiltError {
    /// Whether this error came from the hardware side rather than from
    /// configuration or queue state.
    pub fn is_hardware(&self) -> bool {
        matches!(self, PanTiltError::HardwareUnavailable { .. })
    }
}
