pub mod actuator;
pub mod config;
pub mod controller;
pub mod error;
pub mod ffi;
pub mod producer;
pub mod pwm;
pub mod setpoint;

#[cfg(feature = "python")]
pub mod python;

pub use actuator::{Actuator, Axis, AxisCalibration, DriveDecision, Saturation, DISABLED_DRIVE, FULL_SWEEP_DEGREES};
pub use config::{AppConfig, BackendConfig, ControllerConfig, Location, SweepConfig, TrackerConfig};
pub use controller::{ControllerState, ControllerStats, PanTiltController};
pub use error::{BackendError, PanTiltError, PanTiltResult};

pub use pwm::{
    open_backend, PwmBackend, PinId,
    MemoryBackend, PigpioBackend, SerialPwmBackend,
    MsgType, ServoPulseCmd, SYNC_BYTE, MAX_MSG_SIZE,
};

pub use setpoint::{SetpointCommand, SetpointPublisher, SetpointQueue};

pub use producer::{
    ApproxSolarEphemeris, Ephemeris, SolarPosition,
    ProducerHandle, SetpointSource, SolarTracker, SweepProducer,
};
