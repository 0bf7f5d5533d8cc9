/**
 * PWM backends
 *
 * The controller never talks to hardware directly: every actuator holds a
 * shared handle to something implementing `PwmBackend`.
 *
 * - `PigpioBackend`     pigpio daemon socket (Raspberry Pi GPIO)
 * - `SerialPwmBackend`  microcontroller PWM board over a UART link
 * - `MemoryBackend`     records calls; dry runs and tests
 */

pub mod frame;
pub mod pigpio;
pub mod serial;

pub use frame::{MsgType, ServoPulseCmd, SYNC_BYTE, MAX_MSG_SIZE};
pub use pigpio::PigpioBackend;
pub use serial::SerialPwmBackend;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::BackendConfig;
use crate::error::BackendError;

/// GPIO / channel identifier understood by the backend
pub type PinId = u8;

/// "Set pulse width on pin P to value V".
///
/// Calls are fire-and-forget: success means the backend accepted the value,
/// not that the actuator reached the position.
pub trait PwmBackend: Send + Sync {
    fn set_drive(&self, pin: PinId, value: u16) -> Result<(), BackendError>;

    fn name(&self) -> &str{
        "pwm"
    }
}

/// Opens the backend described by the configuration.
///
/// For pigpio this also takes care of starting the daemon when it is not
/// already listening.
pub fn open_backend(config: &BackendConfig) -> Result<Arc<dyn PwmBackend>, BackendError>{
    match config{
        BackendConfig::Pigpio{ host, port, daemon_command, startup_timeout_secs } =>{
            let timeout = Duration::from_secs_f64(startup_timeout_secs.max(0.0));
            let backend = PigpioBackend::connect_or_spawn(host, *port, daemon_command, timeout)?;
            Ok(Arc::new(backend))
        }
        BackendConfig::Serial{ port, baud } =>{
            Ok(Arc::new(SerialPwmBackend::open(port, *baud)?))
        }
        BackendConfig::DryRun => Ok(Arc::new(MemoryBackend::new())),
    }
}

/// One call observed by the `MemoryBackend`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveRecord{
    pub pin: PinId,
    pub value: u16,
    pub at: Instant,
}

/// Drive calls kept by a `MemoryBackend` before the oldest are dropped
pub const DEFAULT_HISTORY: usize = 4096;

/// In-memory backend: logs every drive value it is given and keeps the most
/// recent ones, so a long dry run stays bounded.
#[derive(Debug)]
pub struct MemoryBackend{
    records: Mutex<VecDeque<DriveRecord>>,
    history: usize,
    failing_pin: Mutex<Option<PinId>>,
}

impl Default for MemoryBackend{
    fn default() -> Self{
        Self::with_history(DEFAULT_HISTORY)
    }
}

impl MemoryBackend{
    pub fn new() -> Self{
        Self::default()
    }

    pub fn with_history(history: usize) -> Self{
        MemoryBackend{
            records: Mutex::new(VecDeque::with_capacity(history.min(DEFAULT_HISTORY))),
            history,
            failing_pin: Mutex::new(None),
        }
    }

    /// Makes every subsequent call on `pin` fail as if the hardware vanished.
    pub fn fail_pin(&self, pin: PinId){
        *self.failing_pin.lock().unwrap_or_else(PoisonError::into_inner) = Some(pin);
    }

    /// Retained calls, oldest first
    pub fn records(&self) -> Vec<DriveRecord>{
        self.records.lock().unwrap_or_else(PoisonError::into_inner).iter().copied().collect()
    }

    /// Drive values issued to one pin, oldest first
    pub fn values_for(&self, pin: PinId) -> Vec<u16>{
        self.records()
            .iter()
            .filter(|r| r.pin == pin)
            .map(|r| r.value)
            .collect()
    }

    pub fn last_value(&self, pin: PinId) -> Option<u16>{
        self.values_for(pin).last().copied()
    }

    pub fn clear(&self){
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl PwmBackend for MemoryBackend{
    fn set_drive(&self, pin: PinId, value: u16) -> Result<(), BackendError>{
        if *self.failing_pin.lock().unwrap_or_else(PoisonError::into_inner) == Some(pin){
            return Err(BackendError::Unreachable(format!("pin {} not responding", pin)));
        }
        log::debug!("[dry-run] pin {} <- {}", pin, value);
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if self.history == 0{
            return Ok(());
        }
        if records.len() == self.history{
            records.pop_front();
        }
        records.push_back(DriveRecord{ pin, value, at: Instant::now() });
        Ok(())
    }

    fn name(&self) -> &str{
        "memory"
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_memory_backend_records_in_order(){
        let backend = MemoryBackend::new();
        backend.set_drive(6, 500).unwrap();
        backend.set_drive(5, 700).unwrap();
        backend.set_drive(6, 900).unwrap();

        assert_eq!(backend.values_for(6), vec![500, 900]);
        assert_eq!(backend.values_for(5), vec![700]);
        assert_eq!(backend.last_value(6), Some(900));
        assert_eq!(backend.records().len(), 3);
    }

    #[test]
    fn test_memory_backend_failure_injection(){
        let backend = MemoryBackend::new();
        backend.fail_pin(5);
        assert!(backend.set_drive(6, 500).is_ok());
        assert!(matches!(backend.set_drive(5, 500), Err(BackendError::Unreachable(_))));
        assert_eq!(backend.values_for(5), Vec::<u16>::new());
    }

    #[test]
    fn test_memory_backend_history_is_bounded(){
        let backend = MemoryBackend::with_history(3);
        for value in 1..=10u16{
            backend.set_drive(6, value).unwrap();
        }

        assert_eq!(backend.records().len(), 3);
        assert_eq!(backend.values_for(6), vec![8, 9, 10]);
        assert_eq!(backend.last_value(6), Some(10));
    }

    #[test]
    fn test_default_history_cap(){
        let backend = MemoryBackend::new();
        for i in 0..(DEFAULT_HISTORY + 100){
            backend.set_drive(5, (i % 2500) as u16).unwrap();
        }
        assert_eq!(backend.records().len(), DEFAULT_HISTORY);
    }

    #[test]
    fn test_open_dry_run_backend(){
        let backend = open_backend(&BackendConfig::DryRun).unwrap();
        assert_eq!(backend.name(), "memory");
        assert!(backend.set_drive(6, 1500).is_ok());
    }
}
