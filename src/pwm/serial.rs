use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::error::BackendError;
use super::frame::{encode_frame, MsgType, ServoPulseCmd};
use super::{PinId, PwmBackend};

pub const DEFAULT_BAUD: u32 = 9600;

//pwm board behind a uart link; one framed ServoPulse message per call
pub struct SerialPwmBackend{
    port: Mutex<Box<dyn Write + Send>>,
    port_name: String,
}

impl SerialPwmBackend{
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, BackendError>{
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;

        log::info!("Opened PWM board on {} at {} baud", port_name, baud_rate);

        Ok(SerialPwmBackend{
            port: Mutex::new(Box::new(port)),
            port_name: port_name.to_string(),
        })
    }

    //any byte sink works, handy when there is no board attached
    pub fn from_writer<W: Write + Send + 'static>(name: &str, writer: W) -> Self{
        SerialPwmBackend{
            port: Mutex::new(Box::new(writer)),
            port_name: name.to_string(),
        }
    }

    pub fn port_name(&self) -> &str{
        &self.port_name
    }
}

impl PwmBackend for SerialPwmBackend{
    fn set_drive(&self, pin: PinId, value: u16) -> Result<(), BackendError>{
        let frame = encode_frame(MsgType::ServoPulse, &ServoPulseCmd::new(pin, value).to_bytes())?;

        let mut port = self.port.lock().unwrap_or_else(PoisonError::into_inner);
        port.write_all(&frame)?;
        port.flush()?;
        Ok(())
    }

    fn name(&self) -> &str{
        "serial"
    }
}
