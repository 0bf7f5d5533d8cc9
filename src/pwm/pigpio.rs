/**
 * pigpio daemon backend
 *
 * Speaks the pigpiod socket interface: every request is four little-endian
 * u32 words [cmd, p1, p2, p3] and every response echoes the first three
 * words followed by an i32 result (negative = error code).
 *
 * Bootstrap: if nothing listens on the daemon port, the configured daemon
 * command is launched and the socket is polled until it accepts
 * connections or the startup timeout expires.
 */

use std::io::{Read, Write};
use std::net::TcpStream;
use std::process::Command;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::BackendError;
use super::{PinId, PwmBackend};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8888;

const CMD_SERVO: u32 = 8;
const IO_TIMEOUT: Duration = Duration::from_secs(1);
const CONNECT_RETRY: Duration = Duration::from_millis(250);

pub struct PigpioBackend{
    stream: Mutex<TcpStream>,
    addr: String,
}

impl PigpioBackend{
    /// Connects to an already running daemon.
    pub fn connect(host: &str, port: u16) -> Result<Self, BackendError>{
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&addr)
            .map_err(|e| BackendError::Unreachable(format!("{}: {}", addr, e)))?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        stream.set_nodelay(true)?;

        log::info!("Connected to pigpio daemon at {}", addr);

        Ok(PigpioBackend{
            stream: Mutex::new(stream),
            addr,
        })
    }

    /// Connects, starting the daemon first when it is not reachable.
    pub fn connect_or_spawn(
        host: &str,
        port: u16,
        daemon_command: &[String],
        startup_timeout: Duration,
    ) -> Result<Self, BackendError>{
        if let Ok(backend) = Self::connect(host, port){
            return Ok(backend);
        }

        let (program, args) = daemon_command.split_first().ok_or_else(||{
            BackendError::Unreachable(format!("{}:{} down and no daemon command configured", host, port))
        })?;

        log::warn!("pigpio daemon not reachable, starting `{}`", daemon_command.join(" "));
        let status = Command::new(program).args(args).status()?;
        if !status.success(){
            return Err(BackendError::Unreachable(format!(
                "`{}` exited with {}",
                daemon_command.join(" "),
                status
            )));
        }

        let deadline = Instant::now() + startup_timeout;
        loop{
            match Self::connect(host, port){
                Ok(backend) => return Ok(backend),
                Err(err) if Instant::now() >= deadline =>{
                    log::error!("pigpio daemon did not come up within {:?}", startup_timeout);
                    return Err(err);
                }
                Err(_) => thread::sleep(CONNECT_RETRY),
            }
        }
    }

    pub fn addr(&self) -> &str{
        &self.addr
    }

    fn command(&self, cmd: u32, p1: u32, p2: u32) -> Result<i32, BackendError>{
        let mut request = [0u8; 16];
        request[0..4].copy_from_slice(&cmd.to_le_bytes());
        request[4..8].copy_from_slice(&p1.to_le_bytes());
        request[8..12].copy_from_slice(&p2.to_le_bytes());
        //p3 (extension length) stays 0

        let mut response = [0u8; 16];
        {
            let mut stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
            stream.write_all(&request)?;
            stream.read_exact(&mut response)?;
        }

        Ok(i32::from_le_bytes([response[12], response[13], response[14], response[15]]))
    }
}

impl PwmBackend for PigpioBackend{
    fn set_drive(&self, pin: PinId, value: u16) -> Result<(), BackendError>{
        let code = self.command(CMD_SERVO, pin as u32, value as u32)?;
        if code < 0{
            return Err(BackendError::Rejected{ pin, code });
        }
        Ok(())
    }

    fn name(&self) -> &str{
        "pigpio"
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc;

    //answers every request with `result`, forwards (cmd, p1, p2) to the test
    fn fake_daemon(result: i32) -> (u16, mpsc::Receiver<(u32, u32, u32)>){
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move ||{
            let (mut conn, _) = listener.accept().unwrap();
            let mut req = [0u8; 16];
            while conn.read_exact(&mut req).is_ok(){
                let word = |i: usize| u32::from_le_bytes([req[i], req[i + 1], req[i + 2], req[i + 3]]);
                let _ = tx.send((word(0), word(4), word(8)));

                let mut resp = req;
                resp[12..16].copy_from_slice(&result.to_le_bytes());
                if conn.write_all(&resp).is_err(){
                    break;
                }
            }
        });

        (port, rx)
    }

    #[test]
    fn test_servo_command_on_the_wire(){
        let (port, rx) = fake_daemon(0);
        let backend = PigpioBackend::connect("127.0.0.1", port).unwrap();

        backend.set_drive(6, 519).unwrap();
        backend.set_drive(5, 0).unwrap();

        assert_eq!(rx.recv().unwrap(), (CMD_SERVO, 6, 519));
        assert_eq!(rx.recv().unwrap(), (CMD_SERVO, 5, 0));
        assert_eq!(backend.name(), "pigpio");
    }

    #[test]
    fn test_negative_result_is_rejection(){
        let (port, _rx) = fake_daemon(-8);
        let backend = PigpioBackend::connect("127.0.0.1", port).unwrap();

        match backend.set_drive(6, 3000){
            Err(BackendError::Rejected{ pin, code }) =>{
                assert_eq!(pin, 6);
                assert_eq!(code, -8);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_without_daemon_command(){
        //bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let result = PigpioBackend::connect_or_spawn("127.0.0.1", port, &[], Duration::from_millis(10));
        assert!(matches!(result, Err(BackendError::Unreachable(_))));
    }

    #[test]
    fn test_spawned_daemon_that_never_listens_times_out(){
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let command = vec!["true".to_string()];
        let start = Instant::now();
        let result = PigpioBackend::connect_or_spawn("127.0.0.1", port, &command, Duration::from_millis(300));
        assert!(matches!(result, Err(BackendError::Unreachable(_))));
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
