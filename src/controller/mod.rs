/**
 * Pan/Tilt Controller
 *
 * Owns both axis actuators and runs the control loop:
 * 1. Waits for the next setpoint (blocking, with timeout)
 * 2. Dequeues exactly one command, oldest first
 * 3. Adds the per-axis offsets
 * 4. Applies pan, then tilt
 * 5. Sleeps for the pacing interval
 *
 * Commands are never dropped or coalesced: a backlog drains one command per
 * pacing interval. On shutdown or on a backend failure both servos are sent
 * the "disabled" drive value before the loop returns.
 */

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Selector, Sender};

use crate::actuator::{Actuator, Axis, SaturationCounts, SaturationStats};
use crate::config::ControllerConfig;
use crate::error::{PanTiltError, PanTiltResult};
use crate::pwm::PwmBackend;
use crate::setpoint::{SetpointCommand, SetpointPublisher, SetpointQueue};

//floor for the idle wait so a zero pacing interval does not spin
const MIN_IDLE_WAIT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControllerState {
    /// Waiting for the next setpoint (or pacing)
    Idle = 0,
    /// Pushing a dequeued setpoint to the actuators
    Applying = 1,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Idle => f.write_str("idle"),
            ControllerState::Applying => f.write_str("applying"),
        }
    }
}

/// Snapshot of the controller counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub applied: u64,
    pub pending: usize,
    pub saturation: SaturationCounts,
}

enum Wake {
    Command(SetpointCommand),
    Stop,
}

pub struct PanTiltController {
    pan: Actuator,
    tilt: Actuator,
    pan_offset: f64,
    tilt_offset: f64,
    pacing: Duration,

    queue: SetpointQueue,

    started: AtomicBool,
    cancelled: AtomicBool,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,

    state: AtomicU8,
    applied: AtomicU64,
    saturation: Arc<SaturationStats>,
}

impl fmt::Debug for PanTiltController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanTiltController")
            .field("pan", &self.pan)
            .field("tilt", &self.tilt)
            .field("pan_offset", &self.pan_offset)
            .field("tilt_offset", &self.tilt_offset)
            .field("pacing", &self.pacing)
            .field("state", &self.state())
            .finish()
    }
}

impl PanTiltController {
    /// Builds both actuators on the given backend. Fails fast on an invalid
    /// calibration or pacing value; nothing is sent to the hardware here.
    pub fn new(config: &ControllerConfig, backend: Arc<dyn PwmBackend>) -> PanTiltResult<Self> {
        config.validate()?;

        let saturation = Arc::new(SaturationStats::default());
        let pan = Actuator::new(Axis::Pan, config.pan, Arc::clone(&backend), Arc::clone(&saturation))?;
        let tilt = Actuator::new(Axis::Tilt, config.tilt, backend, Arc::clone(&saturation))?;
        let (stop_tx, stop_rx) = flume::bounded(1);

        Ok(Self {
            pan,
            tilt,
            pan_offset: config.pan_offset,
            tilt_offset: config.tilt_offset,
            pacing: config.pacing(),
            queue: SetpointQueue::new(),
            started: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            stop_tx,
            stop_rx,
            state: AtomicU8::new(ControllerState::Idle as u8),
            applied: AtomicU64::new(0),
            saturation,
        })
    }

    /// Handle for a producer thread
    pub fn publisher(&self) -> SetpointPublisher {
        self.queue.publisher()
    }

    /// Queues a setpoint. Never blocks.
    pub fn enqueue(&self, pan_angle: f64, tilt_angle: f64) -> PanTiltResult<()> {
        self.queue.enqueue(SetpointCommand::new(pan_angle, tilt_angle))
    }

    /// Applies angle 0 (plus offsets) to both axes right now, bypassing the
    /// queue. May interleave with the loop; the last write wins.
    pub fn send_home(&self) -> PanTiltResult<()> {
        log::info!("Sending servos home");
        self.apply_to_actuators(SetpointCommand::default()).map(|_| ())
    }

    pub fn state(&self) -> ControllerState {
        match self.state.load(Ordering::SeqCst) {
            1 => ControllerState::Applying,
            _ => ControllerState::Idle,
        }
    }

    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            applied: self.applied.load(Ordering::SeqCst),
            pending: self.queue.len(),
            saturation: self.saturation.snapshot(),
        }
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Asks the loop to stop. The loop disables both servos before it
    /// returns; producers get `QueueClosed` from then on.
    pub fn shutdown(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            log::info!("Shutdown requested");
        }
        self.queue.close();
        // a full channel already holds a pending stop
        let _ = self.stop_tx.try_send(());
    }

    /// Runs the control loop on the calling thread until shutdown or until a
    /// backend call fails.
    pub fn run(&self) -> PanTiltResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PanTiltError::AlreadyStarted);
        }

        log::info!(
            "Controller running: pacing {:?}, offsets pan {:+.1}° tilt {:+.1}°",
            self.pacing,
            self.pan_offset,
            self.tilt_offset
        );

        let result = self.control_loop();
        self.set_state(ControllerState::Idle);
        self.queue.close();

        if let Err(ref err) = result {
            log::error!("Control loop failed: {}", err);
        }
        self.disable_all();

        let stats = self.stats();
        log::info!(
            "Controller stopped: {} setpoints applied, {} left queued",
            stats.applied,
            stats.pending
        );
        result
    }

    /// Start in background thread
    pub fn start_background(self: Arc<Self>) -> thread::JoinHandle<PanTiltResult<()>> {
        let controller = self.clone();
        thread::spawn(move || controller.run())
    }

    fn control_loop(&self) -> PanTiltResult<()> {
        let idle_wait = self.pacing.max(MIN_IDLE_WAIT);

        while !self.is_cancelled() {
            let cmd = match self.wait_for_work(idle_wait) {
                Some(Wake::Command(cmd)) => cmd,
                Some(Wake::Stop) => break,
                None => continue,
            };

            self.set_state(ControllerState::Applying);
            let applied = self.apply_to_actuators(cmd);
            self.set_state(ControllerState::Idle);

            let (pan_drive, tilt_drive) = applied?;
            self.applied.fetch_add(1, Ordering::SeqCst);
            log::debug!(
                "Applied pan {:.2}° tilt {:.2}° -> drive {}/{}",
                cmd.pan_angle,
                cmd.tilt_angle,
                pan_drive,
                tilt_drive
            );

            if self.pace() {
                break;
            }
        }
        Ok(())
    }

    //oldest command, a stop request, or None on timeout
    fn wait_for_work(&self, timeout: Duration) -> Option<Wake> {
        Selector::new()
            .recv(self.queue.receiver(), |msg| msg.ok().map(Wake::Command))
            .recv(&self.stop_rx, |_| Some(Wake::Stop))
            .wait_timeout(timeout)
            .ok()
            .flatten()
    }

    //sleeps one pacing interval; true when woken by a stop request
    fn pace(&self) -> bool {
        match self.stop_rx.recv_timeout(self.pacing) {
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }

    fn apply_to_actuators(&self, cmd: SetpointCommand) -> PanTiltResult<(u16, u16)> {
        let target = cmd.offset_by(self.pan_offset, self.tilt_offset);
        let pan_drive = self.pan.apply(target.pan_angle)?;
        let tilt_drive = self.tilt.apply(target.tilt_angle)?;
        Ok((pan_drive, tilt_drive))
    }

    /// Sends the disable value to both servos. Best effort: a failure on one
    /// axis is logged and does not skip the other. The loop does this on its
    /// way out; owners call it after a hardware failure outside the loop.
    pub fn disable_all(&self) {
        log::info!("Disabling servos");
        for actuator in [&self.pan, &self.tilt] {
            if let Err(err) = actuator.disable() {
                log::error!("Could not disable {} servo: {}", actuator.axis(), err);
            }
        }
    }

    fn set_state(&self, state: ControllerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}
