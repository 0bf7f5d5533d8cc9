use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use flume::{Receiver, Sender};

use crate::error::{PanTiltError, PanTiltResult};
use super::command::SetpointCommand;

//unbounded mpsc fifo between producers and the controller loop
//the queue itself is the single consumer, publishers are the producers
pub struct SetpointQueue{
    tx: Sender<SetpointCommand>,
    rx: Receiver<SetpointCommand>,
    closed: Arc<AtomicBool>,
}

impl SetpointQueue{
    pub fn new() -> Self{
        let (tx, rx) = flume::unbounded();
        SetpointQueue{
            tx,
            rx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn publisher(&self) -> SetpointPublisher{
        SetpointPublisher{
            tx: self.tx.clone(),
            closed: Arc::clone(&self.closed),
        }
    }

    pub fn enqueue(&self, cmd: SetpointCommand) -> PanTiltResult<()>{
        send(&self.tx, &self.closed, cmd)
    }

    pub fn try_dequeue(&self) -> Option<SetpointCommand>{
        self.rx.try_recv().ok()
    }

    //blocks up to `timeout` for the oldest command
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<SetpointCommand>{
        self.rx.recv_timeout(timeout).ok()
    }

    pub(crate) fn receiver(&self) -> &Receiver<SetpointCommand>{
        &self.rx
    }

    //after close every enqueue fails, whatever is still queued stays put
    pub fn close(&self){
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool{
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize{
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool{
        self.rx.is_empty()
    }
}

impl Default for SetpointQueue{
    fn default() -> Self{
        Self::new()
    }
}

/// Producer-side handle; clone one per producer thread.
#[derive(Clone)]
pub struct SetpointPublisher{
    tx: Sender<SetpointCommand>,
    closed: Arc<AtomicBool>,
}

impl SetpointPublisher{
    /// Never blocks. Fails only once the controller has shut down.
    pub fn enqueue(&self, cmd: SetpointCommand) -> PanTiltResult<()>{
        send(&self.tx, &self.closed, cmd)
    }

    pub fn enqueue_angles(&self, pan_angle: f64, tilt_angle: f64) -> PanTiltResult<()>{
        self.enqueue(SetpointCommand::new(pan_angle, tilt_angle))
    }

    pub fn pending(&self) -> usize{
        self.tx.len()
    }

    pub fn is_closed(&self) -> bool{
        self.closed.load(Ordering::SeqCst)
    }
}

fn send(tx: &Sender<SetpointCommand>, closed: &AtomicBool, cmd: SetpointCommand) -> PanTiltResult<()>{
    if closed.load(Ordering::SeqCst){
        return Err(PanTiltError::QueueClosed);
    }
    tx.send(cmd).map_err(|_| PanTiltError::QueueClosed)
}
