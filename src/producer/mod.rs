/**
 * Setpoint producers
 *
 * A producer is a background thread that generates setpoints and pushes
 * them through a `SetpointPublisher`. Each cycle it asks its source for a
 * batch, queues it, then rests. The thread ends when asked to stop or when
 * the controller has closed the queue.
 */

pub mod ephemeris;
pub mod solar;
pub mod sweep;

pub use ephemeris::{ApproxSolarEphemeris, Ephemeris, SolarPosition};
pub use solar::SolarTracker;
pub use sweep::SweepProducer;

use std::thread;
use std::time::Duration;

use flume::{RecvTimeoutError, Sender};
use time::OffsetDateTime;

use crate::error::{PanTiltError, PanTiltResult};
use crate::setpoint::{SetpointCommand, SetpointPublisher};

pub trait SetpointSource: Send {
    fn name(&self) -> &str;

    /// Setpoints for this cycle, in the order they should be applied
    fn next_batch(&mut self, now: OffsetDateTime) -> Vec<SetpointCommand>;

    /// Pause between two cycles
    fn rest(&self) -> Duration;

    /// Skip a cycle while earlier setpoints are still queued
    fn wait_for_drain(&self) -> bool {
        false
    }
}

/// Running producer thread
pub struct ProducerHandle {
    name: String,
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<PanTiltResult<u64>>,
}

impl ProducerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the thread and returns how many setpoints it queued
    pub fn stop(self) -> PanTiltResult<u64> {
        let _ = self.stop_tx.try_send(());
        self.join()
    }

    pub fn join(self) -> PanTiltResult<u64> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => {
                log::error!("{}: producer thread panicked", self.name);
                Err(PanTiltError::ProducerPanicked(self.name))
            }
        }
    }
}

/// Starts `source` on its own thread
pub fn spawn<S: SetpointSource + 'static>(mut source: S, publisher: SetpointPublisher) -> ProducerHandle {
    let name = source.name().to_string();
    let (stop_tx, stop_rx) = flume::bounded::<()>(1);

    let handle = thread::spawn(move || {
        let mut queued = 0u64;
        loop {
            if publisher.is_closed() {
                break;
            }

            if !(source.wait_for_drain() && publisher.pending() > 0) {
                let batch = source.next_batch(OffsetDateTime::now_utc());
                for cmd in batch {
                    match publisher.enqueue(cmd) {
                        Ok(()) => queued += 1,
                        Err(PanTiltError::QueueClosed) => {
                            log::info!("{}: queue closed after {} setpoints", source.name(), queued);
                            return Ok(queued);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }

            match stop_rx.recv_timeout(source.rest()) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::info!("{}: stopped after {} setpoints", source.name(), queued);
        Ok(queued)
    });

    ProducerHandle { name, stop_tx, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setpoint::SetpointQueue;
    use std::time::Instant;

    struct Counter {
        next: f64,
        drain: bool,
    }

    impl SetpointSource for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn next_batch(&mut self, _now: OffsetDateTime) -> Vec<SetpointCommand> {
            let cmd = SetpointCommand::new(self.next, self.next);
            self.next += 1.0;
            vec![cmd]
        }

        fn rest(&self) -> Duration {
            Duration::from_millis(1)
        }

        fn wait_for_drain(&self) -> bool {
            self.drain
        }
    }

    struct Faulty;

    impl SetpointSource for Faulty {
        fn name(&self) -> &str {
            "faulty"
        }

        fn next_batch(&mut self, _now: OffsetDateTime) -> Vec<SetpointCommand> {
            panic!("ephemeris blew up");
        }

        fn rest(&self) -> Duration {
            Duration::from_millis(1)
        }
    }

    fn wait_for_len(queue: &SetpointQueue, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.len() < n {
            assert!(Instant::now() < deadline, "timed out waiting for {} setpoints", n);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_stop_reports_count() {
        let queue = SetpointQueue::new();
        let producer = spawn(Counter { next: 0.0, drain: false }, queue.publisher());
        wait_for_len(&queue, 3);

        let queued = producer.stop().unwrap();
        assert_eq!(queued as usize, queue.len());
        assert_eq!(queue.try_dequeue(), Some(SetpointCommand::new(0.0, 0.0)));
        assert_eq!(queue.try_dequeue(), Some(SetpointCommand::new(1.0, 1.0)));
    }

    #[test]
    fn test_ends_when_queue_closes() {
        let queue = SetpointQueue::new();
        let producer = spawn(Counter { next: 0.0, drain: false }, queue.publisher());
        wait_for_len(&queue, 1);

        queue.close();
        let queued = producer.join().unwrap();
        assert!(queued >= 1);
    }

    #[test]
    fn test_panicked_producer_is_reported_as_such() {
        let queue = SetpointQueue::new();
        let producer = spawn(Faulty, queue.publisher());

        match producer.join() {
            Err(PanTiltError::ProducerPanicked(name)) => assert_eq!(name, "faulty"),
            other => panic!("expected producer panic, got {:?}", other),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_wait_for_drain_holds_back_next_batch() {
        let queue = SetpointQueue::new();
        let producer = spawn(Counter { next: 0.0, drain: true }, queue.publisher());
        wait_for_len(&queue, 1);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.len(), 1);

        queue.try_dequeue();
        wait_for_len(&queue, 1);
        assert_eq!(queue.try_dequeue(), Some(SetpointCommand::new(1.0, 1.0)));
        producer.stop().unwrap();
    }
}
