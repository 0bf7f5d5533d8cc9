use std::time::Duration;

use time::OffsetDateTime;

use crate::config::SweepConfig;
use crate::setpoint::SetpointCommand;
use super::SetpointSource;

//drives both axes through the same angle ramp, start inclusive, end exclusive
pub struct SweepProducer {
    config: SweepConfig,
    cycles: u64,
}

impl SweepProducer {
    pub fn new(config: SweepConfig) -> Self {
        SweepProducer { config, cycles: 0 }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn angles(&self) -> Vec<f64> {
        let SweepConfig { start_deg, end_deg, step_deg, .. } = self.config;
        if !(step_deg > 0.0) {
            return Vec::new();
        }
        let direction = if end_deg >= start_deg { 1.0 } else { -1.0 };
        let span = (end_deg - start_deg).abs();
        let steps = (span / step_deg).ceil() as usize;

        (0..steps)
            .map(|i| start_deg + direction * step_deg * i as f64)
            .collect()
    }
}

impl SetpointSource for SweepProducer {
    fn name(&self) -> &str {
        "sweep"
    }

    fn next_batch(&mut self, _now: OffsetDateTime) -> Vec<SetpointCommand> {
        self.cycles += 1;
        let batch: Vec<SetpointCommand> = self.angles().into_iter().map(|a| SetpointCommand::new(a, a)).collect();
        log::debug!("sweep cycle {}: {} setpoints", self.cycles, batch.len());
        batch
    }

    fn rest(&self) -> Duration {
        Duration::from_secs_f64(self.config.rest_secs)
    }

    fn wait_for_drain(&self) -> bool {
        self.config.wait_for_drain
    }
}
