/**
 * Pan/Tilt Pacing Metrics
 *
 * Measures how closely the controller loop keeps its pacing interval:
 * - queues a backlog of setpoints on an in-memory backend
 * - records when each pan drive value was issued
 * - reports the jitter of the gap between consecutive setpoints
 *
 * Outputs CSV for analysis and prints summary statistics.
 *
 * Usage: pacing_metrics [pacing_ms] [samples]
 */

use pan_tilt::{ControllerConfig, MemoryBackend, PanTiltController};
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

const CSV_PATH: &str = "/tmp/pan_tilt_pacing.csv";

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let pacing_ms: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(20);
    let samples: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(200);

    println!("==============================================");
    println!("  Pan/Tilt Pacing Metrics");
    println!("==============================================");
    println!("  Pacing:  {} ms", pacing_ms);
    println!("  Samples: {}", samples);
    println!("==============================================\n");

    let config = ControllerConfig {
        pacing_secs: pacing_ms as f64 / 1000.0,
        ..ControllerConfig::default()
    };
    let pan_pin = config.pan.pin;

    let backend = Arc::new(MemoryBackend::new());
    let controller = Arc::new(PanTiltController::new(&config, backend.clone()).expect("valid config"));

    for i in 0..samples {
        let angle = (i % 210) as f64;
        controller.enqueue(angle, angle).unwrap();
    }

    let test_start = Instant::now();
    let handle = controller.clone().start_background();

    while controller.stats().applied < samples as u64 {
        std::thread::sleep(Duration::from_millis(5));
    }
    controller.shutdown();
    handle.join().unwrap().expect("control loop failed");
    let test_duration = test_start.elapsed();

    let times: Vec<Instant> = backend
        .records()
        .iter()
        .filter(|r| r.pin == pan_pin)
        .map(|r| r.at)
        .take(samples)
        .collect();

    let mut csv_file = File::create(CSV_PATH).expect("Failed to create CSV file");
    writeln!(csv_file, "sample,gap_us,error_us").unwrap();

    let target_us = pacing_ms as i64 * 1000;
    let mut gaps: Vec<u64> = Vec::new();
    let mut errors: Vec<u64> = Vec::new();
    for (i, pair) in times.windows(2).enumerate() {
        let gap_us = (pair[1] - pair[0]).as_micros() as u64;
        let err_us = (gap_us as i64 - target_us).unsigned_abs();
        gaps.push(gap_us);
        errors.push(err_us);
        writeln!(csv_file, "{},{},{}", i + 1, gap_us, err_us).unwrap();
    }

    println!("\n==============================================");
    println!("  RESULTS ({} setpoints in {:.2}s)", times.len(), test_duration.as_secs_f64());
    println!("==============================================\n");

    fn stats(name: &str, data: &[u64]) {
        if data.is_empty() {
            println!("{}: No data", name);
            return;
        }

        let mut sorted = data.to_vec();
        sorted.sort();

        let sum: u64 = sorted.iter().sum();
        let mean = sum as f64 / sorted.len() as f64;

        let variance: f64 = sorted.iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>() / sorted.len() as f64;
        let std_dev = variance.sqrt();

        let p50 = sorted[sorted.len() * 50 / 100];
        let p95 = sorted[sorted.len() * 95 / 100];
        let p99 = sorted[sorted.len() * 99 / 100];

        println!("{:12} │ Mean: {:10.1} µs │ Std Dev: {:8.1} µs", name, mean, std_dev);
        println!("{:12} │ P50:  {:10} µs │ P95: {:10} µs │ P99: {:10} µs", "", p50, p95, p99);
        println!("{:12} │ Min:  {:10} µs │ Max: {:10} µs", "", sorted[0], sorted[sorted.len() - 1]);
        println!();
    }

    stats("Gap", &gaps);
    stats("Jitter", &errors);

    let early = gaps.iter().filter(|&&g| (g as i64) < target_us).count();
    println!("Setpoints applied early: {}", early);
    println!("Throughput: {:.2} setpoints/sec", times.len() as f64 / test_duration.as_secs_f64());

    println!("\n----------------------------------------------");
    println!("CSV saved to: {}", CSV_PATH);
    println!("----------------------------------------------\n");
}
