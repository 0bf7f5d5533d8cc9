/**
 * End-to-End Test for the serial PWM board
 *
 * Tests:
 * 1. Open UART connection to the PWM board
 * 2. Send a servo pulse ramp on the pan and tilt pins
 * 3. Count acknowledgements and heartbeats coming back
 *
 * Usage: serial_servo_test [port] [baud]
 */

use pan_tilt::pwm::frame::{encode_frame, try_parse_frame};
use pan_tilt::{AxisCalibration, MsgType, ServoPulseCmd, DISABLED_DRIVE};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

const PAN_PIN: u8 = 6;
const TILT_PIN: u8 = 5;

fn send_pulse(port: &mut Box<dyn SerialPort>, pin: u8, pulse: u16) -> std::io::Result<()> {
    let cmd = ServoPulseCmd::new(pin, pulse);
    let frame = encode_frame(MsgType::ServoPulse, &cmd.to_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    port.write_all(&frame)?;
    port.flush()?;
    println!("[TX] pin {} <- {}", pin, pulse);
    Ok(())
}

fn drain_replies(port: &mut Box<dyn SerialPort>, rx_buffer: &mut Vec<u8>, wait: Duration) -> (usize, usize) {
    let mut read_buf = [0u8; 256];
    let mut acks = 0;
    let mut heartbeats = 0;
    let start = Instant::now();

    while start.elapsed() < wait {
        match port.read(&mut read_buf) {
            Ok(n) if n > 0 => {
                rx_buffer.extend_from_slice(&read_buf[..n]);
                while let Some((msg_type, payload)) = try_parse_frame(rx_buffer) {
                    match msg_type {
                        MsgType::Ack => acks += 1,
                        MsgType::Heartbeat => heartbeats += 1,
                        other => println!("[RX] {:?}, {} bytes", other, payload.len()),
                    }
                }
            }
            Ok(_) => {}
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => eprintln!("Read error: {}", e),
        }
    }
    (acks, heartbeats)
}

fn main() {
    println!("==============================================");
    println!("  Pan/Tilt Serial PWM End-to-End Test");
    println!("==============================================\n");

    let args: Vec<String> = std::env::args().collect();
    let ports = serialport::available_ports().unwrap_or_default();
    println!("Available ports:");
    for (i, port) in ports.iter().enumerate() {
        println!("  [{}] {}", i, port.port_name);
    }

    let port_name = args.get(1).cloned().unwrap_or_else(|| {
        ports.iter()
            .find(|p| p.port_name.contains("ACM") || p.port_name.contains("USB"))
            .map(|p| p.port_name.clone())
            .unwrap_or_else(|| "/dev/ttyACM0".to_string())
    });
    let baud: u32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(9600);

    println!("\nOpening port: {} at {} baud...", port_name, baud);

    let mut port = serialport::new(&port_name, baud)
        .timeout(Duration::from_millis(100))
        .open()
        .expect(&format!("Failed to open port {}", port_name));

    println!("✅ Port opened successfully!\n");

    // Give the board time to reset after the port opens
    std::thread::sleep(Duration::from_secs(2));

    let calibration = AxisCalibration::default();
    let mut rx_buffer = Vec::new();
    let mut total_acks = 0;
    let mut total_heartbeats = 0;

    println!("--- Test 1: Centre both servos ---");
    let centre = calibration.drive_for(105.0).value;
    send_pulse(&mut port, PAN_PIN, centre).expect("Failed to send pulse");
    send_pulse(&mut port, TILT_PIN, centre).expect("Failed to send pulse");
    let (a, h) = drain_replies(&mut port, &mut rx_buffer, Duration::from_secs(1));
    total_acks += a;
    total_heartbeats += h;

    println!("\n--- Test 2: Ramp through the travel ---");
    for angle in [0.0, 52.5, 105.0, 157.5, 210.0, 105.0] {
        let pulse = calibration.drive_for(angle).value;
        send_pulse(&mut port, PAN_PIN, pulse).expect("Failed to send pulse");
        send_pulse(&mut port, TILT_PIN, pulse).expect("Failed to send pulse");
        let (a, h) = drain_replies(&mut port, &mut rx_buffer, Duration::from_millis(500));
        total_acks += a;
        total_heartbeats += h;
    }

    println!("\n--- Test 3: Release servos ---");
    send_pulse(&mut port, PAN_PIN, DISABLED_DRIVE).expect("Failed to send pulse");
    send_pulse(&mut port, TILT_PIN, DISABLED_DRIVE).expect("Failed to send pulse");
    let (a, h) = drain_replies(&mut port, &mut rx_buffer, Duration::from_secs(1));
    total_acks += a;
    total_heartbeats += h;

    println!("\n==============================================");
    println!("  Test Complete!");
    println!("==============================================");
    println!("  Pulse frames sent:   16");
    println!("  Acks received:       {}", total_acks);
    println!("  Heartbeats received: {}", total_heartbeats);
    println!("==============================================\n");

    if total_acks > 0 {
        println!("✅ Board acknowledged pulse frames - SUCCESS!");
    } else {
        println!("⚠️  No acknowledgements - check board firmware");
    }
}
