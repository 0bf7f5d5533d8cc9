/**
 * Pan/Tilt Controller Binary
 *
 * Runs the controller loop against the configured PWM backend with one of
 * the built-in setpoint producers:
 * 1. sweep  - both axes ramp through the configured range, forever
 * 2. track  - follow the sun from the configured location
 * 3. point  - hold a single pan/tilt position
 * 4. home   - hold the home position
 * 5. solar  - print the sun position and the setpoint it maps to, no hardware
 *
 * Ctrl-C (or SIGTERM) stops the loop; both servos are disabled on the way out.
 *
 * Usage: pan_tilt_controller [--config cfg.json] [--location location_data.json] <command>
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use pan_tilt::producer::{self, ProducerHandle};
use pan_tilt::{
    open_backend, AppConfig, ApproxSolarEphemeris, BackendConfig, Location,
    PanTiltController, SolarTracker, SweepProducer,
};

const DEFAULT_LOCATION_FILE: &str = "location_data.json";

static STOP: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(name = "pan_tilt_controller", version, about = "Pan/tilt servo platform controller")]
struct Cli {
    /// JSON configuration file (defaults built in)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Location file, overrides the configured location
    #[arg(short, long, global = true)]
    location: Option<PathBuf>,

    /// Log drive values instead of driving hardware
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep both axes through the configured range
    Sweep,
    /// Track the sun
    Track,
    /// Hold one position
    Point {
        #[arg(long, allow_negative_numbers = true)]
        pan: f64,
        #[arg(long, allow_negative_numbers = true)]
        tilt: f64,
    },
    /// Hold the home position (angle 0 on both axes)
    Home,
    /// Print the sun position and the setpoint it maps to
    Solar {
        /// RFC 3339 timestamp, defaults to now
        #[arg(long)]
        at: Option<String>,
    },
}

extern "C" fn on_signal(_sig: libc::c_int) {
    STOP.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };

    if cli.dry_run {
        config.backend = BackendConfig::DryRun;
    }

    if let Some(path) = &cli.location {
        config.location = Some(Location::load(path).with_context(|| format!("loading {}", path.display()))?);
    } else if config.location.is_none() && Path::new(DEFAULT_LOCATION_FILE).exists() {
        config.location = Some(Location::load(DEFAULT_LOCATION_FILE).context("loading location_data.json")?);
    }
    Ok(config)
}

fn require_location(config: &AppConfig) -> Result<Location> {
    config
        .location
        .ok_or_else(|| anyhow!("no location configured (use --location or a {} file)", DEFAULT_LOCATION_FILE))
}

fn print_solar(config: &AppConfig, at: Option<&str>) -> Result<()> {
    let location = require_location(config)?;
    let time = match at {
        Some(text) => OffsetDateTime::parse(text, &Rfc3339).with_context(|| format!("parsing timestamp {}", text))?,
        None => OffsetDateTime::now_utc(),
    };

    let tracker = SolarTracker::new(ApproxSolarEphemeris, location, config.tracker.clone());
    let pos = tracker.position(time);
    let cmd = tracker.to_setpoint(&pos);

    println!("time:       {}", time.format(&Rfc3339)?);
    println!("location:   {:.4}, {:.4}", location.latitude, location.longitude);
    println!("altitude:   {:.2}°", pos.altitude_deg);
    println!("azimuth:    {:.2}°", pos.azimuth_deg);
    println!("irradiance: {:.1} W/m²", pos.irradiance);
    println!("setpoint:   pan {:.2}° tilt {:.2}°", cmd.pan_angle, cmd.tilt_angle);
    if !pos.is_above_horizon() {
        println!("(sun below horizon)");
    }
    Ok(())
}

//runs the loop until a signal arrives or the loop ends on its own
fn supervise(controller: Arc<PanTiltController>, producer: Option<ProducerHandle>) -> Result<()> {
    let handle = Arc::clone(&controller).start_background();

    while !STOP.load(Ordering::SeqCst) && !handle.is_finished() {
        thread::sleep(Duration::from_millis(100));
    }

    controller.shutdown();

    if let Some(p) = producer {
        let name = p.name().to_string();
        match p.stop() {
            Ok(queued) => log::info!("{} producer queued {} setpoints", name, queued),
            Err(e) => log::warn!("{} producer: {}", name, e),
        }
    }

    let result = handle.join().map_err(|_| anyhow!("control loop panicked"))?;
    result.context("control loop stopped")?;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    if let Command::Solar { at } = &cli.command {
        return print_solar(&config, at.as_deref());
    }

    let backend = open_backend(&config.backend).context("opening PWM backend")?;
    log::info!("PWM backend: {}", backend.name());
    let controller = Arc::new(PanTiltController::new(&config.controller, backend)?);

    install_signal_handlers();

    let producer = match cli.command {
        Command::Sweep => Some(producer::spawn(SweepProducer::new(config.sweep.clone()), controller.publisher())),
        Command::Track => {
            let location = require_location(&config)?;
            let tracker = SolarTracker::new(ApproxSolarEphemeris, location, config.tracker.clone());
            Some(producer::spawn(tracker, controller.publisher()))
        }
        Command::Point { pan, tilt } => {
            controller.enqueue(pan, tilt)?;
            None
        }
        Command::Home => {
            if let Err(e) = controller.send_home() {
                controller.disable_all();
                return Err(e).context("sending servos home");
            }
            None
        }
        Command::Solar { .. } => None,
    };

    supervise(controller, producer)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
