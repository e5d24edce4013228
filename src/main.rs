mod config;
mod sim;

use std::cell::RefCell;
use std::io::{self, Read};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;

use actuator::{EstimatedActuator, FeedbackActuator, SharedActuator};
use clock::SystemClock;
use configuration::Configuration;
use link::{LineAssembler, SerialLink};
use log::*;
use scheduler::{Scheduler, Task};
use tracing_subscriber::EnvFilter;
use tracker::{Tracker, TrackerState};

use config::{ActuatorKind, AppConfig};
use sim::Plant;

const APP_CONFIG: &str = "dual-tracker.toml";

fn build_actuator(kind: ActuatorKind, name: &'static str, plant: &Plant) -> (SharedActuator, Task) {
    match kind {
        ActuatorKind::Feedback => {
            let act = Rc::new(RefCell::new(FeedbackActuator::new(
                name,
                plant.bridge(),
                plant.pot(),
            )));
            let shared: SharedActuator = act.clone();
            let task: Task = act;
            (shared, task)
        }
        ActuatorKind::Estimated => {
            let act = Rc::new(RefCell::new(EstimatedActuator::new(name, plant.bridge())));
            let shared: SharedActuator = act.clone();
            let task: Task = act;
            (shared, task)
        }
    }
}

/// Forwards raw stdin bytes to the pump loop. Framing happens on the loop side.
fn spawn_stdin_reader() -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        let mut buf = [0u8; 64];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin read failed: {:?}", e);
                    break;
                }
            }
        }
    });
    rx
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout is the app link
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let app_path = std::env::args().nth(1).unwrap_or_else(|| APP_CONFIG.to_string());
    let app = AppConfig::load(&app_path)?;
    info!(
        "Device {}: {:?} actuators, settings in {}",
        app.device.name,
        app.rig.actuator,
        app.rig.configuration.display()
    );

    let configuration = Configuration::load(&app.rig.configuration)?;
    let settings = configuration.settings().clone();
    info!(
        "Lat: {}, Lon: {}, UTC{:+}, dual: {}",
        settings.location.latitude,
        settings.location.longitude,
        settings.location.utc_offset,
        settings.tracking.dual
    );

    // Simulated mechanics, parked mid-stroke so homing has work to do
    let mut az_plant = Plant::new(
        "azimuth",
        settings.azimuth.length,
        settings.azimuth.speed,
        0.5,
    );
    let mut el_plant = Plant::new(
        "elevation",
        settings.elevation.length,
        settings.elevation.speed,
        0.5,
    );
    let (azimuth, az_task) = build_actuator(app.rig.actuator, "azimuth", &az_plant);
    let (elevation, el_task) = build_actuator(app.rig.actuator, "elevation", &el_plant);

    let tracker = Rc::new(RefCell::new(Tracker::new(
        configuration,
        Box::new(SystemClock::new(settings.location.utc_offset)),
        Box::new(SerialLink::new(io::stdout())),
        azimuth,
        elevation,
    )));

    let mut scheduler = Scheduler::new();
    scheduler.add(az_task)?;
    scheduler.add(el_task)?;
    scheduler.add(tracker.clone())?;

    tracker.borrow_mut().initialize();

    let commands = spawn_stdin_reader();
    let mut framer = LineAssembler::new();
    let mut auto_track = app.rig.auto_track;
    let mut stdin_open = true;

    loop {
        let now = Instant::now();
        az_plant.update(now);
        el_plant.update(now);

        while stdin_open {
            match commands.try_recv() {
                Ok(bytes) => {
                    for line in framer.extend(&bytes) {
                        tracker.borrow_mut().process_command(&line, now);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("stdin closed, running without remote commands");
                    stdin_open = false;
                }
            }
        }

        scheduler.run(now);

        if auto_track && tracker.borrow().state() == TrackerState::Standby {
            info!("Rig referenced, starting to track");
            tracker.borrow_mut().track(now);
            auto_track = false;
        }

        thread::sleep(app.pump_period());
    }
}
