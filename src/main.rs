use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use lag_detector::sim::{SimController, SimulatedHost};
use lag_detector::{DetectorConfig, DetectorError, start_detector};
use log::{info, warn};
use serde::Serialize;

/// One line of output per verdict transition.
#[derive(Serialize)]
struct VerdictLine {
    elapsed_ms: u64,
    degraded: bool,
}

/// Simulated workload phase.
struct Phase {
    name: &'static str,
    fps: f64,
    long_task_ms: Option<u64>,
    duration: Duration,
}

const PHASES: [Phase; 4] = [
    Phase {
        name: "smooth",
        fps: 60.0,
        long_task_ms: None,
        duration: Duration::from_secs(8),
    },
    Phase {
        name: "janky",
        fps: 4.0,
        long_task_ms: None,
        duration: Duration::from_secs(4),
    },
    Phase {
        name: "smooth",
        fps: 60.0,
        long_task_ms: None,
        duration: Duration::from_secs(6),
    },
    Phase {
        name: "long tasks",
        fps: 60.0,
        long_task_ms: Some(120),
        duration: Duration::from_secs(2),
    },
];

fn config_path() -> Option<PathBuf> {
    if let Some(arg) = std::env::args().nth(1) {
        return Some(PathBuf::from(arg));
    }
    let mut path = dirs::config_dir()?;
    path.push("lag-detector");
    path.push("config.toml");
    path.exists().then_some(path)
}

fn run_phase(
    controller: &SimController,
    phase: &Phase,
    stop: &crossbeam_channel::Receiver<()>,
) -> bool {
    info!("phase: {} ({} fps)", phase.name, phase.fps);
    controller.set_fps(phase.fps);
    let end = Instant::now() + phase.duration;
    loop {
        if let Some(ms) = phase.long_task_ms {
            controller.inject_long_tasks(vec![Duration::from_millis(ms)]);
        }
        let wait = end
            .saturating_duration_since(Instant::now())
            .min(Duration::from_millis(500));
        match stop.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return false,
            Err(RecvTimeoutError::Timeout) if Instant::now() >= end => return true,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match config_path() {
        Some(path) => {
            info!("loading config from {}", path.display());
            DetectorConfig::load(path)?
        }
        None => DetectorConfig::default(),
    };
    println!("{}", serde_json::to_string(&config)?);

    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    let host = SimulatedHost::new();
    let controller = host.controller();
    let handle = start_detector(
        config,
        host,
        Some(Box::new(|err: &DetectorError| {
            warn!("lag detection disabled: {err}");
        })),
    );
    if !handle.is_running() {
        return Ok(());
    }

    let mut changes = handle.subscribe();
    let started = Instant::now();
    std::thread::spawn(move || {
        loop {
            let degraded = changes.wait();
            let line = VerdictLine {
                elapsed_ms: started.elapsed().as_millis() as u64,
                degraded,
            };
            if let Ok(json) = serde_json::to_string(&line) {
                println!("{json}");
            }
        }
    });

    'outer: loop {
        for phase in &PHASES {
            if !run_phase(&controller, phase, &stop_rx) {
                break 'outer;
            }
        }
    }

    handle.stop();
    Ok(())
}
