// Fixed-rate control loop
// Each tick: poll the obstacle sensor, drain the IR mailbox and one bus
// command, resolve, drive the motors, then publish telemetry.
// The sensor is always polled before any command is looked at, so no command
// can get ahead of the obstacle check.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

// local imports
use crate::arbiter::{CommandArbiter, Decision};
use crate::config::{Args, DEFAULT_DUTY};
use crate::messages::{Command, ObstacleState};
use crate::motor::{DriveOutputs, LineBridge, MotionController, MotorDriver, SimulatedOutputs};
use crate::obstacle::{ObstacleMonitor, RangeSensor, SimulatedRange};
use crate::sources::{BusListener, RemoteDecoder, spawn_symbol_reader};
use crate::telemetry::TelemetryPublisher;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What happened during one tick
#[derive(Debug, Clone)]
pub struct TickReport {
    pub obstacle: ObstacleState,
    /// Sensor failure message, if the read failed
    pub fault: Option<String>,
    pub decision: Decision,
    /// Whether motor writes were issued
    pub moved: bool,
}

/// Owns every hardware handle and all control state
pub struct Runtime<O: DriveOutputs, S: RangeSensor> {
    monitor: ObstacleMonitor<S>,
    remote: Arc<RemoteDecoder>,
    bus: BusListener,
    arbiter: CommandArbiter,
    motion: MotionController<O>,
    blocked: bool,
}

impl<O: DriveOutputs, S: RangeSensor> Runtime<O, S> {
    pub fn new(
        motion: MotionController<O>,
        monitor: ObstacleMonitor<S>,
        remote: Arc<RemoteDecoder>,
        bus: BusListener,
    ) -> Self {
        Self {
            monitor,
            remote,
            bus,
            arbiter: CommandArbiter::new(),
            motion,
            blocked: false,
        }
    }

    /// Run one control pass
    pub fn tick(&mut self) -> TickReport {
        // 1. Safety check first
        let sample = self.monitor.poll();
        let fault = sample.fault.map(|e| {
            warn!("Error reading ultrasonic sensor: {}", e);
            e.to_string()
        });
        let obstacle = sample.state;

        if obstacle.blocked != self.blocked {
            if obstacle.blocked {
                warn!("Obstacle detected, stopping the vehicle");
            } else {
                info!("Path clear");
            }
            self.blocked = obstacle.blocked;
        }

        // 2. Drain sources: remote mailbox, then one bus command
        let remote = self.remote.take();
        if remote == Some(Command::Unknown) {
            debug!("Unknown IR command discarded");
        }
        let bus = self.bus.poll();

        // 3. Resolve
        let held = self.motion.state().active_direction;
        let decision = self.arbiter.resolve(&obstacle, remote, bus, held);

        // 4. Drive
        let moved = match self.motion.apply(decision.command) {
            Ok(moved) => moved,
            Err(e) => {
                warn!("Failed to drive {:?}: {}", decision.command, e);
                false
            }
        };

        TickReport {
            obstacle,
            fault,
            decision,
            moved,
        }
    }

    pub fn motion(&self) -> &MotionController<O> {
        &self.motion
    }

    pub fn motion_mut(&mut self) -> &mut MotionController<O> {
        &mut self.motion
    }
}

/// Start feeding the IR mailbox from the configured decoder stream
fn start_remote_input(args: &Args, remote: Arc<RemoteDecoder>) -> Result<(), BoxError> {
    let Some(path) = &args.remote_input else {
        info!("No IR input configured");
        return Ok(());
    };

    if path.as_os_str() == "-" {
        info!("Reading IR codes from stdin");
        spawn_symbol_reader(BufReader::new(std::io::stdin()), remote);
    } else {
        info!("Reading IR codes from {}", path.display());
        spawn_symbol_reader(BufReader::new(File::open(path)?), remote);
    }
    Ok(())
}

fn build_runtime<O: DriveOutputs, S: RangeSensor>(
    outputs: O,
    sensor: S,
    remote: Arc<RemoteDecoder>,
    bus: BusListener,
    args: &Args,
) -> Result<Runtime<O, S>, O::Error> {
    let mut motion = MotionController::new(MotorDriver::new(outputs, DEFAULT_DUTY)?);
    motion.set_speed(args.duty)?;
    let monitor = ObstacleMonitor::new(sensor).with_fail_safe(args.fail_safe_after);
    Ok(Runtime::new(motion, monitor, remote, bus))
}

pub async fn run(args: Args) -> Result<(), BoxError> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let bus = BusListener::subscribe(&session).await?;
    let telemetry = TelemetryPublisher::declare(&session).await?;

    let remote = Arc::new(RemoteDecoder::new());
    start_remote_input(&args, remote.clone())?;

    match &args.port {
        Some(port) => {
            let mut bridge = LineBridge::open_with_baudrate(port, args.baud)?;
            if !bridge.ping()? {
                return Err(format!("Bridge on {} is not responding", port).into());
            }
            let sensor = bridge.try_clone()?;
            let runtime = build_runtime(bridge, sensor, remote, bus, &args)?;
            control_loop(runtime, &telemetry, args.tick_period()).await
        }
        None => {
            warn!(
                "No bridge port given, running on simulated hardware ({} cm ahead)",
                args.sim_distance
            );
            let sensor = SimulatedRange::fixed(args.sim_distance);
            let runtime = build_runtime(SimulatedOutputs::new(), sensor, remote, bus, &args)?;
            control_loop(runtime, &telemetry, args.tick_period()).await
        }
    }
}

async fn control_loop<O: DriveOutputs, S: RangeSensor>(
    mut runtime: Runtime<O, S>,
    telemetry: &TelemetryPublisher,
    period: Duration,
) -> Result<(), BoxError> {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Runtime started: {}ms period", period.as_millis());

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }

        let report = runtime.tick();
        telemetry.publish(&report).await;
    }

    // Dropping the runtime stops the motors
    Ok(())
}
