// Timeouts, topics, lookup tables, runtime arguments
use std::path::PathBuf;

use clap::Parser;

use crate::messages::Command;

// Runtime loop frequency (the vehicle re-checks the sensor every 100ms)
pub const LOOP_HZ: u64 = 10;
// Tick periods are whole milliseconds
pub const MAX_LOOP_HZ: u64 = 1000;

// Obstacle threshold in cm, inclusive
pub const DISTANCIA_MINIMA: f32 = 20.0;

// Shared duty-cycle output range and power-on value (50%)
pub const DUTY_MAX: u16 = 1023;
pub const DEFAULT_DUTY: u16 = 512;

// Zenoh command topics (payload is ignored, only the key selects the command)
pub const TOPIC_ADELANTE: &str = "adelantepa";
pub const TOPIC_ATRAS: &str = "atraspa";
pub const TOPIC_DERECHA: &str = "derechapa";
pub const TOPIC_IZQUIERDA: &str = "izquierdapa";
pub const TOPIC_ALTO: &str = "altopapi";

// Zenoh outputs
pub const TOPIC_DISTANCIA: &str = "disdanipapi"; // human readable distance + alerts
pub const TOPIC_TELEMETRY: &str = "carrito/telemetria"; // JSON record per tick
pub const TOPIC_HEALTH: &str = "carrito/state/health"; // health status

pub const ALERT_PAYLOAD: &str = "¡Alerta! Obstáculo cercano";

/// Command topics and the command each one selects
pub const BUS_TOPICS: [(&str, Command); 5] = [
    (TOPIC_ADELANTE, Command::Forward),
    (TOPIC_ATRAS, Command::Backward),
    (TOPIC_DERECHA, Command::Right),
    (TOPIC_IZQUIERDA, Command::Left),
    (TOPIC_ALTO, Command::Stop),
];

/// NEC remote button codes
pub const REMOTE_SYMBOLS: [(i32, Command); 5] = [
    (0x18, Command::Forward),
    (0x52, Command::Backward),
    (0x5a, Command::Right),
    (0x08, Command::Left),
    (0x1c, Command::Stop),
];

// Serial bridge to the motor/sensor microcontroller
pub const BRIDGE_BAUDRATE: u32 = 115_200;

/// Command line arguments for the vehicle runtime
#[derive(Debug, Clone, Parser)]
#[command(name = "carrito-runtime", about = "Motion control runtime for the carrito vehicle")]
pub struct Args {
    /// Serial port of the motor/sensor bridge (runs on simulated hardware if omitted)
    #[arg(long)]
    pub port: Option<String>,

    /// Bridge baudrate
    #[arg(long, default_value_t = BRIDGE_BAUDRATE)]
    pub baud: u32,

    /// Initial duty cycle for both motor groups (0-1023)
    #[arg(long, default_value_t = DEFAULT_DUTY as i32)]
    pub duty: i32,

    /// Control loop frequency (1-1000 Hz)
    #[arg(
        long,
        default_value_t = LOOP_HZ,
        value_parser = clap::value_parser!(u64).range(1..=MAX_LOOP_HZ)
    )]
    pub loop_hz: u64,

    /// Stream of decoded IR codes, one per line ("-" for stdin)
    #[arg(long)]
    pub remote_input: Option<PathBuf>,

    /// Treat the path ahead as blocked after this many consecutive sensor failures
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub fail_safe_after: Option<u32>,

    /// Distance reported by the simulated sensor, in cm
    #[arg(long, default_value_t = 100.0)]
    pub sim_distance: f32,
}

impl Args {
    /// Tick period derived from `loop_hz`, at least 1ms
    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1000 / self.loop_hz.clamp(1, MAX_LOOP_HZ))
    }
}
