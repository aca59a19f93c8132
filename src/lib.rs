pub mod arbiter;
pub mod config;
pub mod messages;
pub mod motor;
pub mod obstacle;
pub mod runtime;
pub mod sources;
pub mod telemetry;
