// Obstacle detection from the front HC-SR04 ultrasonic sensor
//
// A failed read is fail-open by default: the tick continues as if the path
// were clear, but the sample is tagged degraded. `with_fail_safe` makes a run
// of consecutive failures count as blocked instead.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::config::DISTANCIA_MINIMA;
use crate::messages::ObstacleState;
use crate::motor::BridgeError;

/// Longest echo the sensor produces before giving up (~5m round trip)
pub const ECHO_TIMEOUT_US: u32 = 30_000;

/// Speed of sound as us per cm, one way
const US_PER_CM: f32 = 29.1;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Out of range")]
    OutOfRange,

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Source of raw echo measurements
pub trait RangeSensor {
    /// Echo pulse width in microseconds, 0 if no echo came back
    fn echo_us(&mut self) -> Result<u32, SensorError>;
}

/// Convert an echo pulse width to a one-way distance
pub fn echo_to_cm(echo_us: u32) -> f32 {
    (echo_us as f32 / 2.0) / US_PER_CM
}

fn cm_to_echo(distance_cm: f32) -> u32 {
    (distance_cm * 2.0 * US_PER_CM).round() as u32
}

/// One poll: the state for this tick, plus the failure if the read failed
#[derive(Debug)]
pub struct ObstacleSample {
    pub state: ObstacleState,
    pub fault: Option<SensorError>,
}

pub struct ObstacleMonitor<S: RangeSensor> {
    sensor: S,
    fail_safe_after: Option<u32>,
    consecutive_failures: u32,
}

impl<S: RangeSensor> ObstacleMonitor<S> {
    pub fn new(sensor: S) -> Self {
        Self {
            sensor,
            fail_safe_after: None,
            consecutive_failures: 0,
        }
    }

    /// Report blocked once `failures` reads in a row have failed (0 counts as 1)
    pub fn with_fail_safe(mut self, failures: Option<u32>) -> Self {
        self.fail_safe_after = failures.map(|n| n.max(1));
        self
    }

    /// Blocked iff distance is at or under the threshold
    pub fn classify(distance_cm: f32) -> ObstacleState {
        ObstacleState {
            distance_cm: Some(distance_cm),
            blocked: distance_cm <= DISTANCIA_MINIMA,
        }
    }

    /// Read the sensor once
    pub fn poll(&mut self) -> ObstacleSample {
        let reading = self.sensor.echo_us().and_then(|echo| {
            if echo == 0 || echo > ECHO_TIMEOUT_US {
                Err(SensorError::OutOfRange)
            } else {
                Ok(echo_to_cm(echo))
            }
        });

        match reading {
            Ok(distance_cm) => {
                self.consecutive_failures = 0;
                debug!("Distance: {:.2} cm", distance_cm);
                ObstacleSample {
                    state: Self::classify(distance_cm),
                    fault: None,
                }
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let blocked = self
                    .fail_safe_after
                    .is_some_and(|n| self.consecutive_failures >= n);
                if blocked && self.fail_safe_after == Some(self.consecutive_failures) {
                    warn!(
                        "{} consecutive sensor failures, treating path as blocked",
                        self.consecutive_failures
                    );
                }
                ObstacleSample {
                    state: ObstacleState {
                        distance_cm: None,
                        blocked,
                    },
                    fault: Some(e),
                }
            }
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Scripted sensor used when no bridge is configured, and in tests.
/// Plays back queued readings, then keeps reporting `resting_cm`.
#[derive(Debug, Default)]
pub struct SimulatedRange {
    script: VecDeque<Option<f32>>,
    resting_cm: Option<f32>,
}

impl SimulatedRange {
    /// Sensor that always sees `distance_cm`
    pub fn fixed(distance_cm: f32) -> Self {
        Self {
            script: VecDeque::new(),
            resting_cm: Some(distance_cm),
        }
    }

    /// Queue a reading; None is a failed read
    pub fn push(&mut self, reading: Option<f32>) {
        self.script.push_back(reading);
    }

    pub fn then(mut self, reading: Option<f32>) -> Self {
        self.push(reading);
        self
    }
}

impl RangeSensor for SimulatedRange {
    fn echo_us(&mut self) -> Result<u32, SensorError> {
        let reading = self.script.pop_front().unwrap_or(self.resting_cm);
        match reading {
            Some(cm) => Ok(cm_to_echo(cm)),
            None => Err(SensorError::OutOfRange),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_conversion() {
        assert!((echo_to_cm(2910) - 50.0).abs() < 0.01);
        assert!((echo_to_cm(873) - 15.0).abs() < 0.01);
    }

    #[test]
    fn test_threshold_inclusive() {
        assert!(ObstacleMonitor::<SimulatedRange>::classify(20.0).blocked);
        assert!(ObstacleMonitor::<SimulatedRange>::classify(3.0).blocked);
        assert!(!ObstacleMonitor::<SimulatedRange>::classify(20.01).blocked);
    }

    #[test]
    fn test_poll_blocked_and_clear() {
        let sensor = SimulatedRange::fixed(50.0).then(Some(15.0));
        let mut monitor = ObstacleMonitor::new(sensor);

        let near = monitor.poll();
        assert!(near.state.blocked);
        assert!(near.fault.is_none());

        let far = monitor.poll();
        assert!(!far.state.blocked);
        assert!((far.state.distance_cm.unwrap() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_read_failure_is_fail_open() {
        let mut monitor = ObstacleMonitor::new(SimulatedRange::fixed(50.0).then(None));
        let sample = monitor.poll();
        assert!(matches!(sample.fault, Some(SensorError::OutOfRange)));
        assert!(sample.state.degraded());
        assert!(!sample.state.blocked);

        // next tick polls independently
        assert!(!monitor.poll().state.degraded());
        assert_eq!(monitor.consecutive_failures(), 0);
    }

    #[test]
    fn test_fail_safe_zero_blocks_on_first_failure() {
        let mut monitor =
            ObstacleMonitor::new(SimulatedRange::fixed(50.0).then(None)).with_fail_safe(Some(0));
        assert_eq!(monitor.fail_safe_after, Some(1));
        assert!(monitor.poll().state.blocked);
    }

    #[test]
    fn test_fail_safe_after_consecutive_failures() {
        let sensor = SimulatedRange::fixed(50.0).then(None).then(None).then(None);
        let mut monitor = ObstacleMonitor::new(sensor).with_fail_safe(Some(2));

        assert!(!monitor.poll().state.blocked);
        assert!(monitor.poll().state.blocked);
        assert!(monitor.poll().state.blocked);
        // a good reading clears it
        assert!(!monitor.poll().state.blocked);
    }

    struct Echo(u32);

    impl RangeSensor for Echo {
        fn echo_us(&mut self) -> Result<u32, SensorError> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_missing_or_long_echo_is_out_of_range() {
        for echo in [0, ECHO_TIMEOUT_US + 1] {
            let sample = ObstacleMonitor::new(Echo(echo)).poll();
            assert!(matches!(sample.fault, Some(SensorError::OutOfRange)));
            assert!(!sample.state.blocked);
        }
    }
}
