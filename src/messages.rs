// Define message types for the runtime

use serde::{Deserialize, Serialize};

/// Directional intent from either command source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    /// Code or topic with no mapping; never reaches the motors
    Unknown,
}

impl Command {
    /// Unknown is treated as if nothing was received
    pub fn known(self) -> Option<Command> {
        match self {
            Command::Unknown => None,
            cmd => Some(cmd),
        }
    }
}

/// Result of one ranging-sensor poll
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObstacleState {
    /// None when the sensor could not be read this tick
    pub distance_cm: Option<f32>,
    pub blocked: bool,
}

impl ObstacleState {
    pub fn degraded(&self) -> bool {
        self.distance_cm.is_none()
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    ObstacleBlocked,
    SensorDegraded,
}

impl From<&ObstacleState> for RuntimeHealth {
    fn from(obstacle: &ObstacleState) -> Self {
        if obstacle.blocked {
            RuntimeHealth::ObstacleBlocked
        } else if obstacle.degraded() {
            RuntimeHealth::SensorDegraded
        } else {
            RuntimeHealth::Ok
        }
    }
}

/// Per-tick record pushed to the telemetry store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    pub distancia: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_not_known() {
        assert_eq!(Command::Unknown.known(), None);
        assert_eq!(Command::Left.known(), Some(Command::Left));
    }

    #[test]
    fn test_health_from_obstacle() {
        let clear = ObstacleState {
            distance_cm: Some(80.0),
            blocked: false,
        };
        let blocked = ObstacleState {
            distance_cm: Some(10.0),
            blocked: true,
        };
        let degraded = ObstacleState::default();

        assert_eq!(RuntimeHealth::from(&clear), RuntimeHealth::Ok);
        assert_eq!(RuntimeHealth::from(&blocked), RuntimeHealth::ObstacleBlocked);
        assert_eq!(RuntimeHealth::from(&degraded), RuntimeHealth::SensorDegraded);
        assert_eq!(
            serde_json::to_string(&RuntimeHealth::SensorDegraded).unwrap(),
            "\"sensor_degraded\""
        );
    }

    #[test]
    fn test_telemetry_record_json() {
        let ok = TelemetryRecord {
            distancia: Some(42.5),
            error: None,
        };
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"distancia":42.5}"#);

        let failed = TelemetryRecord {
            distancia: None,
            error: Some("out of range".to_string()),
        };
        assert_eq!(
            serde_json::to_string(&failed).unwrap(),
            r#"{"distancia":null,"error":"out of range"}"#
        );
    }
}
