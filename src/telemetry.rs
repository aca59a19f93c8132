// Per-tick outputs: distance string, alert, telemetry record, health
//
// Publishing never fails the control loop; errors are logged and dropped.

use tracing::{debug, warn};
use zenoh::Session;
use zenoh::pubsub::Publisher;

use crate::config::{ALERT_PAYLOAD, TOPIC_DISTANCIA, TOPIC_HEALTH, TOPIC_TELEMETRY};
use crate::messages::{RuntimeHealth, TelemetryRecord};
use crate::runtime::TickReport;

/// Human readable distance, e.g. "42.37 cm". None when the read failed.
pub fn distance_payload(report: &TickReport) -> Option<String> {
    report
        .obstacle
        .distance_cm
        .map(|distance| format!("{:.2} cm", distance))
}

pub fn telemetry_record(report: &TickReport) -> TelemetryRecord {
    TelemetryRecord {
        distancia: report.obstacle.distance_cm,
        error: report.fault.clone(),
    }
}

pub struct TelemetryPublisher {
    distance: Publisher<'static>,
    telemetry: Publisher<'static>,
    health: Publisher<'static>,
}

impl TelemetryPublisher {
    pub async fn declare(
        session: &Session,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self {
            distance: session.declare_publisher(TOPIC_DISTANCIA).await?,
            telemetry: session.declare_publisher(TOPIC_TELEMETRY).await?,
            health: session.declare_publisher(TOPIC_HEALTH).await?,
        })
    }

    /// Push everything for one tick
    pub async fn publish(&self, report: &TickReport) {
        if let Some(distance) = distance_payload(report) {
            put(&self.distance, TOPIC_DISTANCIA, distance).await;
        }
        if report.decision.alert() {
            put(&self.distance, TOPIC_DISTANCIA, ALERT_PAYLOAD.to_string()).await;
        }

        match serde_json::to_string(&telemetry_record(report)) {
            Ok(json) => put(&self.telemetry, TOPIC_TELEMETRY, json).await,
            Err(e) => warn!("Failed to encode telemetry: {}", e),
        }

        match serde_json::to_string(&RuntimeHealth::from(&report.obstacle)) {
            Ok(json) => put(&self.health, TOPIC_HEALTH, json).await,
            Err(e) => warn!("Failed to encode health: {}", e),
        }
    }
}

async fn put(publisher: &Publisher<'static>, topic: &str, payload: String) {
    debug!("Publishing on {}: {}", topic, payload);
    if let Err(e) = publisher.put(payload).await {
        warn!("Publish to {} failed: {}", topic, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::{Decision, Reason};
    use crate::messages::{Command, ObstacleState};

    fn report(distance_cm: Option<f32>, fault: Option<&str>) -> TickReport {
        TickReport {
            obstacle: ObstacleState {
                distance_cm,
                blocked: false,
            },
            fault: fault.map(str::to_string),
            decision: Decision {
                command: Command::Stop,
                reason: Reason::Held,
            },
            moved: false,
        }
    }

    #[test]
    fn test_distance_payload_format() {
        assert_eq!(
            distance_payload(&report(Some(42.371), None)).as_deref(),
            Some("42.37 cm")
        );
        assert_eq!(distance_payload(&report(None, Some("Out of range"))), None);
    }

    #[test]
    fn test_record_carries_error() {
        let record = telemetry_record(&report(None, Some("Out of range")));
        assert_eq!(record.distancia, None);
        assert_eq!(record.error.as_deref(), Some("Out of range"));

        let record = telemetry_record(&report(Some(80.0), None));
        assert_eq!(record.distancia, Some(80.0));
        assert!(record.error.is_none());
    }
}
