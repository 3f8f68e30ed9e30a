use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::command::CommandFamily;
use crate::error::{Result, SessionError};

/// Latest full status report from the console.
///
/// Every status notification fully replaces the previous snapshot, there
/// is no incremental merge. `time` is kept verbatim as reported since
/// firmware revisions differ in how much timezone qualification they
/// include.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub time: String,
    pub active_alarms: u32,
    pub scheduled_alarms: u32,
    /// Force sensor readings in kilograms, one per sensor.
    pub fsr_readings: Vec<f64>,
    pub motors_active: Vec<bool>,
    pub fsr_threshold: f64,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
}

impl StatusSnapshot {
    pub fn any_motor_active(&self) -> bool {
        self.motors_active.iter().any(|active| *active)
    }

    /// True when any sensor reads at or above the trigger threshold.
    pub fn any_sensor_over_threshold(&self) -> bool {
        self.fsr_readings
            .iter()
            .any(|reading| *reading >= self.fsr_threshold)
    }

    /// Degrees still to climb (positive) or drop (negative) to reach the
    /// target, when the console reports both temperatures.
    pub fn temperature_delta(&self) -> Option<f64> {
        match (self.current_temperature, self.target_temperature) {
            (Some(current), Some(target)) => Some(target - current),
            _ => None,
        }
    }
}

/// Console to client messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Status(StatusSnapshot),
    MotorStopped { motor_id: u8, reason: String },
    Ack { family: CommandFamily },
    Error { message: String },
    /// Recognizably tagged but unknown to this client. Carried whole so
    /// the router can log it.
    Unknown { kind: String, body: Value },
}

#[derive(Deserialize)]
struct MotorStoppedBody {
    motor_id: u8,
    reason: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl Notification {
    /// Decodes one notify value.
    ///
    /// Fails only when the bytes are not a JSON object, the `type`
    /// discriminator is missing, or a recognized kind carries an
    /// ill-typed body. Unrecognized kinds decode to [`Self::Unknown`].
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let body: Value = serde_json::from_slice(raw)
            .map_err(|e| SessionError::MalformedPayload(e.to_string()))?;

        let Some(kind) = body.get("type").and_then(Value::as_str) else {
            return Err(SessionError::MalformedPayload(
                "missing type discriminator".to_string(),
            ));
        };

        match kind {
            "status" => {
                let snapshot: StatusSnapshot =
                    serde_json::from_value(body.clone()).map_err(|e| {
                        SessionError::MalformedPayload(e.to_string())
                    })?;
                Ok(Notification::Status(snapshot))
            }
            "motor_stopped" => {
                let stop: MotorStoppedBody = serde_json::from_value(body.clone())
                    .map_err(|e| SessionError::MalformedPayload(e.to_string()))?;
                Ok(Notification::MotorStopped {
                    motor_id: stop.motor_id,
                    reason: stop.reason,
                })
            }
            "error" => {
                let fault: ErrorBody = serde_json::from_value(body.clone())
                    .map_err(|e| SessionError::MalformedPayload(e.to_string()))?;
                Ok(Notification::Error { message: fault.message })
            }
            _ => match CommandFamily::from_ack_kind(kind) {
                Some(family) => Ok(Notification::Ack { family }),
                None => Ok(Notification::Unknown {
                    kind: kind.to_string(),
                    body,
                }),
            },
        }
    }
}
