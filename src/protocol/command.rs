use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use time::OffsetDateTime;

use crate::error::{Result, SessionError};

/// One timed actuation entry of a schedule.
///
/// `time` is the absolute fire instant. The panel computes it, including
/// the next-day rollover for wall-clock entries, and the console takes
/// it as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    pub motor_id: u8,
    /// Seconds the motor runs, positive.
    pub duration: u32,
    /// Percentage, at most 100.
    pub intensity: u8,
    pub label: String,
}

/// Client to console messages.
///
/// Field declaration order is the wire order; serde emits the `type` tag
/// first, so the payloads match what the console firmware expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Asks for a full status report, answered with a status notification.
    StatusRequest,
    /// Pushes the client clock to the console.
    SyncTime {
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    /// Replaces the whole schedule; an empty list clears it.
    Schedule { alarms: Vec<Alarm> },
    /// Runs one motor briefly for a manual check.
    MotorTest { motor_id: u8, duration: u32 },
    /// Stops every motor immediately.
    StopAll,
    /// Writes one option in the console's configuration store.
    UpdateConfig {
        section: String,
        option: String,
        value: Value,
    },
    /// Sets the heater target in degrees Celsius.
    SetTemperature { value: f64 },
}

impl Command {
    /// Serializes into the single JSON object the write endpoint takes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| SessionError::MalformedPayload(e.to_string()))
    }

    pub fn family(&self) -> CommandFamily {
        match self {
            Command::StatusRequest => CommandFamily::Status,
            Command::SyncTime { .. } => CommandFamily::Sync,
            Command::Schedule { .. } => CommandFamily::Schedule,
            Command::MotorTest { .. } => CommandFamily::Test,
            Command::StopAll => CommandFamily::Stop,
            Command::UpdateConfig { .. } => CommandFamily::ConfigUpdate,
            Command::SetTemperature { .. } => CommandFamily::Temperature,
        }
    }
}

/// Command families as the console names them in acknowledgments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFamily {
    Status,
    Sync,
    Schedule,
    Test,
    Stop,
    ConfigUpdate,
    Temperature,
}

impl CommandFamily {
    /// Family behind a `<family>_ack` discriminator, if it is one.
    pub(crate) fn from_ack_kind(kind: &str) -> Option<Self> {
        match kind {
            "sync_ack" => Some(CommandFamily::Sync),
            "schedule_ack" => Some(CommandFamily::Schedule),
            "test_ack" => Some(CommandFamily::Test),
            "stop_ack" => Some(CommandFamily::Stop),
            "config_update_ack" => Some(CommandFamily::ConfigUpdate),
            "temperature_ack" => Some(CommandFamily::Temperature),
            _ => None,
        }
    }
}

impl fmt::Display for CommandFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandFamily::Status => "status",
            CommandFamily::Sync => "sync",
            CommandFamily::Schedule => "schedule",
            CommandFamily::Test => "test",
            CommandFamily::Stop => "stop",
            CommandFamily::ConfigUpdate => "config_update",
            CommandFamily::Temperature => "temperature",
        };
        f.write_str(name)
    }
}
