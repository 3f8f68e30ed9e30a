//! Typed command surface of the panel, one async method per console
//! command.
//!
//! Every method validates its arguments before touching the transport,
//! requires a connected session and resolves once the write completes.
//! Acknowledgments are not awaited; the console sends them later and
//! they reach the front end as observer events. Every failure is
//! returned to the caller and additionally published as exactly one
//! `CommandFailed` event, so the front end shows each failure once.

use log::debug;
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::error::{Result, SessionError};
use crate::protocol::{Alarm, Command};
use crate::session::SessionHandle;
use crate::state::{ConsoleEvent, StatusBoard};

#[derive(Clone)]
pub struct CommandDispatcher {
    session: SessionHandle,
    board: StatusBoard,
    motor_count: u8,
}

impl CommandDispatcher {
    pub fn new(session: SessionHandle, board: StatusBoard, motor_count: u8) -> Self {
        Self { session, board, motor_count }
    }

    /// Asks for a full status report; the answer arrives as a status
    /// notification.
    pub async fn status_request(&self) -> Result<()> {
        self.dispatch(Command::StatusRequest, Ok(())).await
    }

    /// Pushes the given client clock reading to the console.
    pub async fn sync_time(&self, timestamp: OffsetDateTime) -> Result<()> {
        self.dispatch(Command::SyncTime { timestamp }, Ok(())).await
    }

    /// Replaces the console schedule. An empty list is valid and clears
    /// the console.
    pub async fn schedule(&self, alarms: Vec<Alarm>) -> Result<()> {
        let check = self.check_alarms(&alarms);
        self.dispatch(Command::Schedule { alarms }, check).await
    }

    /// Runs one motor for `duration` seconds as a manual check.
    pub async fn motor_test(&self, motor_id: u8, duration: u32) -> Result<()> {
        let check = self
            .check_motor_id(motor_id)
            .and_then(|()| check_duration(duration));
        self.dispatch(Command::MotorTest { motor_id, duration }, check).await
    }

    /// Stops every motor immediately.
    pub async fn stop_all(&self) -> Result<()> {
        self.dispatch(Command::StopAll, Ok(())).await
    }

    /// Writes one option in the console's configuration store.
    pub async fn update_config(
        &self, section: &str, option: &str, value: Value,
    ) -> Result<()> {
        let check = check_config_key(section, option);
        self.dispatch(
            Command::UpdateConfig {
                section: section.to_string(),
                option: option.to_string(),
                value,
            },
            check,
        )
        .await
    }

    /// Shorthand for the sensor trigger threshold the console keeps in
    /// its `Application` config section. Kilograms, strictly positive.
    pub async fn set_fsr_threshold(&self, threshold: f64) -> Result<()> {
        let check = check_threshold(threshold);
        self.dispatch(
            Command::UpdateConfig {
                section: "Application".to_string(),
                option: "fsr_threshold".to_string(),
                value: json!(threshold),
            },
            check,
        )
        .await
    }

    /// Sets the heater target in degrees Celsius.
    pub async fn set_temperature(&self, value: f64) -> Result<()> {
        let check = check_temperature(value);
        self.dispatch(Command::SetTemperature { value }, check).await
    }

    async fn dispatch(&self, command: Command, check: Result<()>) -> Result<()> {
        let family = command.family();

        let outcome = match check {
            Ok(()) => self.deliver(command).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            debug!("{family} command failed: {e}");
            self.board.publish_event(ConsoleEvent::CommandFailed {
                family,
                error: e.to_string(),
            });
        }

        outcome
    }

    async fn deliver(&self, command: Command) -> Result<()> {
        if !self.board.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.session.write(command.encode()?).await
    }

    fn check_motor_id(&self, motor_id: u8) -> Result<()> {
        if motor_id >= self.motor_count {
            return Err(SessionError::InvalidArgument(format!(
                "motor id {motor_id} out of range, console has {} motors",
                self.motor_count
            )));
        }
        Ok(())
    }

    fn check_alarms(&self, alarms: &[Alarm]) -> Result<()> {
        for alarm in alarms {
            self.check_motor_id(alarm.motor_id)?;
            check_duration(alarm.duration)?;
            check_intensity(alarm.intensity)?;
        }
        Ok(())
    }
}

fn check_duration(duration: u32) -> Result<()> {
    if duration == 0 {
        return Err(SessionError::InvalidArgument(
            "duration must be positive".to_string(),
        ));
    }
    Ok(())
}

fn check_intensity(intensity: u8) -> Result<()> {
    if intensity > 100 {
        return Err(SessionError::InvalidArgument(format!(
            "intensity {intensity} exceeds 100 percent"
        )));
    }
    Ok(())
}

fn check_config_key(section: &str, option: &str) -> Result<()> {
    if section.is_empty() || option.is_empty() {
        return Err(SessionError::InvalidArgument(
            "config section and option must be non-empty".to_string(),
        ));
    }
    Ok(())
}

fn check_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(SessionError::InvalidArgument(format!(
            "threshold must be a positive number of kilograms, got {threshold}"
        )));
    }
    Ok(())
}

fn check_temperature(value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(SessionError::InvalidArgument(format!(
            "target temperature must be finite, got {value}"
        )));
    }
    Ok(())
}
