//! Alarm construction helpers for the panel: wall-clock parsing, the
//! next-occurrence rollover and the console defaults.
//!
//! The client computes the absolute fire instant and the console takes
//! it as authoritative, so a schedule survives a console clock that
//! drifted or was never synced.

use rand::Rng;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, Time};

use crate::error::{Result, SessionError};
use crate::protocol::{Alarm, MOTOR_COUNT};

pub const DEFAULT_DURATION_SECS: u32 = 60;
pub const DEFAULT_INTENSITY: u8 = 100;
pub const DEFAULT_LABEL: &str = "Alarm";

/// Parses an `HH:MM` wall-clock entry.
pub fn parse_clock(input: &str) -> Result<Time> {
    let format = format_description!("[hour]:[minute]");
    Time::parse(input.trim(), &format).map_err(|_| {
        SessionError::InvalidArgument(format!("expected HH:MM, got {input:?}"))
    })
}

/// Absolute fire instant for a wall-clock alarm: today at `clock`, or
/// tomorrow when that moment has already passed. A clock equal to `now`
/// rolls over too.
pub fn next_occurrence(clock: Time, now: OffsetDateTime) -> OffsetDateTime {
    let today = now.replace_time(clock);
    if today <= now {
        today + Duration::days(1)
    } else {
        today
    }
}

/// Builds one schedule entry with the console defaults. Without an
/// explicit motor, one of the console's motors is picked at random; an
/// empty label falls back to the default.
pub fn build_alarm(
    fire_time: OffsetDateTime, motor_id: Option<u8>, label: Option<&str>,
) -> Alarm {
    let motor_id = motor_id
        .unwrap_or_else(|| rand::rng().random_range(0..MOTOR_COUNT));
    let label = match label {
        Some(label) if !label.is_empty() => label,
        _ => DEFAULT_LABEL,
    };

    Alarm {
        time: fire_time,
        motor_id,
        duration: DEFAULT_DURATION_SECS,
        intensity: DEFAULT_INTENSITY,
        label: label.to_string(),
    }
}
