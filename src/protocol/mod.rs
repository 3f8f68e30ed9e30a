//! JSON vocabulary spoken over the console's GATT characteristics.
//!
//! One characteristic write or notify value carries exactly one UTF-8
//! JSON object tagged with a `type` discriminator. Encoding is total
//! over the command set; decoding is tolerant, an unrecognized
//! discriminator never fails.

mod command;
mod notification;

pub use command::{Alarm, Command, CommandFamily};
pub use notification::{Notification, StatusSnapshot};

/// Motors fitted to the console, addressed as `0..MOTOR_COUNT`.
pub const MOTOR_COUNT: u8 = 3;
