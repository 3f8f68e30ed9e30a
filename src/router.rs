//! Fan-out of decoded console notifications onto the status board.

use log::debug;

use crate::protocol::Notification;
use crate::state::{ConsoleEvent, StatusBoard};

/// Routes each decoded notification to its board effect, in arrival
/// order. Total over the notification kinds; unknown ones are logged and
/// dropped without an event.
pub struct NotificationRouter {
    board: StatusBoard,
}

impl NotificationRouter {
    pub fn new(board: StatusBoard) -> Self {
        Self { board }
    }

    pub fn route(&self, notification: Notification) {
        match notification {
            Notification::Status(snapshot) => self.board.publish_status(snapshot),
            Notification::MotorStopped { motor_id, reason } => self
                .board
                .publish_event(ConsoleEvent::MotorStopped { motor_id, reason }),
            Notification::Ack { family } => {
                self.board.publish_event(ConsoleEvent::CommandAcked { family })
            }
            Notification::Error { message } => {
                self.board.publish_event(ConsoleEvent::ConsoleFault { message })
            }
            Notification::Unknown { kind, body } => {
                debug!("ignoring unknown notification kind {kind}: {body}");
            }
        }
    }
}
