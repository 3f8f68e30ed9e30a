//! Client-side authoritative view of the console.
//!
//! The board holds the connection state and the latest status snapshot,
//! and fans every change out to registered observers. The session task is
//! the only writer; readers may poll the getters or subscribe.

use std::sync::{Arc, Mutex};

use log::debug;

use crate::protocol::{CommandFamily, StatusSnapshot};
use crate::session::PeerInfo;

/// Connection lifecycle of the one console session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Scanning,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// Transient happenings worth showing once, never part of retained state.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    MotorStopped { motor_id: u8, reason: String },
    CommandAcked { family: CommandFamily },
    CommandFailed { family: CommandFamily, error: String },
    ConsoleFault { message: String },
}

/// Interface a front end implements to follow the console.
///
/// Callbacks run on the thread that caused the change, outside the board
/// lock and in registration order. They must return promptly and may
/// re-enter the board getters.
pub trait ConsoleObserver: Send + Sync + 'static {
    fn connection_changed(&self, state: ConnectionState, peer: Option<&PeerInfo>);
    fn status_changed(&self, snapshot: &StatusSnapshot);
    fn notice(&self, event: &ConsoleEvent);
}

/// Observer every board starts with, so publishing never probes for a
/// receiver at call time.
pub struct NoopObserver;

impl ConsoleObserver for NoopObserver {
    fn connection_changed(&self, _state: ConnectionState, _peer: Option<&PeerInfo>) {}
    fn status_changed(&self, _snapshot: &StatusSnapshot) {}
    fn notice(&self, _event: &ConsoleEvent) {}
}

#[derive(Default)]
struct BoardState {
    connection: ConnectionState,
    peer: Option<PeerInfo>,
    status: Option<StatusSnapshot>,
}

/// Shared status board, cheap to clone.
#[derive(Clone)]
pub struct StatusBoard {
    state: Arc<Mutex<BoardState>>,
    observers: Arc<Mutex<Vec<Arc<dyn ConsoleObserver>>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let seed: Vec<Arc<dyn ConsoleObserver>> = vec![Arc::new(NoopObserver)];
        Self {
            state: Arc::new(Mutex::new(BoardState::default())),
            observers: Arc::new(Mutex::new(seed)),
        }
    }

    pub fn register(&self, observer: Arc<dyn ConsoleObserver>) {
        self.observers.lock().unwrap().push(observer);
    }

    pub fn connection(&self) -> ConnectionState {
        self.state.lock().unwrap().connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_connected()
    }

    /// Console identity while scanning has found one, `None` when
    /// disconnected.
    pub fn peer(&self) -> Option<PeerInfo> {
        self.state.lock().unwrap().peer.clone()
    }

    /// Latest snapshot, `None` until one arrives and after a disconnect.
    pub fn status(&self) -> Option<StatusSnapshot> {
        self.state.lock().unwrap().status.clone()
    }

    /// Moves the connection to `next`; only the session task calls this.
    ///
    /// Re-entering the current state is a no-op, so a disconnect is
    /// published exactly once no matter how the teardown was reached.
    /// Reaching `Disconnected` clears the peer and the snapshot.
    pub(crate) fn set_connection(
        &self, next: ConnectionState, peer: Option<PeerInfo>,
    ) {
        // take the clones under the lock, notify after releasing it
        let current_peer = {
            let mut state = self.state.lock().unwrap();
            if state.connection == next {
                return;
            }
            state.connection = next;
            if next == ConnectionState::Disconnected {
                state.peer = None;
                state.status = None;
            } else if peer.is_some() {
                state.peer = peer;
            }
            state.peer.clone()
        };

        debug!("connection state now {next:?}");
        for observer in self.observers_snapshot() {
            observer.connection_changed(next, current_peer.as_ref());
        }
    }

    /// Replaces the snapshot and announces it.
    pub(crate) fn publish_status(&self, snapshot: StatusSnapshot) {
        self.state.lock().unwrap().status = Some(snapshot.clone());
        for observer in self.observers_snapshot() {
            observer.status_changed(&snapshot);
        }
    }

    /// Announces a one-shot event without touching retained state.
    pub(crate) fn publish_event(&self, event: ConsoleEvent) {
        for observer in self.observers_snapshot() {
            observer.notice(&event);
        }
    }

    fn observers_snapshot(&self) -> Vec<Arc<dyn ConsoleObserver>> {
        self.observers.lock().unwrap().clone()
    }
}
