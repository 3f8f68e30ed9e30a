//! In-memory doubles shared by the session, router and dispatcher tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future;
use tokio::sync::mpsc;

use super::link_api::{ConsoleLink, LinkSignal, PeerInfo};
use crate::error::{Result, SessionError};
use crate::protocol::StatusSnapshot;
use crate::state::{ConnectionState, ConsoleEvent, ConsoleObserver};

pub(crate) fn test_peer() -> PeerInfo {
    PeerInfo {
        addr: "AA:BB:CC:DD:EE:FF".to_string(),
        name: Some("YuSmart".to_string()),
        rssi: Some(-58),
    }
}

/// Scripted console side of a link: injects signals, captures writes.
pub(crate) struct FakeLinkHandle {
    signal_tx: mpsc::UnboundedSender<LinkSignal>,
    write_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    closed: Arc<AtomicBool>,
}

impl FakeLinkHandle {
    pub(crate) fn push_notification(&self, raw: &[u8]) {
        let _ = self.signal_tx.send(LinkSignal::Notification(raw.to_vec()));
    }

    pub(crate) fn drop_link(&self, reason: &str) {
        let _ = self.signal_tx.send(LinkSignal::Dropped(reason.to_string()));
    }

    pub(crate) async fn take_write(&mut self) -> Vec<u8> {
        self.write_rx.recv().await.expect("link side gone")
    }

    pub(crate) fn try_take_write(&mut self) -> Option<Vec<u8>> {
        self.write_rx.try_recv().ok()
    }

    pub(crate) fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub(crate) struct FakeLink {
    signal_rx: mpsc::UnboundedReceiver<LinkSignal>,
    write_tx: mpsc::UnboundedSender<Vec<u8>>,
    reject_writes: Option<String>,
    closed: Arc<AtomicBool>,
}

pub(crate) fn fake_link() -> (FakeLink, FakeLinkHandle) {
    fake_link_with(None)
}

/// Link whose writes all fail with `WriteRejected(reason)`.
pub(crate) fn rejecting_link(reason: &str) -> (FakeLink, FakeLinkHandle) {
    fake_link_with(Some(reason.to_string()))
}

fn fake_link_with(reject_writes: Option<String>) -> (FakeLink, FakeLinkHandle) {
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let (write_tx, write_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let link = FakeLink {
        signal_rx,
        write_tx,
        reject_writes,
        closed: closed.clone(),
    };
    let handle = FakeLinkHandle { signal_tx, write_rx, closed };
    (link, handle)
}

#[async_trait]
impl ConsoleLink for FakeLink {
    async fn write(&mut self, payload: &[u8]) -> Result<()> {
        if let Some(reason) = &self.reject_writes {
            return Err(SessionError::WriteRejected(reason.clone()));
        }
        let _ = self.write_tx.send(payload.to_vec());
        Ok(())
    }

    async fn recv(&mut self) -> LinkSignal {
        match self.signal_rx.recv().await {
            Some(signal) => signal,
            // a silent link pends instead of spuriously dropping
            None => future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// What an observer saw, awaitable over the channel and assertable
/// through the log.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Observed {
    Connection(ConnectionState),
    Status(StatusSnapshot),
    Notice(ConsoleEvent),
}

pub(crate) struct RecordingObserver {
    log: Mutex<Vec<Observed>>,
    seen_tx: mpsc::UnboundedSender<Observed>,
}

pub(crate) fn recording_observer(
) -> (Arc<RecordingObserver>, mpsc::UnboundedReceiver<Observed>) {
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let observer =
        Arc::new(RecordingObserver { log: Mutex::new(Vec::new()), seen_tx });
    (observer, seen_rx)
}

impl RecordingObserver {
    pub(crate) fn log(&self) -> Vec<Observed> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn connections(&self) -> Vec<ConnectionState> {
        self.log()
            .into_iter()
            .filter_map(|seen| match seen {
                Observed::Connection(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn notices(&self) -> Vec<ConsoleEvent> {
        self.log()
            .into_iter()
            .filter_map(|seen| match seen {
                Observed::Notice(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    fn record(&self, observed: Observed) {
        self.log.lock().unwrap().push(observed.clone());
        let _ = self.seen_tx.send(observed);
    }
}

impl ConsoleObserver for RecordingObserver {
    fn connection_changed(&self, state: ConnectionState, _peer: Option<&PeerInfo>) {
        self.record(Observed::Connection(state));
    }

    fn status_changed(&self, snapshot: &StatusSnapshot) {
        self.record(Observed::Status(snapshot.clone()));
    }

    fn notice(&self, event: &ConsoleEvent) {
        self.record(Observed::Notice(event.clone()));
    }
}

/// Waits until the observer reports the wanted connection state.
pub(crate) async fn await_state(
    seen: &mut mpsc::UnboundedReceiver<Observed>, want: ConnectionState,
) {
    loop {
        match seen.recv().await {
            Some(Observed::Connection(state)) if state == want => return,
            Some(_) => {}
            None => panic!("observer channel closed before {want:?}"),
        }
    }
}
