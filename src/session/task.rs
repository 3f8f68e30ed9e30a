use futures::future;
use log::{error, info, warn};
use tokio::sync::{mpsc, oneshot};

use super::handle::{SessionConn, SessionHandle};
use super::link_api::{
    ConsoleLink, LinkBackend, LinkSignal, PeerInfo, SessionRequest,
};
use crate::error::{Result, SessionError};
use crate::protocol::Notification;
use crate::router::NotificationRouter;
use crate::state::{ConnectionState, StatusBoard};

/// Owner of the one console session.
///
/// All link state lives inside the spawned task. Requests arrive over
/// the mailbox and are served one at a time, so writes reach the console
/// in issue order and the board has a single writer. Dropping this
/// closes the link and stops the task.
pub struct TransportSession {
    session_tx: SessionConn,
    _drop_tx: oneshot::Sender<()>,
}

impl TransportSession {
    pub fn new(
        backend: impl LinkBackend, board: StatusBoard,
        router: NotificationRouter, req_buffer_size: usize,
    ) -> Self {
        let (session_tx, session_rx) = mpsc::channel(req_buffer_size);
        let (_drop_tx, drop_rx) = oneshot::channel();

        tokio::spawn(session_loop(backend, board, router, session_rx, drop_rx));

        Self { session_tx, _drop_tx }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.session_tx.clone())
    }
}

async fn session_loop(
    backend: impl LinkBackend, board: StatusBoard,
    router: NotificationRouter, mut session_rx: mpsc::Receiver<SessionRequest>,
    mut drop_rx: oneshot::Receiver<()>,
) {
    let mut link: Option<Box<dyn ConsoleLink>> = None;

    loop {
        tokio::select! {
            req = session_rx.recv() => match req {
                Some(req) => {
                    handle_request(&backend, &board, &mut link, req).await;
                }
                None => break,
            },

            signal = poll_link(&mut link) => {
                handle_signal(&board, &router, &mut link, signal).await;
            }

            _ = &mut drop_rx => break,
        }
    }

    if let Some(mut link) = link.take() {
        link.close().await;
    }
    board.set_connection(ConnectionState::Disconnected, None);
    info!("session task stopped");
}

/// Pends forever while no link is up, so the select stays quiet.
async fn poll_link(link: &mut Option<Box<dyn ConsoleLink>>) -> LinkSignal {
    match link.as_mut() {
        Some(link) => link.recv().await,
        None => future::pending().await,
    }
}

async fn handle_request(
    backend: &impl LinkBackend, board: &StatusBoard,
    link: &mut Option<Box<dyn ConsoleLink>>, req: SessionRequest,
) {
    match req {
        SessionRequest::Connect { resp } => {
            let outcome = connect_console(backend, board, link).await;
            if resp.send(outcome).is_err() {
                error!("connect requester went away before the outcome");
            }
        }
        SessionRequest::Disconnect { resp } => {
            let outcome = disconnect_console(board, link).await;
            if resp.send(outcome).is_err() {
                error!("disconnect requester went away before the outcome");
            }
        }
        SessionRequest::Write { payload, resp } => {
            let outcome = match link.as_mut() {
                Some(link) => link.write(&payload).await,
                None => Err(SessionError::NotConnected),
            };
            if resp.send(outcome).is_err() {
                error!("write requester went away before the outcome");
            }
        }
    }
}

async fn connect_console(
    backend: &impl LinkBackend, board: &StatusBoard,
    link: &mut Option<Box<dyn ConsoleLink>>,
) -> Result<PeerInfo> {
    if link.is_some() {
        return Err(SessionError::AlreadyConnected);
    }

    board.set_connection(ConnectionState::Scanning, None);
    let peer = match backend.discover().await {
        Ok(peer) => peer,
        Err(e) => {
            board.set_connection(ConnectionState::Disconnected, None);
            return Err(e);
        }
    };

    info!(
        "console found: {} ({})",
        peer.name.as_deref().unwrap_or("unnamed"),
        peer.addr
    );
    board.set_connection(ConnectionState::Connecting, Some(peer.clone()));

    match backend.establish(&peer).await {
        Ok(new_link) => {
            *link = Some(new_link);
            board.set_connection(ConnectionState::Connected, None);
            info!("console link established");
            Ok(peer)
        }
        Err(e) => {
            // nothing stays bound after a failed setup
            board.set_connection(ConnectionState::Disconnected, None);
            Err(e)
        }
    }
}

async fn disconnect_console(
    board: &StatusBoard, link: &mut Option<Box<dyn ConsoleLink>>,
) -> Result<()> {
    match link.take() {
        Some(mut link) => {
            link.close().await;
            board.set_connection(ConnectionState::Disconnected, None);
            Ok(())
        }
        None => Err(SessionError::NotConnected),
    }
}

async fn handle_signal(
    board: &StatusBoard, router: &NotificationRouter,
    link: &mut Option<Box<dyn ConsoleLink>>, signal: LinkSignal,
) {
    match signal {
        LinkSignal::Notification(raw) => match Notification::decode(&raw) {
            Ok(notification) => router.route(notification),
            // the bad payload is dropped, the session stays up
            Err(e) => warn!("dropping notification: {e}"),
        },
        LinkSignal::Dropped(reason) => {
            info!("console link dropped: {reason}");
            if let Some(mut link) = link.take() {
                link.close().await;
            }
            board.set_connection(ConnectionState::Disconnected, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testkit::{
        await_state, fake_link, recording_observer, rejecting_link, test_peer,
        FakeLinkHandle, Observed, RecordingObserver,
    };
    use crate::session::MockLinkBackend;
    use mockall::predicate;
    use serde_json::json;
    use std::sync::Arc;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    struct Harness {
        session: TransportSession,
        handle: SessionHandle,
        board: StatusBoard,
        observer: Arc<RecordingObserver>,
        seen: mpsc::UnboundedReceiver<Observed>,
    }

    fn spawn_session(backend: MockLinkBackend) -> Harness {
        let board = StatusBoard::new();
        let (observer, seen) = recording_observer();
        board.register(observer.clone());
        let router = NotificationRouter::new(board.clone());
        let session = TransportSession::new(backend, board.clone(), router, 8);
        let handle = session.handle();
        Harness { session, handle, board, observer, seen }
    }

    fn backend_with_console() -> (MockLinkBackend, FakeLinkHandle) {
        let (link, console) = fake_link();
        let mut backend = MockLinkBackend::new();
        let peer = test_peer();
        backend
            .expect_discover()
            .times(1)
            .returning(move || Ok(peer.clone()));
        backend
            .expect_establish()
            .with(predicate::eq(test_peer()))
            .times(1)
            .return_once(move |_| Ok(Box::new(link) as Box<dyn ConsoleLink>));
        (backend, console)
    }

    fn status_payload() -> Vec<u8> {
        json!({
            "type": "status",
            "time": "2026-08-25T07:30:00Z",
            "active_alarms": 0,
            "scheduled_alarms": 1,
            "fsr_readings": [0.2],
            "motors_active": [false],
            "fsr_threshold": 1.0,
        })
        .to_string()
        .into_bytes()
    }

    fn disconnects(observer: &RecordingObserver) -> usize {
        observer
            .connections()
            .into_iter()
            .filter(|state| *state == ConnectionState::Disconnected)
            .count()
    }

    #[tokio::test]
    async fn test_connect_reports_each_phase() {
        init_logger();
        let (backend, _console) = backend_with_console();
        let harness = spawn_session(backend);

        let peer = harness.handle.connect().await.unwrap();

        assert_eq!(peer, test_peer());
        assert!(harness.board.is_connected());
        assert_eq!(harness.board.peer(), Some(test_peer()));
        assert_eq!(
            harness.observer.connections(),
            vec![
                ConnectionState::Scanning,
                ConnectionState::Connecting,
                ConnectionState::Connected,
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_while_connected_is_rejected() {
        init_logger();
        let (backend, _console) = backend_with_console();
        let harness = spawn_session(backend);

        harness.handle.connect().await.unwrap();
        let err = harness.handle.connect().await.unwrap_err();

        assert!(matches!(err, SessionError::AlreadyConnected));
        assert!(harness.board.is_connected());
        // no extra transitions from the rejected attempt
        assert_eq!(harness.observer.connections().len(), 3);
    }

    #[tokio::test]
    async fn test_aborted_discovery_returns_to_disconnected() {
        init_logger();
        let mut backend = MockLinkBackend::new();
        backend.expect_discover().times(1).returning(|| {
            Err(SessionError::DiscoveryAborted("scan timed out".to_string()))
        });
        let harness = spawn_session(backend);

        let err = harness.handle.connect().await.unwrap_err();

        assert!(matches!(err, SessionError::DiscoveryAborted(_)));
        assert_eq!(
            harness.observer.connections(),
            vec![ConnectionState::Scanning, ConnectionState::Disconnected]
        );
        assert_eq!(harness.board.peer(), None);
    }

    #[tokio::test]
    async fn test_failed_setup_leaves_nothing_bound() {
        init_logger();
        let mut backend = MockLinkBackend::new();
        let peer = test_peer();
        backend
            .expect_discover()
            .times(1)
            .returning(move || Ok(peer.clone()));
        backend.expect_establish().times(1).returning(|_| {
            Err(SessionError::LinkSetupFailed(
                "notify subscription refused".to_string(),
            ))
        });
        let harness = spawn_session(backend);

        let err = harness.handle.connect().await.unwrap_err();

        assert!(matches!(err, SessionError::LinkSetupFailed(_)));
        assert!(!harness.board.is_connected());
        assert_eq!(harness.board.peer(), None);
        assert_eq!(harness.board.status(), None);

        // and the half-open session does not accept writes
        let err = harness.handle.write(b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[tokio::test]
    async fn test_write_requires_a_connected_console() {
        init_logger();
        let harness = spawn_session(MockLinkBackend::new());

        let err = harness.handle.write(b"{}".to_vec()).await.unwrap_err();

        assert!(matches!(err, SessionError::NotConnected));
    }

    #[tokio::test]
    async fn test_write_reaches_the_link_once() {
        init_logger();
        let (backend, mut console) = backend_with_console();
        let harness = spawn_session(backend);
        harness.handle.connect().await.unwrap();

        harness.handle.write(b"{\"type\":\"stop_all\"}".to_vec()).await.unwrap();

        assert_eq!(console.take_write().await, b"{\"type\":\"stop_all\"}".to_vec());
        assert_eq!(console.try_take_write(), None);
    }

    #[tokio::test]
    async fn test_rejected_write_resolves_with_the_reason() {
        init_logger();
        let (link, _console) = rejecting_link("simulated refusal");
        let mut backend = MockLinkBackend::new();
        let peer = test_peer();
        backend
            .expect_discover()
            .times(1)
            .returning(move || Ok(peer.clone()));
        backend
            .expect_establish()
            .times(1)
            .return_once(move |_| Ok(Box::new(link) as Box<dyn ConsoleLink>));
        let harness = spawn_session(backend);
        harness.handle.connect().await.unwrap();

        let err = harness.handle.write(b"{}".to_vec()).await.unwrap_err();

        assert!(matches!(err, SessionError::WriteRejected(_)));
        // a refused write does not tear the session down
        assert!(harness.board.is_connected());
    }

    #[tokio::test]
    async fn test_notifications_flow_to_the_board() {
        init_logger();
        let (backend, console) = backend_with_console();
        let mut harness = spawn_session(backend);
        harness.handle.connect().await.unwrap();

        console.push_notification(&status_payload());

        loop {
            match harness.seen.recv().await {
                Some(Observed::Status(snapshot)) => {
                    assert_eq!(snapshot.scheduled_alarms, 1);
                    break;
                }
                Some(_) => {}
                None => panic!("observer channel closed early"),
            }
        }
        assert!(harness.board.status().is_some());
    }

    #[tokio::test]
    async fn test_malformed_notification_is_dropped_quietly() {
        init_logger();
        let (backend, console) = backend_with_console();
        let mut harness = spawn_session(backend);
        harness.handle.connect().await.unwrap();

        console.push_notification(b"not json at all");
        console.push_notification(&status_payload());

        await_status(&mut harness.seen).await;
        assert!(harness.board.is_connected());
        let statuses = harness
            .observer
            .log()
            .into_iter()
            .filter(|seen| matches!(seen, Observed::Status(_)))
            .count();
        assert_eq!(statuses, 1);
    }

    async fn await_status(seen: &mut mpsc::UnboundedReceiver<Observed>) {
        loop {
            match seen.recv().await {
                Some(Observed::Status(_)) => return,
                Some(_) => {}
                None => panic!("observer channel closed early"),
            }
        }
    }

    #[tokio::test]
    async fn test_remote_drop_publishes_exactly_one_disconnect() {
        init_logger();
        let (backend, console) = backend_with_console();
        let mut harness = spawn_session(backend);
        harness.handle.connect().await.unwrap();

        console.push_notification(&status_payload());
        await_status(&mut harness.seen).await;

        console.drop_link("peer vanished");
        await_state(&mut harness.seen, ConnectionState::Disconnected).await;

        // a request round-trip proves the mailbox has drained
        let err = harness.handle.write(b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));

        assert_eq!(disconnects(&harness.observer), 1);
        assert!(console.closed());
        assert_eq!(harness.board.status(), None);
        assert_eq!(harness.board.peer(), None);
    }

    #[tokio::test]
    async fn test_disconnect_closes_and_reports_once() {
        init_logger();
        let (backend, console) = backend_with_console();
        let harness = spawn_session(backend);
        harness.handle.connect().await.unwrap();

        harness.handle.disconnect().await.unwrap();

        assert!(console.closed());
        assert!(!harness.board.is_connected());
        assert_eq!(disconnects(&harness.observer), 1);

        let err = harness.handle.disconnect().await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
        assert_eq!(disconnects(&harness.observer), 1);
    }

    #[tokio::test]
    async fn test_dropping_the_owner_stops_the_task() {
        init_logger();
        let (backend, console) = backend_with_console();
        let Harness { session, handle, observer, mut seen, .. } =
            spawn_session(backend);
        handle.connect().await.unwrap();

        drop(session);
        await_state(&mut seen, ConnectionState::Disconnected).await;

        assert!(console.closed());
        assert_eq!(disconnects(&observer), 1);
        let err = handle.write(b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }
}
