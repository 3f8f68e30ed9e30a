use tokio::sync::{mpsc, oneshot};

use super::link_api::{PeerInfo, SessionRequest};
use crate::error::{Result, SessionError};

pub type SessionConn = mpsc::Sender<SessionRequest>;

/// Cloneable requester side of the session task.
///
/// Every call is one mailbox round-trip. A closed mailbox means the
/// session task is gone, which callers see as `NotConnected`.
#[derive(Clone)]
pub struct SessionHandle {
    session_tx: SessionConn,
}

impl SessionHandle {
    pub(crate) fn new(session_tx: SessionConn) -> Self {
        Self { session_tx }
    }

    /// Scans for the console and establishes the link.
    pub async fn connect(&self) -> Result<PeerInfo> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionRequest::Connect { resp: tx }, rx).await
    }

    /// Tears the link down; the board publishes the disconnect.
    pub async fn disconnect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionRequest::Disconnect { resp: tx }, rx).await
    }

    /// Transmits one encoded payload over the command endpoint.
    pub async fn write(&self, payload: Vec<u8>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionRequest::Write { payload, resp: tx }, rx).await
    }

    async fn request<T>(
        &self, req: SessionRequest, rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.session_tx
            .send(req)
            .await
            .map_err(|_| SessionError::NotConnected)?;
        rx.await.map_err(|_| SessionError::NotConnected)?
    }
}
