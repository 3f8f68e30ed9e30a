use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::Result;

#[cfg(test)]
use mockall::automock;

pub type Address = String;
pub type Responder<T> = oneshot::Sender<T>;

/// Identity of a discovered console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub addr: Address,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

//Requests over the session mailbox, the responder carries the outcome
#[derive(Debug)]
pub enum SessionRequest {
    Connect { resp: Responder<Result<PeerInfo>> },
    Disconnect { resp: Responder<Result<()>> },
    Write { payload: Vec<u8>, resp: Responder<Result<()>> },
}

/// What a live link produces on its own.
#[derive(Debug)]
pub enum LinkSignal {
    /// One notify value, one JSON payload.
    Notification(Vec<u8>),
    /// The link is gone; the reason is for the log only.
    Dropped(String),
}

/// Discovery and link establishment, the platform side of the session.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LinkBackend: Send + Sync + 'static {
    /// Scans until a console matching the fixed service filter shows up.
    async fn discover(&self) -> Result<PeerInfo>;

    /// Connects, resolves the command and notify endpoints and
    /// subscribes. On failure nothing stays bound.
    async fn establish(&self, peer: &PeerInfo) -> Result<Box<dyn ConsoleLink>>;
}

/// One established link to the console.
#[async_trait]
pub trait ConsoleLink: Send + 'static {
    /// Transmits one payload over the command endpoint.
    async fn write(&mut self, payload: &[u8]) -> Result<()>;

    /// Next notify payload or the drop signal; pends while the link is
    /// idle.
    async fn recv(&mut self) -> LinkSignal;

    /// Best-effort teardown of the platform link.
    async fn close(&mut self);
}
