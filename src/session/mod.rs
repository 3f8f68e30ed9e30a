pub mod bluer_link;
mod handle;
mod link_api;
mod task;

#[cfg(test)]
pub(crate) mod testkit;

pub use handle::SessionHandle;
pub use link_api::{
    Address, ConsoleLink, LinkBackend, LinkSignal, PeerInfo, Responder,
    SessionRequest,
};
pub use task::TransportSession;

#[cfg(test)]
pub(crate) use link_api::MockLinkBackend;
