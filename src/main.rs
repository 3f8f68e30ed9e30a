mod dispatcher;
mod error;
mod gatt_const;
mod panel;
mod protocol;
mod router;
mod scheduler;
mod session;
mod state;

use std::sync::Arc;

use log::info;

use crate::dispatcher::CommandDispatcher;
use crate::panel::PanelScreen;
use crate::protocol::MOTOR_COUNT;
use crate::router::NotificationRouter;
use crate::session::bluer_link::BluerBackend;
use crate::session::TransportSession;
use crate::state::StatusBoard;

const SESSION_MAILBOX: usize = 32;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    info!("Starting the YuSmart console panel");

    let session = bluer::Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;
    info!("Bluetooth adapter {} ready", adapter.name());

    let board = StatusBoard::new();
    board.register(Arc::new(PanelScreen));

    let router = NotificationRouter::new(board.clone());
    let backend = BluerBackend::new(adapter);
    let transport =
        TransportSession::new(backend, board.clone(), router, SESSION_MAILBOX);
    let dispatcher =
        CommandDispatcher::new(transport.handle(), board.clone(), MOTOR_COUNT);

    panel::run(dispatcher, transport.handle(), board).await?;

    info!("Panel stopped");
    Ok(())
}
