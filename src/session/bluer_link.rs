//! `LinkBackend` over BlueZ, speaking to the console in the central role.

use std::collections::HashSet;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bluer::gatt::remote::{Characteristic, CharacteristicWriteRequest};
use bluer::gatt::WriteOp;
use bluer::{
    Adapter, AdapterEvent, Address, Device, DeviceEvent, DeviceProperty,
    DiscoveryFilter, DiscoveryTransport,
};
use futures::{pin_mut, Stream, StreamExt};
use log::{debug, info};

use super::link_api::{ConsoleLink, LinkBackend, LinkSignal, PeerInfo};
use crate::error::{Result, SessionError};
use crate::gatt_const::{
    CONSOLE_COMMAND_CHAR_UUID, CONSOLE_NAME, CONSOLE_NOTIFY_CHAR_UUID,
    CONSOLE_SERVICE_UUID,
};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_RETRIES: usize = 2;

pub struct BluerBackend {
    adapter: Adapter,
}

impl BluerBackend {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Accepts a device advertising the console service, or the console
    /// name for firmware that does not advertise its service list.
    async fn inspect(&self, addr: Address) -> Option<PeerInfo> {
        let device = match self.adapter.device(addr) {
            Ok(device) => device,
            Err(e) => {
                debug!("cannot inspect {addr}: {e}");
                return None;
            }
        };

        let name = device.name().await.ok().flatten();
        let uuids = device.uuids().await.ok().flatten().unwrap_or_default();

        let service_match = uuids.contains(&CONSOLE_SERVICE_UUID);
        let name_match = name.as_deref() == Some(CONSOLE_NAME);
        if !service_match && !name_match {
            debug!("skipping {addr}, not a console");
            return None;
        }

        let rssi = device.rssi().await.ok().flatten();
        Some(PeerInfo { addr: addr.to_string(), name, rssi })
    }
}

#[async_trait]
impl LinkBackend for BluerBackend {
    async fn discover(&self) -> Result<PeerInfo> {
        let filter = DiscoveryFilter {
            uuids: HashSet::from([CONSOLE_SERVICE_UUID]),
            transport: DiscoveryTransport::Le,
            ..Default::default()
        };
        self.adapter
            .set_discovery_filter(filter)
            .await
            .map_err(|e| SessionError::DiscoveryAborted(e.to_string()))?;

        let events = self
            .adapter
            .discover_devices()
            .await
            .map_err(|e| SessionError::DiscoveryAborted(e.to_string()))?;

        let search = async {
            pin_mut!(events);
            while let Some(event) = events.next().await {
                if let AdapterEvent::DeviceAdded(addr) = event {
                    debug!("inspecting discovered device {addr}");
                    if let Some(peer) = self.inspect(addr).await {
                        return Ok(peer);
                    }
                }
            }
            Err(SessionError::DiscoveryAborted(
                "discovery stream ended".to_string(),
            ))
        };

        match tokio::time::timeout(DISCOVERY_TIMEOUT, search).await {
            Ok(found) => found,
            Err(_) => Err(SessionError::DiscoveryAborted(format!(
                "no console found within {}s",
                DISCOVERY_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn establish(&self, peer: &PeerInfo) -> Result<Box<dyn ConsoleLink>> {
        let addr: Address = peer.addr.parse().map_err(|e| {
            SessionError::LinkSetupFailed(format!(
                "bad address {}: {e}",
                peer.addr
            ))
        })?;
        let device = self
            .adapter
            .device(addr)
            .map_err(|e| SessionError::LinkSetupFailed(e.to_string()))?;

        match bind_console(&device).await {
            Ok(link) => Ok(link),
            Err(e) => {
                // no half-open device survives a failed setup
                if let Err(e) = device.disconnect().await {
                    debug!("post-failure disconnect: {e}");
                }
                Err(e)
            }
        }
    }
}

async fn bind_console(device: &Device) -> Result<Box<dyn ConsoleLink>> {
    if !device.is_connected().await.map_err(setup_err)? {
        let mut retries = CONNECT_RETRIES;
        loop {
            match device.connect().await {
                Ok(()) => break,
                Err(e) if retries > 0 => {
                    debug!("connect attempt failed, retrying: {e}");
                    retries -= 1;
                }
                Err(e) => return Err(setup_err(e)),
            }
        }
        info!("connected to console {}", device.address());
    }

    let mut command_char = None;
    let mut notify_char = None;
    for service in device.services().await.map_err(setup_err)? {
        if service.uuid().await.map_err(setup_err)? != CONSOLE_SERVICE_UUID {
            continue;
        }
        for characteristic in service.characteristics().await.map_err(setup_err)? {
            let uuid = characteristic.uuid().await.map_err(setup_err)?;
            if uuid == CONSOLE_COMMAND_CHAR_UUID {
                command_char = Some(characteristic);
            } else if uuid == CONSOLE_NOTIFY_CHAR_UUID {
                notify_char = Some(characteristic);
            }
        }
    }
    let command_char = command_char.ok_or_else(|| {
        SessionError::LinkSetupFailed("command characteristic not found".to_string())
    })?;
    let notify_char = notify_char.ok_or_else(|| {
        SessionError::LinkSetupFailed("notify characteristic not found".to_string())
    })?;

    let notify_stream = notify_char.notify().await.map_err(setup_err)?;
    let device_events = device.events().await.map_err(setup_err)?;

    Ok(Box::new(BluerLink {
        device: device.clone(),
        command_char,
        notify_stream: Box::pin(notify_stream),
        device_events: Box::pin(device_events),
    }))
}

fn setup_err(e: bluer::Error) -> SessionError {
    SessionError::LinkSetupFailed(e.to_string())
}

pub struct BluerLink {
    device: Device,
    command_char: Characteristic,
    notify_stream: Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>,
    device_events: Pin<Box<dyn Stream<Item = DeviceEvent> + Send>>,
}

#[async_trait]
impl ConsoleLink for BluerLink {
    async fn write(&mut self, payload: &[u8]) -> Result<()> {
        // request op, so the console's attribute layer can refuse
        let request = CharacteristicWriteRequest {
            op_type: WriteOp::Request,
            ..Default::default()
        };
        self.command_char
            .write_ext(payload, &request)
            .await
            .map_err(|e| SessionError::WriteRejected(e.to_string()))
    }

    async fn recv(&mut self) -> LinkSignal {
        loop {
            tokio::select! {
                value = self.notify_stream.next() => match value {
                    Some(raw) => return LinkSignal::Notification(raw),
                    None => {
                        return LinkSignal::Dropped(
                            "notify stream ended".to_string(),
                        )
                    }
                },
                event = self.device_events.next() => match event {
                    Some(DeviceEvent::PropertyChanged(
                        DeviceProperty::Connected(false),
                    )) => {
                        return LinkSignal::Dropped(
                            "console reported disconnect".to_string(),
                        )
                    }
                    Some(_) => {}
                    None => {
                        return LinkSignal::Dropped(
                            "device event stream ended".to_string(),
                        )
                    }
                },
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.device.disconnect().await {
            debug!("console disconnect: {e}");
        }
    }
}
