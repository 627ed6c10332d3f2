//! Room-server connection.
//!
//! The session never talks to a socket. Requests go out through an
//! [`Outbox`]; decoded server events come back as [`Inbound`] values on a
//! channel the event loop selects on.

pub mod ws;

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use url::Url;

use crate::logging::{log, obj, v_str, Domain, Level};
use crate::protocol::{OutboundEvent, ServerEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Connected { sid: Option<String> },
    Event(ServerEvent),
    Closed { reason: String },
}

#[async_trait]
pub trait Outbox {
    async fn send(&self, ev: &OutboundEvent) -> Result<()>;
}

/// Send in order, stopping at the first failure
pub async fn send_all(outbox: &(dyn Outbox + Send + Sync), events: &[OutboundEvent]) -> Result<()> {
    for ev in events {
        outbox.send(ev).await?;
    }
    Ok(())
}

/// Keeps everything it is asked to send. Offline mode and tests.
#[derive(Debug, Default)]
pub struct RecordingOutbox {
    sent: Mutex<Vec<OutboundEvent>>,
}

impl RecordingOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundEvent> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Outbox for RecordingOutbox {
    async fn send(&self, ev: &OutboundEvent) -> Result<()> {
        log(Level::Debug, Domain::Net, "recorded", obj(&[("name", v_str(ev.name))]));
        self.sent
            .lock()
            .map_err(|_| anyhow!("outbox lock poisoned"))?
            .push(ev.clone());
        Ok(())
    }
}

/// `http://host:5000` → `ws://host:5000/socket.io/?EIO=4&transport=websocket`
pub fn socket_url(server_url: &str) -> Result<Url> {
    let mut url = Url::parse(server_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(anyhow!("unsupported scheme '{}'", other)),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot use scheme {} for {}", scheme, server_url))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}
