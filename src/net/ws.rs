//! Socket.IO client over a plain websocket.
//!
//! One task writes queued frames, one task reads, answers heartbeats and
//! forwards decoded events. Nothing is retried: when the socket goes away the
//! reader reports [`Inbound::Closed`] and stops.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::{socket_url, Inbound, Outbox};
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::protocol::frame::{self, Frame};
use crate::protocol::{OutboundEvent, ServerEvent};

const INBOUND_BUFFER: usize = 64;

pub struct WsOutbox {
    tx: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl Outbox for WsOutbox {
    async fn send(&self, ev: &OutboundEvent) -> Result<()> {
        self.tx
            .send(Message::Text(ev.encode()))
            .map_err(|_| anyhow!("connection closed"))
    }
}

pub async fn connect(server_url: &str) -> Result<(WsOutbox, mpsc::Receiver<Inbound>)> {
    let url = socket_url(server_url)?;
    log(Level::Info, Domain::Net, "connecting", obj(&[("url", v_str(url.as_str()))]));
    let (ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    let (mut write, mut read) = ws.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    let (in_tx, in_rx) = mpsc::channel::<Inbound>(INBOUND_BUFFER);

    tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if write.send(msg).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    let replies = out_tx.clone();
    tokio::spawn(async move {
        let reason = read_loop(&mut read, &replies, &in_tx).await;
        log(Level::Warn, Domain::Net, "closed", obj(&[("msg", v_str(&reason))]));
        let _ = in_tx.send(Inbound::Closed { reason }).await;
    });

    Ok((WsOutbox { tx: out_tx }, in_rx))
}

/// What to do with one text frame
#[derive(Debug, PartialEq)]
pub(crate) enum Step {
    Reply(&'static str),
    Deliver(Inbound),
    Stop(String),
    Skip,
}

pub(crate) fn handle_text(text: &str) -> Step {
    let frame = match frame::decode(text) {
        Ok(f) => f,
        Err(e) => {
            log(Level::Warn, Domain::Net, "bad_frame", obj(&[("msg", v_str(&e.to_string()))]));
            return Step::Skip;
        }
    };
    match frame {
        Frame::Open(hs) => {
            log(
                Level::Info,
                Domain::Net,
                "open",
                obj(&[("sid", v_str(&hs.sid)), ("ping_interval", v_num(hs.ping_interval as f64))]),
            );
            Step::Reply(frame::CONNECT)
        }
        Frame::Ping => Step::Reply(frame::PONG),
        Frame::Pong | Frame::Noop => Step::Skip,
        Frame::Connect(data) => {
            let sid = data
                .as_ref()
                .and_then(|v| v.get("sid"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            Step::Deliver(Inbound::Connected { sid })
        }
        Frame::Event { name, data } => match ServerEvent::decode(&name, data) {
            Ok(ev) => Step::Deliver(Inbound::Event(ev)),
            Err(e) => {
                log(
                    Level::Warn,
                    Domain::Net,
                    "decode_failed",
                    obj(&[("name", v_str(&name)), ("msg", v_str(&e.to_string()))]),
                );
                Step::Skip
            }
        },
        Frame::ConnectError(v) => Step::Stop(format!("connection refused: {}", v)),
        Frame::Disconnect | Frame::Close => Step::Stop("disconnected by server".to_string()),
    }
}

/// Returns why reading stopped
pub(crate) async fn read_loop<S>(
    read: &mut S,
    replies: &mpsc::UnboundedSender<Message>,
    events: &mpsc::Sender<Inbound>,
) -> String
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) => return "socket closed".to_string(),
            Ok(_) => continue,
            Err(e) => return e.to_string(),
        };
        match handle_text(&text) {
            Step::Reply(reply) => {
                if replies.send(Message::Text(reply.to_string())).is_err() {
                    return "writer gone".to_string();
                }
            }
            Step::Deliver(inbound) => {
                if events.send(inbound).await.is_err() {
                    return "session gone".to_string();
                }
            }
            Step::Stop(reason) => return reason,
            Step::Skip => {}
        }
    }
    "stream ended".to_string()
}
