//! WebSocket transport built on tokio-tungstenite.
//!
//! Each [`Transport::open`] spawns one connection task that performs the
//! handshake and then runs two directions in a `select!` loop:
//!
//! - **Host → Device**: frames queued by [`Transport::send`] on an unbounded
//!   channel are written to the socket as text messages.
//! - **Device → Host**: text and binary messages are forwarded to the session
//!   as [`TransportEventKind::MessageReceived`].
//!
//! Closing the transport drops the outbound channel; the task then sends a
//! close frame and exits.  A task that is still handshaking is aborted.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message as WsMessage,
    },
};
use tracing::{debug, info, warn};

use super::{Transport, TransportError, TransportEvent, TransportEventKind};

/// Close code reported when the link broke without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when the device sent a close frame without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Production [`Transport`].  Must be used inside a Tokio runtime.
#[derive(Default)]
pub struct WebSocketTransport {
    outbound: Option<UnboundedSender<String>>,
    open: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self, address: &str, generation: u64, events: UnboundedSender<TransportEvent>) {
        self.close();

        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        self.outbound = Some(tx);
        self.open = Arc::clone(&open);
        self.task = Some(tokio::spawn(run_connection(
            address.to_string(),
            generation,
            events,
            rx,
            open,
        )));
    }

    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotConnected);
        }
        match &self.outbound {
            Some(tx) => tx.send(frame).map_err(|_| TransportError::NotConnected),
            None => Err(TransportError::NotConnected),
        }
    }

    fn close(&mut self) {
        let was_open = self.open.swap(false, Ordering::Relaxed);
        self.outbound = None;
        if let Some(task) = self.task.take() {
            if !was_open {
                // Still handshaking (or already finished): nothing to close
                // gracefully.
                task.abort();
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn emit(events: &UnboundedSender<TransportEvent>, generation: u64, kind: TransportEventKind) {
    let _ = events.send(TransportEvent { generation, kind });
}

/// Runs one connection from handshake to close.
async fn run_connection(
    address: String,
    generation: u64,
    events: UnboundedSender<TransportEvent>,
    mut outbound: UnboundedReceiver<String>,
    open: Arc<AtomicBool>,
) {
    debug!("connecting to {address} (generation {generation})");

    let ws_stream = match connect_async(address.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!("connection to {address} failed: {e}");
            emit(&events, generation, TransportEventKind::ConnectFailed(e.to_string()));
            return;
        }
    };

    open.store(true, Ordering::Relaxed);
    info!("WebSocket link to {address} open");
    emit(&events, generation, TransportEventKind::Connected);

    let (mut sink, mut stream) = ws_stream.split();

    let (code, reason) = loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        break (ABNORMAL_CLOSURE, e.to_string());
                    }
                }
                None => {
                    // The transport was closed by the host.
                    let close = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "host closing".into(),
                    };
                    let _ = sink.send(WsMessage::Close(Some(close))).await;
                    break (u16::from(CloseCode::Normal), "closed by host".to_string());
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    emit(&events, generation, TransportEventKind::MessageReceived(text.into_bytes()));
                }
                Some(Ok(WsMessage::Binary(bytes))) => {
                    emit(&events, generation, TransportEventKind::MessageReceived(bytes));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    break match frame {
                        Some(f) => (u16::from(f.code), f.reason.into_owned()),
                        None => (NO_STATUS_RECEIVED, String::new()),
                    };
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => break (ABNORMAL_CLOSURE, e.to_string()),
                None => break (ABNORMAL_CLOSURE, "stream ended".to_string()),
            },
        }
    };

    open.store(false, Ordering::Relaxed);
    info!("WebSocket link to {address} closed ({code}): {reason}");
    emit(&events, generation, TransportEventKind::Disconnected { code, reason });
}
