//! Realtime duplex channel to the remote voice service.
//!
//! `RealtimeConnector::connect` opens one persistent connection; the returned
//! `RealtimeChannel` carries outbound audio/control events and yields inbound
//! events through a receiver the controller takes once. Audio sends are
//! fire-and-forget: when the channel is not connected the frame is dropped and
//! counted, never raised.

use crate::config::RealtimeConfig;
use crate::error::{ConnectionErrorKind, VoiceError, VoiceResult};
use crate::protocol::{InboundEvent, OutboundEvent};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// WebSocket close code for a normal, intentional close.
pub const NORMAL_CLOSE: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Connecting = 0,
    Connected = 1,
    Closing = 2,
    Closed = 3,
}

impl ChannelState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ChannelState::Connecting,
            1 => ChannelState::Connected,
            2 => ChannelState::Closing,
            _ => ChannelState::Closed,
        }
    }
}

/// Shared, lock-free channel state cell.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new(state: ChannelState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    pub fn get(&self) -> ChannelState {
        ChannelState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ChannelState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Counts audio frames dropped because the channel was not connected.
#[derive(Debug, Clone, Default)]
pub struct DropCounter(Arc<AtomicU64>);

impl DropCounter {
    pub fn record(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything the channel reports back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Inbound(InboundEvent),
    /// Remote or local close. `code` is the WebSocket close code when one was sent.
    Closed { code: Option<u16>, reason: String },
    /// Transport failure after the connection was established.
    Failed {
        kind: ConnectionErrorKind,
        message: String,
    },
}

impl ChannelEvent {
    /// True for a clean close initiated with code 1000.
    pub fn is_normal_close(&self) -> bool {
        matches!(self, ChannelEvent::Closed { code: Some(NORMAL_CLOSE), .. })
    }
}

/// One open duplex session.
#[async_trait]
pub trait RealtimeChannel: Send {
    fn state(&self) -> ChannelState;

    /// Queue a control event. Errors when the channel is not connected.
    fn send(&self, event: OutboundEvent) -> VoiceResult<()>;

    /// Queue one base64 PCM16 frame; silently dropped and counted when not connected.
    fn send_audio(&self, audio: String);

    fn dropped_frames(&self) -> u64;

    /// Inbound event stream. Yields `Some` exactly once.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>>;

    /// Close with code 1000. Idempotent.
    async fn close(&mut self);
}

/// Opens channels. Shared by the controller across reconnects.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self, config: &RealtimeConfig) -> VoiceResult<Box<dyn RealtimeChannel>>;
}

/// WebSocket connector for OpenAI-compatible realtime endpoints.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl RealtimeConnector for WsConnector {
    async fn connect(&self, config: &RealtimeConfig) -> VoiceResult<Box<dyn RealtimeChannel>> {
        let channel = WsRealtimeChannel::connect(config).await?;
        Ok(Box::new(channel))
    }
}

/// Realtime channel over tokio-tungstenite.
pub struct WsRealtimeChannel {
    state: StateCell,
    outbound: mpsc::UnboundedSender<Message>,
    events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    dropped: DropCounter,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WsRealtimeChannel {
    pub async fn connect(config: &RealtimeConfig) -> VoiceResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(VoiceError::fatal("realtime API key is not configured"));
        }

        let endpoint = config.endpoint();
        info!("🔌 Connecting realtime channel: {}", endpoint);

        let mut request = endpoint.as_str().into_client_request()?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.trim()))
            .map_err(|e| VoiceError::fatal(format!("invalid API key header: {}", e)))?;
        request.headers_mut().insert("Authorization", auth);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws, _response) = tokio_tungstenite::connect_async(request).await?;
        let (mut sink, mut stream) = ws.split();

        let state = StateCell::new(ChannelState::Connected);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel::<ChannelEvent>();

        let writer_state = state.clone();
        let writer_events = ev_tx.clone();
        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    warn!("Realtime send failed: {}", e);
                    if writer_state.get() == ChannelState::Connected {
                        writer_state.set(ChannelState::Closed);
                        let _ = writer_events.send(ChannelEvent::Failed {
                            kind: ConnectionErrorKind::Transient,
                            message: e.to_string(),
                        });
                    }
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_state = state.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match InboundEvent::parse(&text) {
                        Ok(event) => {
                            debug!("<- {}", event.kind());
                            if ev_tx.send(ChannelEvent::Inbound(event)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Ignoring malformed realtime event: {}", e),
                    },
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                            None => (None, String::new()),
                        };
                        info!(code = ?code, "Realtime channel closed by remote: {}", reason);
                        reader_state.set(ChannelState::Closed);
                        let _ = ev_tx.send(ChannelEvent::Closed { code, reason });
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let err = VoiceError::from(e);
                        let kind = if err.is_fatal() {
                            ConnectionErrorKind::Fatal
                        } else {
                            ConnectionErrorKind::Transient
                        };
                        warn!("Realtime receive failed: {}", err);
                        reader_state.set(ChannelState::Closed);
                        let _ = ev_tx.send(ChannelEvent::Failed {
                            kind,
                            message: err.to_string(),
                        });
                        return;
                    }
                }
            }
            // Stream ended without a close frame (abnormal closure)
            if reader_state.get() != ChannelState::Closed {
                reader_state.set(ChannelState::Closed);
                let _ = ev_tx.send(ChannelEvent::Closed {
                    code: Some(1006),
                    reason: "connection dropped".to_string(),
                });
            }
        });

        info!("✅ Realtime channel connected");

        Ok(Self {
            state,
            outbound: out_tx,
            events: Some(ev_rx),
            dropped: DropCounter::default(),
            reader,
            writer,
        })
    }
}

#[async_trait]
impl RealtimeChannel for WsRealtimeChannel {
    fn state(&self) -> ChannelState {
        self.state.get()
    }

    fn send(&self, event: OutboundEvent) -> VoiceResult<()> {
        if self.state.get() != ChannelState::Connected {
            return Err(VoiceError::ChannelSend(format!(
                "channel is {:?}",
                self.state.get()
            )));
        }
        let text = event.to_json()?;
        self.outbound
            .send(Message::Text(text))
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))
    }

    fn send_audio(&self, audio: String) {
        if self.state.get() != ChannelState::Connected {
            let total = self.dropped.record();
            debug!(dropped = total, "audio frame dropped: channel not connected");
            return;
        }
        if self.send(OutboundEvent::InputAudioAppend { audio }).is_err() {
            self.dropped.record();
        }
    }

    fn dropped_frames(&self) -> u64 {
        self.dropped.get()
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>> {
        self.events.take()
    }

    async fn close(&mut self) {
        if matches!(self.state.get(), ChannelState::Closing | ChannelState::Closed) {
            return;
        }
        self.state.set(ChannelState::Closing);
        let frame = tokio_tungstenite::tungstenite::protocol::CloseFrame {
            code: CloseCode::Normal,
            reason: "session disabled".into(),
        };
        let _ = self.outbound.send(Message::Close(Some(frame)));
        let _ = tokio::time::timeout(std::time::Duration::from_secs(2), &mut self.writer).await;
        self.reader.abort();
        self.state.set(ChannelState::Closed);
        info!("🔌 Realtime channel closed");
    }
}

impl Drop for WsRealtimeChannel {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
