//! Ordered, non-overlapping playback of synthesized audio.
//!
//! `AudioPlaybackQueue` owns a FIFO of container-wrapped chunks and a single worker
//! task that plays them one at a time through an `AudioSink`. Chunk n+1 starts only
//! after chunk n finished, failed to decode, or was flushed. A decode failure is
//! logged and the queue moves on.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use rodio::{OutputStream, Sink, Source};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Decodable audio (WAV/MP3 bytes) owned by the queue until played.
#[derive(Debug, Clone)]
pub struct PlaybackChunk {
    pub seq: u64,
    pub bytes: Vec<u8>,
}

/// Progress reported to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started { seq: u64 },
    Finished { seq: u64 },
    Failed { seq: u64, error: String },
    /// Nothing playing and nothing pending.
    Drained,
}

/// Output device seam. `play` resolves when the chunk has finished or was stopped.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, chunk: &PlaybackChunk) -> VoiceResult<()>;

    /// Stop the in-flight chunk immediately.
    fn stop(&self);
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<PlaybackChunk>,
    in_flight: Option<u64>,
    next_seq: u64,
}

/// FIFO playback queue with exactly one chunk in flight.
pub struct AudioPlaybackQueue {
    state: Arc<Mutex<QueueState>>,
    wake: Arc<Notify>,
    sink: Arc<dyn AudioSink>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    worker: JoinHandle<()>,
}

fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    // A poisoned queue still holds valid chunks
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AudioPlaybackQueue {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn new(sink: Arc<dyn AudioSink>) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(QueueState::default()));
        let wake = Arc::new(Notify::new());

        let worker = tokio::spawn(run_worker(
            Arc::clone(&state),
            Arc::clone(&wake),
            Arc::clone(&sink),
            events.clone(),
        ));

        (
            Self {
                state,
                wake,
                sink,
                events,
                worker,
            },
            events_rx,
        )
    }

    /// Append a chunk; it starts right away if nothing is playing. Returns its sequence number.
    pub fn enqueue(&self, bytes: Vec<u8>) -> u64 {
        let seq = {
            let mut state = lock(&self.state);
            let seq = state.next_seq;
            state.next_seq += 1;
            state.pending.push_back(PlaybackChunk { seq, bytes });
            seq
        };
        debug!(seq, "playback chunk queued");
        self.wake.notify_one();
        seq
    }

    /// Stop the in-flight chunk and discard everything pending.
    pub fn flush(&self) {
        let (dropped, in_flight) = {
            let mut state = lock(&self.state);
            let dropped = state.pending.len();
            state.pending.clear();
            (dropped, state.in_flight)
        };
        if in_flight.is_some() {
            // the worker reports Drained once the stopped chunk returns
            self.sink.stop();
        } else {
            let _ = self.events.send(PlaybackEvent::Drained);
        }
        if dropped > 0 || in_flight.is_some() {
            info!("⏹️ Playback flushed ({} pending dropped)", dropped);
        }
    }

    /// True while a chunk is in flight or waiting.
    pub fn is_active(&self) -> bool {
        let state = lock(&self.state);
        state.in_flight.is_some() || !state.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.state).pending.len()
    }
}

impl Drop for AudioPlaybackQueue {
    fn drop(&mut self) {
        self.sink.stop();
        self.worker.abort();
    }
}

async fn run_worker(
    state: Arc<Mutex<QueueState>>,
    wake: Arc<Notify>,
    sink: Arc<dyn AudioSink>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
) {
    loop {
        let next = {
            let mut guard = lock(&state);
            let chunk = guard.pending.pop_front();
            guard.in_flight = chunk.as_ref().map(|c| c.seq);
            chunk
        };

        let Some(chunk) = next else {
            wake.notified().await;
            continue;
        };

        let _ = events.send(PlaybackEvent::Started { seq: chunk.seq });
        let result = sink.play(&chunk).await;

        let drained = {
            let mut guard = lock(&state);
            guard.in_flight = None;
            guard.pending.is_empty()
        };

        let event = match result {
            Ok(()) => PlaybackEvent::Finished { seq: chunk.seq },
            Err(e) => {
                warn!(seq = chunk.seq, "Skipping playback chunk: {}", e);
                PlaybackEvent::Failed {
                    seq: chunk.seq,
                    error: e.to_string(),
                }
            }
        };
        let _ = events.send(event);
        if drained {
            let _ = events.send(PlaybackEvent::Drained);
        }
    }
}

/// Speaker output through a rodio `Sink`.
///
/// The `OutputStream` is not `Send`, so it lives on a dedicated thread for the
/// lifetime of this sink; the `Sink` itself is shared with the queue worker.
pub struct RodioSink {
    sink: Arc<Sink>,
    _keepalive: std::sync::mpsc::Sender<()>,
}

impl RodioSink {
    /// Open the default output device.
    pub fn new() -> VoiceResult<Self> {
        info!("🔊 Initializing audio playback");
        let (handle_tx, handle_rx) = std::sync::mpsc::channel();
        let (keepalive, shutdown) = std::sync::mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("opsdeck-audio-out".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = handle_tx.send(Ok(handle));
                    // Returns when the RodioSink (and its sender) is dropped
                    let _ = shutdown.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = handle_tx.send(Err(e.to_string()));
                }
            })?;

        let handle = handle_rx
            .recv()
            .map_err(|e| VoiceError::Playback(e.to_string()))?
            .map_err(VoiceError::Playback)?;
        let sink = Sink::try_new(&handle).map_err(|e| VoiceError::Playback(e.to_string()))?;

        info!("✅ Audio playback initialized");
        Ok(Self {
            sink: Arc::new(sink),
            _keepalive: keepalive,
        })
    }
}

#[async_trait]
impl AudioSink for RodioSink {
    async fn play(&self, chunk: &PlaybackChunk) -> VoiceResult<()> {
        if chunk.bytes.is_empty() {
            return Ok(());
        }
        let source = rodio::Decoder::new(Cursor::new(chunk.bytes.clone()))
            .map_err(|e| VoiceError::Decode(format!("chunk {}: {}", chunk.seq, e)))?;
        self.sink.append(source.convert_samples::<f32>());

        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || sink.sleep_until_end())
            .await
            .map_err(|e| VoiceError::Playback(e.to_string()))
    }

    fn stop(&self) {
        self.sink.stop();
    }
}
