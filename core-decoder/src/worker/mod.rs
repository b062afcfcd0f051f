//! # Worker Offload
//!
//! Runs one [`StreamDecoder`] on a dedicated OS thread and exposes the same
//! operations as futures.
//!
//! ## Overview
//!
//! ```text
//! DecoderWorker ──Request{id}──▶ [worker thread: StreamDecoder]
//!      ▲                                   │
//!      └── inbound task ◀──Response{id}────┘
//! ```
//!
//! Each call takes a fresh correlation id, registers a continuation in the
//! [`PendingTable`] and posts the request *synchronously*; the returned
//! future only waits for the response. Calls issued back to back therefore
//! reach the worker in call order, e.g. `decode` followed immediately by
//! `free`. Decoded sample vectors move through the channel without copying.
//!
//! Each worker instantiates its own native module through the registry's
//! loader, so workers never contend for a shared module lock.
//!
//! Spawning requires a Tokio runtime: the inbound task that routes responses
//! runs on it.

mod pending;
mod protocol;
mod runner;

pub use pending::{CorrelationIds, PendingTable};
pub use protocol::{Command, Payload, Reply, Request, Response};

use crate::audio::DecodedAudio;
use crate::config::{DecoderConfig, WorkerConfig};
use crate::error::{DecoderError, Result};
use crate::instance::{ModuleScope, StreamDecoder};
use crate::registry::ModuleRegistry;
use bridge_traits::DecoderVariant;
use bytes::Bytes;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::thread;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Proxy for a decoder running on its own thread.
pub struct DecoderWorker {
    variant: DecoderVariant,
    ids: CorrelationIds,
    pending: PendingTable,
    /// `None` once `free` was called.
    outbound: Mutex<Option<mpsc::UnboundedSender<Request>>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl DecoderWorker {
    /// Spawn a worker with the default thread settings.
    pub fn spawn(registry: Arc<ModuleRegistry>, config: DecoderConfig) -> Result<Self> {
        Self::spawn_with(registry, config, WorkerConfig::default())
    }

    /// Spawn a worker thread owning one decoder for `config`.
    ///
    /// The decoder gets a module of its own from `registry`'s loader rather
    /// than the shared instance. The worker starts initializing immediately; [`ready`](Self::ready)
    /// reports the outcome.
    pub fn spawn_with(
        registry: Arc<ModuleRegistry>,
        config: DecoderConfig,
        worker_config: WorkerConfig,
    ) -> Result<Self> {
        worker_config.validate().map_err(DecoderError::Config)?;
        let runtime = Handle::try_current().map_err(|_| {
            DecoderError::WorkerUnavailable(
                "spawning a decoder worker requires a Tokio runtime".to_string(),
            )
        })?;

        let variant = config.variant;
        let decoder = StreamDecoder::new(registry, config)?.with_module_scope(ModuleScope::Dedicated);
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        let mut builder = thread::Builder::new().name(worker_config.thread_name.clone());
        if let Some(size) = worker_config.stack_size {
            builder = builder.stack_size(size);
        }
        let thread = builder
            .spawn(move || runner::run(decoder, request_rx, response_tx))
            .map_err(|e| DecoderError::WorkerUnavailable(format!("failed to spawn worker thread: {}", e)))?;

        let pending = PendingTable::new();
        runtime.spawn(route_responses(response_rx, pending.clone()));

        debug!(%variant, thread = %worker_config.thread_name, "decoder worker spawned");
        Ok(Self {
            variant,
            ids: CorrelationIds::new(),
            pending,
            outbound: Mutex::new(Some(request_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn variant(&self) -> DecoderVariant {
        self.variant
    }

    /// Whether `free` has been called.
    pub fn is_freed(&self) -> bool {
        self.outbound.lock().is_none()
    }

    /// Requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Wait until the remote decoder is ready.
    pub fn ready(&self) -> impl Future<Output = Result<()>> + Send + 'static {
        let reply = self.post(Command::Ready, None);
        async move { reply.await.map(|_| ()) }
    }

    /// Decode a chunk of a continuous stream on the worker.
    pub fn decode(&self, data: impl Into<Bytes>) -> impl Future<Output = Result<DecodedAudio>> + Send + 'static {
        expect_decoded(self.post(Command::Decode, Some(Payload::Bytes(data.into()))))
    }

    /// Decode one complete frame on the worker.
    pub fn decode_frame(&self, frame: impl Into<Bytes>) -> impl Future<Output = Result<DecodedAudio>> + Send + 'static {
        expect_decoded(self.post(Command::DecodeFrame, Some(Payload::Bytes(frame.into()))))
    }

    /// Decode a sequence of complete frames on the worker.
    pub fn decode_frames<I, B>(&self, frames: I) -> impl Future<Output = Result<DecodedAudio>> + Send + 'static
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let frames = frames.into_iter().map(Into::into).collect();
        expect_decoded(self.post(Command::DecodeFrames, Some(Payload::Frames(frames))))
    }

    /// Reset the remote decoder.
    pub fn reset(&self) -> impl Future<Output = Result<()>> + Send + 'static {
        let reply = self.post(Command::Reset, None);
        async move { reply.await.map(|_| ()) }
    }

    /// Free the remote decoder and terminate the worker thread.
    ///
    /// Later calls fail with [`DecoderError::Freed`]. The thread is joined
    /// even if the remote free fails. Never fails; idempotent.
    pub fn free(&self) -> impl Future<Output = ()> + Send + 'static {
        let reply = self.post(Command::Free, None);
        let closed = self.outbound.lock().take().is_some();
        let thread = self.thread.lock().take();

        async move {
            if let Err(err) = reply.await {
                if closed {
                    debug!(error = %err, "remote free failed, terminating worker anyway");
                }
            }

            let Some(thread) = thread else {
                return;
            };
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => debug!("decoder worker joined"),
                Ok(Err(_)) => error!("decoder worker thread panicked"),
                Err(err) => warn!(error = %err, "failed to join decoder worker"),
            }
        }
    }

    /// Register and send a request now; the future awaits its response.
    fn post(&self, command: Command, payload: Option<Payload>) -> impl Future<Output = Result<Reply>> + Send + 'static {
        let sent = self.send(command, payload);
        async move {
            let response = sent?;
            response.await.map_err(|_| {
                DecoderError::WorkerUnavailable("decoder worker stopped before replying".to_string())
            })?
        }
    }

    fn send(&self, command: Command, payload: Option<Payload>) -> Result<oneshot::Receiver<Result<Reply>>> {
        let outbound = self.outbound.lock();
        let sender = outbound.as_ref().ok_or(DecoderError::Freed)?;

        let id = self.ids.next_id();
        let response = self.pending.register(id)?;
        if sender.send(Request { id, command, payload }).is_err() {
            self.pending.remove(id);
            return Err(DecoderError::WorkerUnavailable(
                "decoder worker thread has exited".to_string(),
            ));
        }
        Ok(response)
    }
}

impl Drop for DecoderWorker {
    fn drop(&mut self) {
        // Closing the queue stops the worker loop, which frees the decoder
        if self.outbound.lock().take().is_some() {
            debug!(variant = %self.variant, "decoder worker dropped without free");
        }
    }
}

impl std::fmt::Debug for DecoderWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderWorker")
            .field("variant", &self.variant)
            .field("freed", &self.is_freed())
            .field("pending", &self.pending.len())
            .finish()
    }
}

async fn expect_decoded(reply: impl Future<Output = Result<Reply>>) -> Result<DecodedAudio> {
    match reply.await? {
        Reply::Decoded(audio) => Ok(audio),
        Reply::Done => Err(DecoderError::ProtocolViolation(
            "expected decoded audio, worker replied without it".to_string(),
        )),
    }
}

/// Resolve responses until the worker's response channel closes.
async fn route_responses(mut responses: mpsc::UnboundedReceiver<Response>, pending: PendingTable) {
    while let Some(response) = responses.recv().await {
        if let Err(err) = pending.resolve(response) {
            error!(error = %err, "dropping worker response");
        }
    }

    let orphaned = pending.clear();
    if orphaned > 0 {
        warn!(orphaned, "decoder worker exited with requests outstanding");
    }
}
