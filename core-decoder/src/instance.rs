//! # Decoder Instance
//!
//! A single-context streaming decoder bound to one native decoder handle.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──▶ Initializing ──ready()──▶ Ready ──free()──▶ Freed
//!                ▲                      │
//!                └──────reset()─────────┘
//! ```
//!
//! `ready()` awaits the shared native module, creates the decoder handle and
//! allocates the three arena buffers (input bytes plus one output window per
//! channel). Decoding is only possible in `Ready`. `free()` releases every
//! native resource, never fails, and may be called any number of times.
//!
//! ## Module Scope
//!
//! By default a decoder uses the registry's shared module for its variant.
//! Every decode call holds that module's lock, so decoders sharing it take
//! turns. A decoder with [`ModuleScope::Dedicated`] instantiates its own
//! module on first `ready()` and keeps it across `reset()`.

use crate::arena::{ArenaBuffer, SharedModule};
use crate::audio::DecodedAudio;
use crate::config::DecoderConfig;
use crate::error::{DecoderError, Result};
use crate::registry::ModuleRegistry;
use crate::stream::{self, StreamBuffers};
use bridge_traits::{DecoderHandle, DecoderVariant};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Lifecycle state of a [`StreamDecoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Initializing,
    Ready,
    Freed,
}

/// Where a decoder gets its native module from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModuleScope {
    /// The registry's per-variant instance, shared with other decoders.
    #[default]
    Shared,
    /// A module instantiated for this decoder alone.
    Dedicated,
}

/// Streaming decoder for one compressed stream.
pub struct StreamDecoder {
    config: DecoderConfig,
    registry: Arc<ModuleRegistry>,
    scope: ModuleScope,
    /// Module kept across `reset` when the scope is dedicated.
    dedicated: Option<SharedModule>,
    state: DecoderState,
    native: Option<NativeState>,
}

/// Native resources owned while `Ready`.
struct NativeState {
    module: SharedModule,
    handle: DecoderHandle,
    input: ArenaBuffer<u8>,
    left: ArenaBuffer<f32>,
    right: ArenaBuffer<f32>,
}

impl NativeState {
    fn create(module: SharedModule, config: &DecoderConfig) -> Result<Self> {
        let (handle, window) = {
            let mut native = module.lock();
            let handle = native.decoder_create().ok_or_else(|| {
                DecoderError::Internal(format!("{} could not create a decoder", native.library()))
            })?;
            (handle, native.output_window())
        };

        match Self::allocate_buffers(&module, config.input_buffer_bytes, window) {
            Ok((input, left, right)) => Ok(Self {
                module,
                handle,
                input,
                left,
                right,
            }),
            Err(err) => {
                module.lock().decoder_free(handle);
                Err(err)
            }
        }
    }

    fn allocate_buffers(
        module: &SharedModule,
        input_bytes: usize,
        window: usize,
    ) -> Result<(ArenaBuffer<u8>, ArenaBuffer<f32>, ArenaBuffer<f32>)> {
        if window == 0 {
            return Err(DecoderError::Internal(
                "native module reported an empty output window".to_string(),
            ));
        }

        let input = ArenaBuffer::allocate(module, input_bytes)?;
        let left = ArenaBuffer::allocate(module, window)?;
        let right = ArenaBuffer::allocate(module, window)?;
        Ok((input, left, right))
    }

    fn buffers(&self) -> StreamBuffers<'_> {
        StreamBuffers {
            input: &self.input,
            left: &self.left,
            right: &self.right,
        }
    }
}

impl Drop for NativeState {
    fn drop(&mut self) {
        // Arena buffers are released after this, field by field
        self.module.lock().decoder_free(self.handle);
        debug!(handle = self.handle.raw(), "freed native decoder");
    }
}

impl StreamDecoder {
    /// Create an instance in the `Initializing` state.
    ///
    /// No native resources are touched until [`ready`](Self::ready).
    pub fn new(registry: Arc<ModuleRegistry>, config: DecoderConfig) -> Result<Self> {
        config.validate().map_err(DecoderError::Config)?;
        Ok(Self {
            config,
            registry,
            scope: ModuleScope::Shared,
            dedicated: None,
            state: DecoderState::Initializing,
            native: None,
        })
    }

    /// Choose where the native module comes from. Takes effect on the next
    /// initialization.
    pub fn with_module_scope(mut self, scope: ModuleScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn module_scope(&self) -> ModuleScope {
        self.scope
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn variant(&self) -> DecoderVariant {
        self.config.variant
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.state == DecoderState::Ready
    }

    /// Input buffer capacity in bytes (largest frame `decode_frame` accepts).
    pub fn input_capacity(&self) -> usize {
        self.config.input_buffer_bytes
    }

    /// Per-call output window in samples, once ready.
    pub fn output_window(&self) -> Option<usize> {
        self.native.as_ref().map(|native| native.left.len())
    }

    /// Wait for the native module and allocate native resources.
    ///
    /// Idempotent once ready.
    #[instrument(skip(self), fields(variant = %self.config.variant))]
    pub async fn ready(&mut self) -> Result<()> {
        match self.state {
            DecoderState::Ready => Ok(()),
            DecoderState::Freed => Err(DecoderError::Freed),
            DecoderState::Initializing => self.initialize().await,
        }
    }

    /// Free and re-initialize, discarding all decoder state.
    #[instrument(skip(self), fields(variant = %self.config.variant))]
    pub async fn reset(&mut self) -> Result<()> {
        if self.state == DecoderState::Freed {
            return Err(DecoderError::Freed);
        }

        self.native = None;
        self.state = DecoderState::Initializing;
        self.initialize().await
    }

    /// Release the native handle and all buffers. Never fails; idempotent.
    pub fn free(&mut self) {
        if self.native.take().is_some() {
            debug!(variant = %self.config.variant, "decoder freed");
        }
        self.dedicated = None;
        self.state = DecoderState::Freed;
    }

    /// Decode a chunk of a continuous stream.
    ///
    /// Input of any length is accepted; an empty chunk yields zero samples.
    pub fn decode(&mut self, data: &[u8]) -> Result<DecodedAudio> {
        self.decode_segments(std::iter::once(data))
    }

    /// Decode one complete frame, which must fit the input buffer.
    pub fn decode_frame(&mut self, frame: &[u8]) -> Result<DecodedAudio> {
        self.check_frame(frame.len())?;
        self.decode_segments(std::iter::once(frame))
    }

    /// Decode a sequence of complete frames into one result.
    pub fn decode_frames<F: AsRef<[u8]>>(&mut self, frames: &[F]) -> Result<DecodedAudio> {
        for frame in frames {
            self.check_frame(frame.as_ref().len())?;
        }
        self.decode_segments(frames.iter().map(AsRef::as_ref))
    }

    async fn initialize(&mut self) -> Result<()> {
        let module = self.resolve_module().await?;
        let native = NativeState::create(module, &self.config)?;

        debug!(
            handle = native.handle.raw(),
            input_bytes = native.input.len(),
            window = native.left.len(),
            "decoder ready"
        );
        self.native = Some(native);
        self.state = DecoderState::Ready;
        Ok(())
    }

    async fn resolve_module(&mut self) -> Result<SharedModule> {
        let variant = self.config.variant;
        match self.scope {
            ModuleScope::Shared => self.registry.module(variant).await,
            ModuleScope::Dedicated => {
                if let Some(module) = &self.dedicated {
                    return Ok(Arc::clone(module));
                }
                let module = self.registry.instantiate(variant).await?;
                self.dedicated = Some(Arc::clone(&module));
                Ok(module)
            }
        }
    }

    fn check_frame(&self, len: usize) -> Result<()> {
        if len > self.config.input_buffer_bytes {
            return Err(DecoderError::InvalidInput(format!(
                "frame of {} bytes exceeds the {}-byte input buffer",
                len, self.config.input_buffer_bytes
            )));
        }
        Ok(())
    }

    fn decode_segments<'s, I>(&mut self, segments: I) -> Result<DecodedAudio>
    where
        I: IntoIterator<Item = &'s [u8]>,
    {
        let variant = self.config.variant;
        let native = match (self.state, self.native.as_ref()) {
            (DecoderState::Freed, _) => return Err(DecoderError::Freed),
            (DecoderState::Ready, Some(native)) => native,
            _ => return Err(DecoderError::NotReady),
        };

        let mut module = native.module.lock();
        let output = stream::decode_segments(&mut **module, native.handle, &native.buffers(), segments)?;
        let sample_rate = module
            .sample_rate(native.handle)
            .unwrap_or_else(|| variant.default_sample_rate());
        drop(module);

        output.finish(sample_rate)
    }
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("variant", &self.config.variant)
            .field("state", &self.state)
            .field("scope", &self.scope)
            .field("handle", &self.native.as_ref().map(|n| n.handle))
            .finish()
    }
}
