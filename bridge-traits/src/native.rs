//! Native decoding module capability.
//!
//! A native module is a codec library compiled against its own linear memory
//! (a WebAssembly instance, a C shim linked into the host, or an in-process
//! emulation of one). The core never sees the codec's internals: it allocates
//! buffers inside the module memory, copies compressed bytes in, asks the
//! module to decode, and copies deinterleaved PCM back out.
//!
//! ```text
//! host bytes ──copy──▶ [input ptr] ──enqueue──▶ codec ──decode_step──▶ [left ptr]
//!                                                                     [right ptr] ──copy──▶ host
//! ```
//!
//! All pointers are offsets into [`NativeModule::memory`]. Multi-byte values
//! in module memory are little-endian.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset into a native module's linear memory.
///
/// Offset `0` is the null pointer and is never handed out by an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ptr(u32);

impl Ptr {
    /// The null pointer.
    pub const NULL: Ptr = Ptr(0);

    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    pub const fn offset(self) -> usize {
        self.0 as usize
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Ptr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Opaque handle to a decoder state living inside a native module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoderHandle(u32);

impl DecoderHandle {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Compressed formats with a native decoder backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecoderVariant {
    /// Continuous Ogg Opus stream (libopusfile).
    OggOpus,
    /// MPEG audio (MP3) stream.
    Mpeg,
}

impl DecoderVariant {
    /// Sample rate reported when the module does not know the stream rate yet.
    pub fn default_sample_rate(self) -> u32 {
        match self {
            // Opus always decodes at 48 kHz
            DecoderVariant::OggOpus => 48_000,
            DecoderVariant::Mpeg => 44_100,
        }
    }
}

impl fmt::Display for DecoderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderVariant::OggOpus => f.write_str("ogg-opus"),
            DecoderVariant::Mpeg => f.write_str("mpeg"),
        }
    }
}

/// Functions exported by an instantiated native decoding module.
///
/// Implementations are driven strictly sequentially per decoder handle; the
/// core serializes access through a mutex when a module is shared.
pub trait NativeModule: Send {
    /// Name used as a prefix in decode error messages (e.g. `libopusfile`).
    fn library(&self) -> &'static str;

    /// Allocate `bytes` bytes of module memory. `None` signals out-of-memory.
    fn malloc(&mut self, bytes: usize) -> Option<Ptr>;

    /// Return an allocation to the module allocator.
    fn free(&mut self, ptr: Ptr);

    /// The module's linear memory.
    fn memory(&self) -> &[u8];

    fn memory_mut(&mut self) -> &mut [u8];

    /// Create a decoder state. `None` when the module cannot allocate one.
    fn decoder_create(&mut self) -> Option<DecoderHandle>;

    /// Queue `len` compressed bytes located at `data`.
    ///
    /// Returns `false` when the bytes cannot be accepted, either because the
    /// internal queue would overflow or because the stream is malformed.
    fn decoder_enqueue(&mut self, handle: DecoderHandle, data: Ptr, len: usize) -> bool;

    /// Decode the next block of queued data into the two channel buffers.
    ///
    /// Writes at most [`output_window`](Self::output_window) `f32` samples to
    /// each of `left` and `right`. Returns the number of samples written per
    /// channel, `0` when no more output is available for the queued data, or a
    /// negative library error code.
    fn decode_step(&mut self, handle: DecoderHandle, left: Ptr, right: Ptr) -> i32;

    /// Destroy a decoder state.
    fn decoder_free(&mut self, handle: DecoderHandle);

    /// Recommended per-call output window, in samples per channel.
    fn output_window(&self) -> usize;

    /// Sample rate of the stream decoded by `handle`, once known.
    fn sample_rate(&self, _handle: DecoderHandle) -> Option<u32> {
        None
    }
}

/// Asynchronously instantiates a native module.
///
/// Resolving the loader is the module's readiness signal: no buffer may be
/// allocated before `load` completes.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self) -> Result<Box<dyn NativeModule>>;
}
