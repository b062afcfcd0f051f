//! # MPEG Native Module
//!
//! An in-process native decoding module for MPEG audio built on Symphonia's
//! MP3 codec.
//!
//! ## Overview
//!
//! Symphonia pulls packets from a seekable reader; the decoder bridge pushes
//! arbitrary byte chunks and drains PCM. This module adapts one to the other
//! the way the C shims around libmpg123/libopusfile do:
//!
//! 1. `decoder_enqueue` appends the chunk to a bounded unread queue. The
//!    queue rejects a chunk that would overflow it. Bytes of an ID3v2 tag
//!    already known to be in progress are dropped instead of queued.
//! 2. `decode_step` scans the queue for the next complete frame (skipping
//!    ID3v2 tags and junk), decodes it, and writes up to one output window of
//!    deinterleaved samples per channel into the caller's buffers. Leftover
//!    samples of a frame are returned by the following steps.
//! 3. `decode_step` returns `0` once no complete frame remains queued.
//!
//! Only Layer III is decoded; Layer I/II frames report the "not implemented"
//! status. Mono streams are duplicated into both output channels.

mod header;

pub use header::{scan, FrameHeader, Layer, MpegVersion, Scan, HEADER_LEN, MAX_FRAME_LEN};

use crate::memory::LinearMemory;
use async_trait::async_trait;
use bridge_traits::{DecoderHandle, ModuleLoader, NativeModule, Ptr};
use std::collections::HashMap;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Channels, Signal};
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_MP3};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use symphonia::core::sample::Sample;
use tracing::{debug, trace, warn};

/// Samples per channel in one MPEG-1 Layer III frame.
pub const MPEG_FRAME_SAMPLES: usize = 1152;

/// Largest chunk the default queue accepts right after a drain.
pub const MAX_ENQUEUE_BYTES: usize = 64 * 1024;

/// Default bound on undecoded bytes held per decoder: one full chunk on top
/// of the partial frame a drain leaves behind.
pub const DEFAULT_QUEUE_CAPACITY: usize = MAX_ENQUEUE_BYTES + MAX_FRAME_LEN;

// Status codes shared with the libopusfile table
const STATUS_REQUEST_FAILED: i32 = -1;
const STATUS_READ_FAILED: i32 = -128;
const STATUS_INTERNAL_FAULT: i32 = -129;
const STATUS_NOT_IMPLEMENTED: i32 = -130;
const STATUS_INVALID_PARAMETER: i32 = -131;
const STATUS_BAD_PACKET: i32 = -136;

/// MPEG decoding module with its own linear memory.
pub struct MpegModule {
    memory: LinearMemory,
    decoders: HashMap<u32, MpegStream>,
    next_handle: u32,
    output_window: usize,
    queue_capacity: usize,
}

impl Default for MpegModule {
    fn default() -> Self {
        Self::new(LinearMemory::default())
    }
}

impl MpegModule {
    pub fn new(memory: LinearMemory) -> Self {
        Self {
            memory,
            decoders: HashMap::new(),
            next_handle: 1,
            output_window: MPEG_FRAME_SAMPLES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Override the per-call output window (samples per channel).
    pub fn with_output_window(mut self, samples: usize) -> Self {
        self.output_window = samples.max(1);
        self
    }

    /// Override the bound on undecoded bytes per decoder.
    ///
    /// Must be at least the caller's chunk size plus [`MAX_FRAME_LEN`] for
    /// a drained decoder to always accept the next chunk.
    pub fn with_queue_capacity(mut self, bytes: usize) -> Self {
        self.queue_capacity = bytes;
        self
    }

    /// Number of live decoder states.
    pub fn decoder_count(&self) -> usize {
        self.decoders.len()
    }
}

impl NativeModule for MpegModule {
    fn library(&self) -> &'static str {
        "symphonia-mp3"
    }

    fn malloc(&mut self, bytes: usize) -> Option<Ptr> {
        self.memory.malloc(bytes)
    }

    fn free(&mut self, ptr: Ptr) {
        self.memory.free(ptr);
    }

    fn memory(&self) -> &[u8] {
        self.memory.bytes()
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.bytes_mut()
    }

    fn decoder_create(&mut self) -> Option<DecoderHandle> {
        let raw = self.next_handle;
        self.next_handle = self.next_handle.checked_add(1)?;
        self.decoders.insert(raw, MpegStream::default());
        debug!(handle = raw, "created mpeg decoder state");
        Some(DecoderHandle::new(raw))
    }

    fn decoder_enqueue(&mut self, handle: DecoderHandle, data: Ptr, len: usize) -> bool {
        let Some(stream) = self.decoders.get_mut(&handle.raw()) else {
            warn!(handle = handle.raw(), "enqueue on unknown decoder handle");
            return false;
        };

        let Some(bytes) = self.memory.slice(data, len) else {
            return false;
        };

        let skipped = stream.skip.min(bytes.len());
        let kept = &bytes[skipped..];
        if stream.queue.len() + kept.len() > self.queue_capacity {
            warn!(
                queued = stream.queue.len(),
                len = kept.len(),
                capacity = self.queue_capacity,
                "enqueue would overflow the unread queue"
            );
            return false;
        }

        stream.skip -= skipped;
        stream.queue.extend_from_slice(kept);
        true
    }

    fn decode_step(&mut self, handle: DecoderHandle, left: Ptr, right: Ptr) -> i32 {
        let Some(stream) = self.decoders.get_mut(&handle.raw()) else {
            return STATUS_INVALID_PARAMETER;
        };

        while stream.remaining() == 0 {
            match stream.decode_next_frame() {
                Ok(true) => {}
                Ok(false) => return 0,
                Err(status) => return status,
            }
        }

        let count = stream.remaining().min(self.output_window);
        let range = stream.cursor..stream.cursor + count;
        if !self.memory.write_f32(left, &stream.left[range.clone()])
            || !self.memory.write_f32(right, &stream.right[range])
        {
            return STATUS_INTERNAL_FAULT;
        }
        stream.cursor += count;

        trace!(handle = handle.raw(), count, "mpeg decode step");
        count as i32
    }

    fn decoder_free(&mut self, handle: DecoderHandle) {
        if self.decoders.remove(&handle.raw()).is_some() {
            debug!(handle = handle.raw(), "freed mpeg decoder state");
        }
    }

    fn output_window(&self) -> usize {
        self.output_window
    }

    fn sample_rate(&self, handle: DecoderHandle) -> Option<u32> {
        self.decoders.get(&handle.raw())?.sample_rate
    }
}

/// Per-handle decoder state.
#[derive(Default)]
struct MpegStream {
    queue: Vec<u8>,
    /// Tag bytes still to be dropped on arrival.
    skip: usize,
    codec: Option<Box<dyn Decoder>>,
    sample_rate: Option<u32>,
    /// Decoded samples of the current frame not yet handed out.
    left: Vec<f32>,
    right: Vec<f32>,
    cursor: usize,
    frames: u64,
}

impl MpegStream {
    fn remaining(&self) -> usize {
        self.left.len() - self.cursor
    }

    /// Decode the next complete frame in the queue into the pending planes.
    ///
    /// `Ok(false)` when no complete frame is queued.
    fn decode_next_frame(&mut self) -> Result<bool, i32> {
        let found = scan(&self.queue);
        self.queue.drain(..found.discard);
        if found.skip > 0 {
            debug!(skip = found.skip, "skipping id3v2 tag as it arrives");
            self.skip += found.skip;
        }

        let Some(header) = found.frame else {
            return Ok(false);
        };
        let frame: Vec<u8> = self.queue.drain(..header.frame_len).collect();

        if header.layer != Layer::III {
            warn!(layer = ?header.layer, "unsupported mpeg layer");
            return Err(STATUS_NOT_IMPLEMENTED);
        }

        if self.codec.is_none() {
            self.codec = Some(make_codec(&header)?);
        }
        let Some(codec) = self.codec.as_mut() else {
            return Err(STATUS_INTERNAL_FAULT);
        };

        let duration = header.samples_per_frame() as u64;
        let packet = Packet::new_from_boxed_slice(
            0,
            self.frames * duration,
            duration,
            frame.into_boxed_slice(),
        );

        let planes = match codec.decode(&packet) {
            Ok(decoded) => to_planar_f32(&decoded),
            Err(err) => return Err(status_for(&err)),
        };

        let mut planes = planes.into_iter();
        let left = planes.next().unwrap_or_default();
        let right = planes.next().unwrap_or_else(|| left.clone());

        self.left = left;
        self.right = right;
        self.cursor = 0;
        self.frames += 1;
        self.sample_rate = Some(header.sample_rate);
        Ok(true)
    }
}

fn make_codec(header: &FrameHeader) -> Result<Box<dyn Decoder>, i32> {
    let channels = if header.channels == 1 {
        Channels::FRONT_LEFT
    } else {
        Channels::FRONT_LEFT | Channels::FRONT_RIGHT
    };

    let mut params = CodecParameters::new();
    params
        .for_codec(CODEC_TYPE_MP3)
        .with_sample_rate(header.sample_rate)
        .with_channels(channels);

    symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|err| {
            warn!("failed to create mp3 codec: {}", err);
            STATUS_INTERNAL_FAULT
        })
}

fn status_for(err: &SymphoniaError) -> i32 {
    warn!("mp3 frame failed to decode: {}", err);
    match err {
        SymphoniaError::DecodeError(_) => STATUS_BAD_PACKET,
        SymphoniaError::Unsupported(_) => STATUS_NOT_IMPLEMENTED,
        SymphoniaError::IoError(_) => STATUS_READ_FAILED,
        _ => STATUS_REQUEST_FAILED,
    }
}

/// Copy a decoded buffer of any sample format into one `f32` vector per
/// channel.
fn to_planar_f32(buffer: &AudioBufferRef<'_>) -> Vec<Vec<f32>> {
    match buffer {
        AudioBufferRef::F32(buf) => planes(&**buf),
        AudioBufferRef::F64(buf) => planes(&**buf),
        AudioBufferRef::S32(buf) => planes(&**buf),
        AudioBufferRef::S24(buf) => planes(&**buf),
        AudioBufferRef::S16(buf) => planes(&**buf),
        AudioBufferRef::S8(buf) => planes(&**buf),
        AudioBufferRef::U32(buf) => planes(&**buf),
        AudioBufferRef::U24(buf) => planes(&**buf),
        AudioBufferRef::U16(buf) => planes(&**buf),
        AudioBufferRef::U8(buf) => planes(&**buf),
    }
}

fn planes<S>(buf: &AudioBuffer<S>) -> Vec<Vec<f32>>
where
    S: Sample + IntoSample<f32>,
{
    (0..buf.spec().channels.count())
        .map(|ch| buf.chan(ch).iter().map(|&s| s.into_sample()).collect())
        .collect()
}

/// Loader producing a fresh [`MpegModule`] per instantiation.
#[derive(Debug, Clone)]
pub struct MpegModuleLoader {
    memory_limit: usize,
    queue_capacity: usize,
}

impl Default for MpegModuleLoader {
    fn default() -> Self {
        Self {
            memory_limit: crate::memory::DEFAULT_MEMORY_LIMIT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl MpegModuleLoader {
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    pub fn with_queue_capacity(mut self, bytes: usize) -> Self {
        self.queue_capacity = bytes;
        self
    }
}

#[async_trait]
impl ModuleLoader for MpegModuleLoader {
    async fn load(&self) -> bridge_traits::Result<Box<dyn NativeModule>> {
        debug!(memory_limit = self.memory_limit, "instantiating mpeg module");
        let module = MpegModule::new(LinearMemory::with_limit(self.memory_limit))
            .with_queue_capacity(self.queue_capacity);
        Ok(Box::new(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let mut module = MpegModule::default();
        let a = module.decoder_create().unwrap();
        let b = module.decoder_create().unwrap();
        assert_ne!(a, b);
        assert_eq!(module.decoder_count(), 2);

        module.decoder_free(a);
        module.decoder_free(a);
        assert_eq!(module.decoder_count(), 1);
    }

    #[test]
    fn test_unknown_handle_is_invalid_parameter() {
        let mut module = MpegModule::default();
        let left = module.malloc(16).unwrap();
        let right = module.malloc(16).unwrap();
        let status = module.decode_step(DecoderHandle::new(42), left, right);
        assert_eq!(status, STATUS_INVALID_PARAMETER);
    }

    #[test]
    fn test_enqueue_rejects_overflow() {
        let mut module = MpegModule::default().with_queue_capacity(32);
        let handle = module.decoder_create().unwrap();
        let data = module.malloc(32).unwrap();

        assert!(module.decoder_enqueue(handle, data, 32));
        assert!(!module.decoder_enqueue(handle, data, 1));
    }

    #[test]
    fn test_enqueue_drops_pending_tag_bytes() {
        let mut module = MpegModule::default().with_queue_capacity(64);
        let handle = module.decoder_create().unwrap();
        let data = module.malloc(64).unwrap();
        let left = module.malloc(MPEG_FRAME_SAMPLES * 4).unwrap();
        let right = module.malloc(MPEG_FRAME_SAMPLES * 4).unwrap();

        // Tag header announcing a 200-byte body
        let tag = b"ID3\x04\x00\x00\x00\x00\x01\x48";
        module.memory_mut()[data.offset()..data.offset() + tag.len()].copy_from_slice(tag);
        assert!(module.decoder_enqueue(handle, data, 64));
        assert_eq!(module.decode_step(handle, left, right), 0);

        // The remaining 146 tag bytes never occupy the 64-byte queue
        assert!(module.decoder_enqueue(handle, data, 64));
        assert!(module.decoder_enqueue(handle, data, 64));
        assert!(module.decoder_enqueue(handle, data, 18));
        assert_eq!(module.decoders[&handle.raw()].skip, 0);
        assert!(module.decoders[&handle.raw()].queue.is_empty());
    }

    #[test]
    fn test_default_queue_takes_full_chunk_after_partial_frame() {
        let mut module = MpegModule::default();
        let handle = module.decoder_create().unwrap();
        let data = module.malloc(MAX_ENQUEUE_BYTES).unwrap();

        assert!(module.decoder_enqueue(handle, data, MAX_FRAME_LEN - 1));
        assert!(module.decoder_enqueue(handle, data, MAX_ENQUEUE_BYTES));
    }

    #[test]
    fn test_junk_produces_no_output() {
        let mut module = MpegModule::default();
        let handle = module.decoder_create().unwrap();
        let data = module.malloc(256).unwrap();
        let left = module.malloc(MPEG_FRAME_SAMPLES * 4).unwrap();
        let right = module.malloc(MPEG_FRAME_SAMPLES * 4).unwrap();

        assert!(module.decoder_enqueue(handle, data, 256));
        assert_eq!(module.decode_step(handle, left, right), 0);
        assert_eq!(module.sample_rate(handle), None);
    }
}
