//! # Streaming Decode Loop
//!
//! Feeds arbitrarily large input through the fixed-size input buffer and
//! drains the decoder after every chunk.
//!
//! ```text
//! segment ─┬─ chunk ─▶ write input ─▶ enqueue ─▶ decode_step* ─▶ accumulate
//!          └─ chunk ─▶ ...
//! ```
//!
//! The native queue is bounded, so draining after each enqueue is what keeps
//! it from overflowing. Host memory grows only with decoded output.

use crate::arena::ArenaBuffer;
use crate::audio::DecodedAudio;
use crate::error::{DecoderError, Result};
use crate::native_error::NativeError;
use bridge_traits::{DecoderHandle, NativeModule};
use tracing::{debug, trace, warn};

/// Arena buffers one decode call works through.
pub(crate) struct StreamBuffers<'a> {
    pub input: &'a ArenaBuffer<u8>,
    pub left: &'a ArenaBuffer<f32>,
    pub right: &'a ArenaBuffer<f32>,
}

/// Ordered per-channel output segments and the running sample total.
#[derive(Debug, Clone, Default)]
pub struct ChannelAccumulator {
    segments: Vec<Vec<Vec<f32>>>,
    samples: usize,
}

impl ChannelAccumulator {
    pub fn new(channels: usize) -> Self {
        Self {
            segments: vec![Vec::new(); channels],
            samples: 0,
        }
    }

    /// Append one segment per channel. All planes must be the same length.
    pub fn push(&mut self, planes: Vec<Vec<f32>>) -> Result<()> {
        if planes.len() != self.segments.len() {
            return Err(DecoderError::Internal(format!(
                "expected {} channel segments, got {}",
                self.segments.len(),
                planes.len()
            )));
        }

        let count = planes.first().map_or(0, Vec::len);
        if planes.iter().any(|plane| plane.len() != count) {
            return Err(DecoderError::Internal(
                "channel segments differ in length".to_string(),
            ));
        }

        for (channel, plane) in self.segments.iter_mut().zip(planes) {
            channel.push(plane);
        }
        self.samples += count;
        Ok(())
    }

    /// Samples per channel accumulated so far.
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn channels(&self) -> usize {
        self.segments.len()
    }

    /// Number of segments per channel.
    pub fn segment_count(&self) -> usize {
        self.segments.first().map_or(0, Vec::len)
    }

    /// Concatenate every channel into one contiguous array.
    pub fn finish(self, sample_rate: u32) -> Result<DecodedAudio> {
        let samples = self.samples;
        let channel_data = self
            .segments
            .into_iter()
            .map(|segments| {
                let mut channel = Vec::with_capacity(samples);
                for segment in segments {
                    channel.extend_from_slice(&segment);
                }
                channel
            })
            .collect();

        DecodedAudio::new(channel_data, samples, sample_rate)
    }
}

/// Run every segment through the native decoder.
///
/// Any enqueue refusal or negative step aborts the whole call; samples
/// decoded before the failure are discarded.
pub(crate) fn decode_segments<'s, I>(
    module: &mut dyn NativeModule,
    handle: DecoderHandle,
    buffers: &StreamBuffers<'_>,
    segments: I,
) -> Result<ChannelAccumulator>
where
    I: IntoIterator<Item = &'s [u8]>,
{
    let mut output = ChannelAccumulator::new(2);
    let capacity = buffers.input.len();
    if capacity == 0 {
        return Err(DecoderError::Internal("input buffer has no capacity".to_string()));
    }
    let input_ptr = buffers.input.ptr()?;
    let mut offset = 0;

    for segment in segments {
        for chunk in segment.chunks(capacity) {
            buffers.input.write_into(module, chunk)?;

            if !module.decoder_enqueue(handle, input_ptr, chunk.len()) {
                warn!(offset, len = chunk.len(), "native enqueue refused input");
                return Err(DecoderError::EnqueueFailed {
                    offset,
                    len: chunk.len(),
                });
            }
            offset += chunk.len();

            drain(module, handle, buffers, &mut output)?;
        }
    }

    debug!(
        bytes = offset,
        samples = output.samples(),
        segments = output.segment_count(),
        "stream decoded"
    );
    Ok(output)
}

/// Call `decode_step` until the module reports no more output.
fn drain(
    module: &mut dyn NativeModule,
    handle: DecoderHandle,
    buffers: &StreamBuffers<'_>,
    output: &mut ChannelAccumulator,
) -> Result<()> {
    let left = buffers.left.ptr()?;
    let right = buffers.right.ptr()?;
    let window = buffers.left.len().min(buffers.right.len());

    loop {
        let status = module.decode_step(handle, left, right);
        if status == 0 {
            return Ok(());
        }
        if status < 0 {
            let err = NativeError::new(module.library(), status);
            warn!(code = status, category = ?err.category(), "native decode failed");
            return Err(err.into());
        }

        let count = status as usize;
        if count > window {
            return Err(DecoderError::Internal(format!(
                "native decoder reported {} samples for a {}-sample window",
                count, window
            )));
        }

        trace!(count, "decode step");
        let planes = vec![
            buffers.left.read_from(module, count)?,
            buffers.right.read_from(module, count)?,
        ];
        output.push(planes)?;
    }
}
