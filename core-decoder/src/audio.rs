//! Decoded PCM result value.

use crate::error::{DecoderError, Result};
use serde::Serialize;
use std::time::Duration;

/// Deinterleaved `f32` PCM produced by one decode call.
///
/// Every channel holds exactly `samples_decoded` samples. The value is
/// immutable; use [`DecodedAudio::into_channel_data`] to take the buffers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedAudio {
    channel_data: Vec<Vec<f32>>,
    samples_decoded: usize,
    sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(channel_data: Vec<Vec<f32>>, samples_decoded: usize, sample_rate: u32) -> Result<Self> {
        if let Some((index, channel)) = channel_data
            .iter()
            .enumerate()
            .find(|(_, channel)| channel.len() != samples_decoded)
        {
            return Err(DecoderError::InvalidInput(format!(
                "channel {} holds {} samples, expected {}",
                index,
                channel.len(),
                samples_decoded
            )));
        }

        Ok(Self {
            channel_data,
            samples_decoded,
            sample_rate,
        })
    }

    /// Zero samples on `channels` empty channels.
    pub fn empty(channels: usize, sample_rate: u32) -> Self {
        Self {
            channel_data: vec![Vec::new(); channels],
            samples_decoded: 0,
            sample_rate,
        }
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channel_data.get(index).map(Vec::as_slice)
    }

    pub fn channel_data(&self) -> &[Vec<f32>] {
        &self.channel_data
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channel_data.len()
    }

    /// Samples per channel.
    pub fn samples_decoded(&self) -> usize {
        self.samples_decoded
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples_decoded == 0
    }

    /// Playback duration of the decoded samples.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples_decoded as f64 / self.sample_rate as f64)
    }

    pub fn into_channel_data(self) -> Vec<Vec<f32>> {
        self.channel_data
    }
}
