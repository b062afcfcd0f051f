//! # Decoder Configuration
//!
//! Configuration types for decoder instances and worker threads.

use crate::error::{DecoderError, Result};
use bridge_traits::DecoderVariant;
use serde::{Deserialize, Serialize};

/// Largest chunk libopusfile accepts per enqueue (maximum Ogg page size).
pub const MAX_OGG_OPUS_INPUT_BYTES: usize = 64 * 1024;

/// Largest input buffer for MPEG streams. The MPEG module's default queue
/// holds one chunk of this size on top of a leftover partial frame.
pub const MAX_MPEG_INPUT_BYTES: usize = 64 * 1024;

/// Smallest stack a worker thread may be given.
pub const MIN_WORKER_STACK_SIZE: usize = 64 * 1024;

/// Decoder instance configuration.
///
/// Controls which native module backs the instance and how much compressed
/// input is staged in native memory per enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Native decoder backend.
    ///
    /// Default: Ogg Opus.
    #[serde(default = "default_variant")]
    pub variant: DecoderVariant,

    /// Size of the native input buffer in bytes.
    ///
    /// Input larger than this is fed in consecutive chunks; a single frame
    /// passed to `decode_frame` must fit.
    ///
    /// Default: 64 KB.
    #[serde(default = "default_input_buffer_bytes")]
    pub input_buffer_bytes: usize,

    /// Output channels. Only stereo is supported.
    #[serde(default = "default_channels")]
    pub channels: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            input_buffer_bytes: default_input_buffer_bytes(),
            channels: default_channels(),
        }
    }
}

impl DecoderConfig {
    /// Configuration for continuous Ogg Opus streams.
    pub fn ogg_opus() -> Self {
        Self::default()
    }

    /// Configuration for MPEG audio streams.
    ///
    /// MPEG frames are at most a few KB, so a smaller staging buffer is used.
    pub fn mpeg() -> Self {
        Self {
            variant: DecoderVariant::Mpeg,
            input_buffer_bytes: 16 * 1024, // 16 KB
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON, applying defaults and validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DecoderError::Config(format!("Invalid decoder config JSON: {}", e)))?;
        config.validate().map_err(DecoderError::Config)?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.input_buffer_bytes == 0 {
            return Err("input_buffer_bytes must be > 0".to_string());
        }

        let max_input = match self.variant {
            DecoderVariant::OggOpus => MAX_OGG_OPUS_INPUT_BYTES,
            DecoderVariant::Mpeg => MAX_MPEG_INPUT_BYTES,
        };
        if self.input_buffer_bytes > max_input {
            return Err(format!(
                "input_buffer_bytes cannot exceed {} for {}",
                max_input, self.variant
            ));
        }

        if self.channels != 2 {
            return Err("channels must be 2 (stereo)".to_string());
        }

        Ok(())
    }
}

/// Decoder worker thread configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// OS thread name.
    ///
    /// Default: "decoder-worker".
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Thread stack size in bytes. `None` uses the platform default.
    #[serde(default)]
    pub stack_size: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
            stack_size: None,
        }
    }
}

impl WorkerConfig {
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.thread_name.is_empty() {
            return Err("thread_name must not be empty".to_string());
        }

        if self.thread_name.contains('\0') {
            return Err("thread_name must not contain NUL bytes".to_string());
        }

        if let Some(size) = self.stack_size {
            if size < MIN_WORKER_STACK_SIZE {
                return Err(format!(
                    "stack_size must be at least {} bytes",
                    MIN_WORKER_STACK_SIZE
                ));
            }
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_variant() -> DecoderVariant {
    DecoderVariant::OggOpus
}

fn default_input_buffer_bytes() -> usize {
    MAX_OGG_OPUS_INPUT_BYTES // 64 KB
}

fn default_channels() -> usize {
    2
}

fn default_thread_name() -> String {
    "decoder-worker".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DecoderConfig::default();
        assert_eq!(config.variant, DecoderVariant::OggOpus);
        assert_eq!(config.input_buffer_bytes, 65536);
        assert_eq!(config.channels, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let mpeg = DecoderConfig::mpeg();
        assert_eq!(mpeg.variant, DecoderVariant::Mpeg);
        assert_eq!(mpeg.input_buffer_bytes, 16384);
        assert!(mpeg.validate().is_ok());

        assert_eq!(DecoderConfig::ogg_opus(), DecoderConfig::default());
    }

    #[test]
    fn test_validation() {
        let mut config = DecoderConfig::default();
        config.input_buffer_bytes = 0;
        assert!(config.validate().is_err());

        config.input_buffer_bytes = MAX_OGG_OPUS_INPUT_BYTES + 1;
        assert!(config.validate().is_err());

        config.variant = DecoderVariant::Mpeg;
        config.input_buffer_bytes = MAX_MPEG_INPUT_BYTES + 1;
        assert!(config.validate().is_err());
        config.input_buffer_bytes = MAX_MPEG_INPUT_BYTES;
        assert!(config.validate().is_ok());

        config.channels = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let config = DecoderConfig::from_json_str(r#"{ "variant": "mpeg" }"#).unwrap();
        assert_eq!(config.variant, DecoderVariant::Mpeg);
        assert_eq!(config.input_buffer_bytes, MAX_MPEG_INPUT_BYTES);
        assert_eq!(config.channels, 2);

        let result = DecoderConfig::from_json_str(
            r#"{ "variant": "mpeg", "input_buffer_bytes": 1048576 }"#,
        );
        assert!(matches!(result, Err(DecoderError::Config(_))));
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        let result = DecoderConfig::from_json_str(r#"{ "channels": 6 }"#);
        assert!(matches!(result, Err(DecoderError::Config(_))));

        let result = DecoderConfig::from_json_str("not json");
        assert!(matches!(result, Err(DecoderError::Config(_))));
    }

    #[test]
    fn test_worker_config_validation() {
        assert!(WorkerConfig::default().validate().is_ok());
        assert!(WorkerConfig::default().with_thread_name("").validate().is_err());
        assert!(WorkerConfig::default().with_thread_name("a\0b").validate().is_err());
        assert!(WorkerConfig::default().with_stack_size(1024).validate().is_err());
        assert!(WorkerConfig::default()
            .with_stack_size(2 * 1024 * 1024)
            .validate()
            .is_ok());
    }
}
