//! # Streaming Decoder Core
//!
//! Streams compressed audio through a native decoding module and produces
//! deinterleaved `f32` PCM with bounded host memory.
//!
//! ## Overview
//!
//! This crate handles:
//! - Native buffer management in the module's linear memory ([`arena`])
//! - The chunk / enqueue / drain decode loop ([`stream`])
//! - Mapping native status codes to readable errors ([`native_error`])
//! - Decoder lifecycle: `ready`, `decode`, `reset`, `free` ([`StreamDecoder`])
//! - Running a decoder off-thread behind correlated requests ([`DecoderWorker`])
//!
//! Native modules are resolved through a [`ModuleRegistry`] that instantiates
//! each decoder variant once and shares it between instances.
//!
//! ## Usage
//!
//! ```ignore
//! use core_decoder::{DecoderConfig, ModuleRegistry, StreamDecoder};
//! use bridge_traits::DecoderVariant;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(
//!     ModuleRegistry::new().with_loader(DecoderVariant::OggOpus, Arc::new(my_loader)),
//! );
//! let mut decoder = StreamDecoder::new(registry, DecoderConfig::ogg_opus())?;
//! decoder.ready().await?;
//!
//! let audio = decoder.decode(&ogg_bytes)?;
//! println!("{} samples @ {} Hz", audio.samples_decoded(), audio.sample_rate());
//! decoder.free();
//! ```

pub mod arena;
pub mod audio;
pub mod config;
pub mod error;
pub mod instance;
pub mod native_error;
pub mod registry;
pub mod stream;
pub mod worker;

pub use arena::{share_module, ArenaBuffer, SharedModule};
pub use audio::DecodedAudio;
pub use config::{DecoderConfig, WorkerConfig};
pub use error::{DecoderError, Result};
pub use instance::{DecoderState, ModuleScope, StreamDecoder};
pub use native_error::{NativeError, NativeErrorCategory};
pub use registry::ModuleRegistry;
pub use stream::ChannelAccumulator;
pub use worker::DecoderWorker;
