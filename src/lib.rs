//! Workspace facade crate.
//!
//! Re-exports the decoder core together with the host modules so
//! applications can depend on `audio-decoders` alone. The `mpeg` feature
//! (default) maps to `bridge-desktop/mpeg`.

use std::sync::Arc;

pub use bridge_traits::{DecoderHandle, DecoderVariant, ModuleLoader, NativeModule, Ptr};
pub use core_decoder::{
    DecodedAudio, DecoderConfig, DecoderError, DecoderState, DecoderWorker, ModuleRegistry,
    ModuleScope, NativeError, NativeErrorCategory, StreamDecoder, WorkerConfig,
};
pub use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};

pub use bridge_desktop::LinearMemory;
#[cfg(feature = "mpeg")]
pub use bridge_desktop::{MpegModule, MpegModuleLoader};

/// Registry with a loader for every module built into this crate.
///
/// Ogg Opus needs an externally supplied module; register it with
/// [`ModuleRegistry::register`].
pub fn default_registry() -> Arc<ModuleRegistry> {
    let registry = ModuleRegistry::new();
    #[cfg(feature = "mpeg")]
    registry.register(DecoderVariant::Mpeg, Arc::new(MpegModuleLoader::default()));
    Arc::new(registry)
}
