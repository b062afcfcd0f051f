//! # Desktop Bridge Implementations
//!
//! In-process native decoding modules for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides implementations of the `bridge-traits` module
//! contract that run without a WebAssembly engine:
//! - `LinearMemory` - growable 32-bit addressed memory with a `malloc`/`free`
//!   allocator, shared by every module in this crate
//! - `MpegModule` / `MpegModuleLoader` - MPEG Layer III decoding using
//!   `symphonia`
//!
//! ## Feature Flags
//!
//! - `mpeg`: Enable the Symphonia-backed MPEG module (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::MpegModuleLoader;
//! use bridge_traits::ModuleLoader;
//!
//! #[tokio::main]
//! async fn main() {
//!     let module = MpegModuleLoader::default().load().await.unwrap();
//!     assert_eq!(module.library(), "symphonia-mp3");
//! }
//! ```

mod memory;

#[cfg(feature = "mpeg")]
pub mod mpeg;

pub use memory::{LinearMemory, DEFAULT_MEMORY_LIMIT};

#[cfg(feature = "mpeg")]
pub use mpeg::{
    MpegModule, MpegModuleLoader, DEFAULT_QUEUE_CAPACITY, MAX_ENQUEUE_BYTES, MAX_FRAME_LEN,
    MPEG_FRAME_SAMPLES,
};
