//! # Host Bridge Traits
//!
//! Capabilities the decoder core consumes but does not implement.
//!
//! ## Overview
//!
//! The decoding routines themselves live in a native module: a codec library
//! with its own linear memory and allocator. This crate defines the contract
//! between the core and such a module:
//!
//! - [`NativeModule`](native::NativeModule) - allocator, memory access and the
//!   `create` / `enqueue` / `decode_step` / `free` decoder functions
//! - [`ModuleLoader`](native::ModuleLoader) - asynchronous instantiation,
//!   doubling as the module readiness signal
//!
//! Host crates (e.g. `bridge-desktop`) ship concrete modules and loaders.
//!
//! ## Error Handling
//!
//! Loaders report failures through [`BridgeError`](error::BridgeError).
//! Native decoder functions report failures the way the underlying C library
//! does: null pointers, `false`, or negative status codes. Mapping those to
//! structured errors is the core's job.

pub mod error;
pub mod native;

pub use error::{BridgeError, Result};
pub use native::{DecoderHandle, DecoderVariant, ModuleLoader, NativeModule, Ptr};
