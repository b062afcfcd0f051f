//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the decoder crates:
//! - Logging and tracing infrastructure
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that binaries and tests depend
//! on. It establishes the logging conventions used throughout the workspace.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
