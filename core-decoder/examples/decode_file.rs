//! Decode an MP3 file on a worker thread and print a summary.
//!
//! ```text
//! cargo run -p core-decoder --example decode_file -- song.mp3
//! RUST_LOG=core_decoder=debug cargo run -p core-decoder --example decode_file -- song.mp3
//! ```

use anyhow::{Context, Result};
use bridge_desktop::MpegModuleLoader;
use bridge_traits::DecoderVariant;
use core_decoder::{DecoderConfig, DecoderWorker, ModuleRegistry};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(
        LoggingConfig::from_env()
            .with_format(LogFormat::Compact)
            .with_stderr(true),
    )?;

    let path = std::env::args()
        .nth(1)
        .context("usage: decode_file <file.mp3>")?;
    let data = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read {}", path))?;

    let registry = Arc::new(
        ModuleRegistry::new().with_loader(DecoderVariant::Mpeg, Arc::new(MpegModuleLoader::default())),
    );
    let worker = DecoderWorker::spawn(registry, DecoderConfig::mpeg())?;
    worker.ready().await?;

    let bytes = data.len();
    let result = worker.decode(data).await;
    worker.free().await;
    let audio = result?;

    let peak = audio
        .channel_data()
        .iter()
        .flatten()
        .fold(0.0f32, |peak, s| peak.max(s.abs()));

    println!("file:      {}", path);
    println!("input:     {} bytes", bytes);
    println!("samples:   {} per channel", audio.samples_decoded());
    println!("rate:      {} Hz", audio.sample_rate());
    println!("duration:  {:.3} s", audio.duration().as_secs_f64());
    println!("peak:      {:.4}", peak);
    Ok(())
}
