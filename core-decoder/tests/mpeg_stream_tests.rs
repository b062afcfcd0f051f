use bridge_desktop::{MpegModuleLoader, MPEG_FRAME_SAMPLES};
use bridge_traits::DecoderVariant;
use core_decoder::config::MAX_MPEG_INPUT_BYTES;
use core_decoder::{DecodedAudio, DecoderConfig, DecoderWorker, ModuleRegistry, StreamDecoder};
use std::sync::Arc;

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, no CRC.
const STEREO_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];
const MONO_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0xC0];
const FRAME_LEN: usize = 417;

fn silent_frames(header: [u8; 4], count: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(count * FRAME_LEN);
    for _ in 0..count {
        let start = data.len();
        data.extend_from_slice(&header);
        data.resize(start + FRAME_LEN, 0);
    }
    data
}

/// ID3v2.4 tag whose body is `body` bytes of frame-like filler, so any tag
/// byte that reaches the codec shows up as extra samples.
fn id3_tag(body: usize) -> Vec<u8> {
    let mut tag = b"ID3\x04\x00\x00".to_vec();
    tag.extend((0..4).rev().map(|i| ((body >> (7 * i)) & 0x7F) as u8));
    let filler = silent_frames(STEREO_HEADER, body / FRAME_LEN + 1);
    tag.extend_from_slice(&filler[..body]);
    tag
}

fn mpeg_registry() -> Arc<ModuleRegistry> {
    Arc::new(
        ModuleRegistry::new().with_loader(DecoderVariant::Mpeg, Arc::new(MpegModuleLoader::default())),
    )
}

async fn ready_decoder(config: DecoderConfig) -> StreamDecoder {
    let mut decoder = StreamDecoder::new(mpeg_registry(), config).unwrap();
    decoder.ready().await.unwrap();
    decoder
}

fn assert_silent_stereo(audio: &DecodedAudio, frames: usize) {
    assert_eq!(audio.samples_decoded(), frames * MPEG_FRAME_SAMPLES);
    assert_eq!(audio.sample_rate(), 44_100);
    assert_eq!(audio.channel(0), audio.channel(1));
    assert!(audio.channel(0).unwrap().iter().all(|&s| s == 0.0));
}

// ============================================================================
// Streams larger than the input buffer
// ============================================================================

#[tokio::test]
async fn test_default_config_decodes_long_stream() {
    let config = DecoderConfig::from_json_str(r#"{ "variant": "mpeg" }"#).unwrap();
    assert_eq!(config.input_buffer_bytes, MAX_MPEG_INPUT_BYTES);
    let mut decoder = ready_decoder(config).await;

    // About 167 KB: three full chunks, each leaving a partial frame queued
    let data = silent_frames(STEREO_HEADER, 400);
    let audio = decoder.decode(&data).unwrap();
    assert_silent_stereo(&audio, 400);
}

#[tokio::test]
async fn test_split_stream_matches_whole_stream() {
    let data = silent_frames(STEREO_HEADER, 100);

    let mut whole = ready_decoder(DecoderConfig::mpeg()).await;
    let expected = whole.decode(&data).unwrap();

    let mut split = ready_decoder(DecoderConfig::mpeg()).await;
    let mut samples = 0;
    for chunk in data.chunks(10_007) {
        samples += split.decode(chunk).unwrap().samples_decoded();
    }

    assert_eq!(samples, expected.samples_decoded());
    assert_silent_stereo(&expected, 100);
}

#[tokio::test]
async fn test_worker_decodes_long_stream() {
    let worker = DecoderWorker::spawn(mpeg_registry(), DecoderConfig::mpeg()).unwrap();
    worker.ready().await.unwrap();

    let audio = worker.decode(silent_frames(STEREO_HEADER, 200)).await.unwrap();
    assert_silent_stereo(&audio, 200);
    worker.free().await;
}

// ============================================================================
// Metadata tags
// ============================================================================

#[tokio::test]
async fn test_tag_larger_than_queue_is_skipped() {
    let mut data = id3_tag(100_000);
    data.extend(silent_frames(STEREO_HEADER, 10));

    let mut decoder = ready_decoder(DecoderConfig::mpeg()).await;
    let audio = decoder.decode(&data).unwrap();
    assert_silent_stereo(&audio, 10);
}

#[tokio::test]
async fn test_tag_split_across_calls_is_skipped() {
    let mut data = id3_tag(150_000);
    data.extend(silent_frames(STEREO_HEADER, 10));

    let mut decoder = ready_decoder(DecoderConfig::mpeg()).await;
    let mut samples = 0;
    for chunk in data.chunks(4_096) {
        samples += decoder.decode(chunk).unwrap().samples_decoded();
    }
    assert_eq!(samples, 10 * MPEG_FRAME_SAMPLES);
}

#[tokio::test]
async fn test_small_tag_is_skipped() {
    let mut data = id3_tag(1_000);
    data.extend(silent_frames(STEREO_HEADER, 3));

    let mut decoder = ready_decoder(DecoderConfig::mpeg()).await;
    let audio = decoder.decode(&data).unwrap();
    assert_silent_stereo(&audio, 3);
}

// ============================================================================
// Channels
// ============================================================================

#[tokio::test]
async fn test_mono_is_duplicated_into_both_channels() {
    let mut decoder = ready_decoder(DecoderConfig::mpeg()).await;
    let audio = decoder.decode(&silent_frames(MONO_HEADER, 5)).unwrap();

    assert_eq!(audio.channels(), 2);
    assert_silent_stereo(&audio, 5);
}

#[tokio::test]
async fn test_frames_decode_through_stream_decoder() {
    let frames: Vec<Vec<u8>> = (0..4).map(|_| silent_frames(STEREO_HEADER, 1)).collect();

    let mut decoder = ready_decoder(DecoderConfig::mpeg()).await;
    let audio = decoder.decode_frames(&frames).unwrap();
    assert_silent_stereo(&audio, 4);
}
