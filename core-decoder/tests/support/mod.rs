//! Scripted native module for exercising the decode loop.
//!
//! The toy codec turns every input byte into one stereo sample: it keeps a
//! running wrapping sum of the bytes, emits `sum / 255` on the left and its
//! negation on the right. The running sum makes output depend on all earlier
//! input, like a real codec's state.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::LinearMemory;
use bridge_traits::{BridgeError, DecoderHandle, DecoderVariant, ModuleLoader, NativeModule, Ptr};
use core_decoder::ModuleRegistry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TOY_LIBRARY: &str = "toy";

/// Behavior knobs for [`ToyModule`].
#[derive(Debug, Clone)]
pub struct ToyConfig {
    pub window: usize,
    pub queue_limit: usize,
    pub memory_limit: usize,
    pub reject_enqueue: bool,
    /// Return `code` from `decode_step` when this byte is reached.
    pub fail_on: Option<(u8, i32)>,
    pub sample_rate: Option<u32>,
}

impl Default for ToyConfig {
    fn default() -> Self {
        Self {
            window: 5760,
            queue_limit: 64 * 1024,
            memory_limit: 4 * 1024 * 1024,
            reject_enqueue: false,
            fail_on: None,
            sample_rate: None,
        }
    }
}

/// Live resource counters shared with the test.
#[derive(Debug, Clone, Default)]
pub struct ToyStats {
    pub live_handles: Arc<AtomicUsize>,
    pub live_allocations: Arc<AtomicUsize>,
    pub steps: Arc<AtomicUsize>,
}

impl ToyStats {
    pub fn handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    pub fn allocations(&self) -> usize {
        self.live_allocations.load(Ordering::SeqCst)
    }

    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct ToyStream {
    queue: VecDeque<u8>,
    sum: u8,
}

pub struct ToyModule {
    config: ToyConfig,
    memory: LinearMemory,
    streams: HashMap<u32, ToyStream>,
    next_handle: u32,
    stats: ToyStats,
}

impl ToyModule {
    pub fn new(config: ToyConfig, stats: ToyStats) -> Self {
        Self {
            memory: LinearMemory::with_limit(config.memory_limit),
            config,
            streams: HashMap::new(),
            next_handle: 1,
            stats,
        }
    }

}

impl NativeModule for ToyModule {
    fn library(&self) -> &'static str {
        TOY_LIBRARY
    }

    fn malloc(&mut self, bytes: usize) -> Option<Ptr> {
        let ptr = self.memory.malloc(bytes);
        if ptr.is_some() {
            self.stats.live_allocations.fetch_add(1, Ordering::SeqCst);
        }
        ptr
    }

    fn free(&mut self, ptr: Ptr) {
        if self.memory.free(ptr) {
            self.stats.live_allocations.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn memory(&self) -> &[u8] {
        self.memory.bytes()
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.bytes_mut()
    }

    fn decoder_create(&mut self) -> Option<DecoderHandle> {
        let raw = self.next_handle;
        self.next_handle += 1;
        self.streams.insert(raw, ToyStream::default());
        self.stats.live_handles.fetch_add(1, Ordering::SeqCst);
        Some(DecoderHandle::new(raw))
    }

    fn decoder_enqueue(&mut self, handle: DecoderHandle, data: Ptr, len: usize) -> bool {
        if self.config.reject_enqueue {
            return false;
        }
        let Some(stream) = self.streams.get_mut(&handle.raw()) else {
            return false;
        };
        if stream.queue.len() + len > self.config.queue_limit {
            return false;
        }
        let Some(bytes) = self.memory.slice(data, len) else {
            return false;
        };
        stream.queue.extend(bytes.iter().copied());
        true
    }

    fn decode_step(&mut self, handle: DecoderHandle, left: Ptr, right: Ptr) -> i32 {
        self.stats.steps.fetch_add(1, Ordering::SeqCst);
        let Some(stream) = self.streams.get_mut(&handle.raw()) else {
            return -131;
        };

        let count = stream.queue.len().min(self.config.window);
        let mut lefts = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(byte) = stream.queue.pop_front() else {
                break;
            };
            if let Some((trigger, code)) = self.config.fail_on {
                if byte == trigger {
                    stream.queue.clear();
                    return code;
                }
            }
            stream.sum = stream.sum.wrapping_add(byte);
            lefts.push(stream.sum as f32 / 255.0);
        }
        let rights: Vec<f32> = lefts.iter().map(|s| -s).collect();

        if !self.memory.write_f32(left, &lefts) || !self.memory.write_f32(right, &rights) {
            return -129;
        }
        lefts.len() as i32
    }

    fn decoder_free(&mut self, handle: DecoderHandle) {
        if self.streams.remove(&handle.raw()).is_some() {
            self.stats.live_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn output_window(&self) -> usize {
        self.config.window
    }

    fn sample_rate(&self, _handle: DecoderHandle) -> Option<u32> {
        self.config.sample_rate
    }
}

/// Loader handing out [`ToyModule`]s and counting instantiations.
#[derive(Debug, Clone, Default)]
pub struct ToyLoader {
    pub config: ToyConfig,
    pub stats: ToyStats,
    pub loads: Arc<AtomicUsize>,
}

impl ToyLoader {
    pub fn new(config: ToyConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModuleLoader for ToyLoader {
    async fn load(&self) -> Result<Box<dyn NativeModule>, BridgeError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ToyModule::new(self.config.clone(), self.stats.clone())))
    }
}

/// Registry serving `loader` for Ogg Opus.
pub fn registry_with(loader: &ToyLoader) -> Arc<ModuleRegistry> {
    Arc::new(ModuleRegistry::new().with_loader(DecoderVariant::OggOpus, Arc::new(loader.clone())))
}

/// Left channel the toy codec produces for `data` from a fresh state.
pub fn expected_left(data: &[u8]) -> Vec<f32> {
    let mut sum = 0u8;
    data.iter()
        .map(|&b| {
            sum = sum.wrapping_add(b);
            sum as f32 / 255.0
        })
        .collect()
}

/// Deterministic pseudo-random input that never contains `0xFF`.
pub fn sample_input(len: usize) -> Vec<u8> {
    let mut state = 0x2545_F491u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state % 255) as u8
        })
        .collect()
}
