//! Host-side linear memory for in-process native modules.
//!
//! Mirrors the memory model of a WebAssembly instance: one growable byte
//! array addressed by 32-bit offsets, grown in 64 KiB pages up to a hard
//! limit, with a `malloc`/`free` allocator on top. Offset `0` is reserved as
//! the null pointer.

use bridge_traits::Ptr;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

const ALIGN: usize = 8;
const PAGE_SIZE: usize = 64 * 1024;

/// Default memory ceiling (16 MiB), matching a typical Emscripten build.
pub const DEFAULT_MEMORY_LIMIT: usize = 16 * 1024 * 1024;

/// Growable linear memory with a first-fit allocator.
#[derive(Debug)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    limit: usize,
    /// Bump pointer; everything at or above it is unallocated.
    top: usize,
    /// Live allocations: offset -> rounded size.
    allocations: HashMap<u32, usize>,
    /// Free blocks below `top`: offset -> size, coalesced.
    free_blocks: BTreeMap<u32, usize>,
}

impl Default for LinearMemory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MEMORY_LIMIT)
    }
}

impl LinearMemory {
    /// Create an empty memory that never grows beyond `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        let limit = limit.min(u32::MAX as usize);
        Self {
            bytes: Vec::new(),
            limit,
            top: ALIGN,
            allocations: HashMap::new(),
            free_blocks: BTreeMap::new(),
        }
    }

    /// Allocate `bytes` bytes. Returns `None` when the limit would be exceeded.
    pub fn malloc(&mut self, bytes: usize) -> Option<Ptr> {
        let size = round_up(bytes.max(1), ALIGN);

        if let Some(offset) = self.take_free_block(size) {
            self.allocations.insert(offset, size);
            return Some(Ptr::new(offset));
        }

        let offset = self.top;
        let end = offset.checked_add(size)?;
        if end > self.limit {
            return None;
        }

        self.top = end;
        if self.bytes.len() < end {
            let grown = round_up(end, PAGE_SIZE).min(self.limit);
            self.bytes.resize(grown, 0);
        }

        let offset = offset as u32;
        self.allocations.insert(offset, size);
        Some(Ptr::new(offset))
    }

    /// Release an allocation. Returns `false` for null, unknown or already
    /// released pointers.
    pub fn free(&mut self, ptr: Ptr) -> bool {
        if ptr.is_null() {
            return false;
        }

        let offset = ptr.offset() as u32;
        let Some(size) = self.allocations.remove(&offset) else {
            warn!(%ptr, "free of unknown pointer ignored");
            return false;
        };

        self.insert_free_block(offset, size);
        true
    }

    /// Bytes currently handed out to live allocations.
    pub fn allocated_bytes(&self) -> usize {
        self.allocations.values().sum()
    }

    /// Number of live allocations.
    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    /// Size of the backing memory (always a multiple of the page size unless
    /// capped by the limit).
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Bounds-checked view of `len` bytes at `ptr`.
    pub fn slice(&self, ptr: Ptr, len: usize) -> Option<&[u8]> {
        let start = ptr.offset();
        self.bytes.get(start..start.checked_add(len)?)
    }

    pub fn slice_mut(&mut self, ptr: Ptr, len: usize) -> Option<&mut [u8]> {
        let start = ptr.offset();
        self.bytes.get_mut(start..start.checked_add(len)?)
    }

    /// Write `samples` as little-endian `f32` starting at `ptr`.
    pub fn write_f32(&mut self, ptr: Ptr, samples: &[f32]) -> bool {
        let Some(dst) = self.slice_mut(ptr, samples.len() * 4) else {
            return false;
        };
        for (chunk, sample) in dst.chunks_exact_mut(4).zip(samples) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }
        true
    }

    fn take_free_block(&mut self, size: usize) -> Option<u32> {
        let (&offset, &block) = self.free_blocks.iter().find(|(_, block)| **block >= size)?;
        self.free_blocks.remove(&offset);
        if block > size {
            self.free_blocks.insert(offset + size as u32, block - size);
        }
        Some(offset)
    }

    fn insert_free_block(&mut self, mut offset: u32, mut size: usize) {
        // Merge with the following block
        let next = offset + size as u32;
        if let Some(next_size) = self.free_blocks.remove(&next) {
            size += next_size;
        }

        // Merge with the preceding block
        if let Some((&prev, &prev_size)) = self.free_blocks.range(..offset).next_back() {
            if prev as usize + prev_size == offset as usize {
                self.free_blocks.remove(&prev);
                offset = prev;
                size += prev_size;
            }
        }

        if offset as usize + size == self.top {
            self.top = offset as usize;
        } else {
            self.free_blocks.insert(offset, size);
        }
    }
}

fn round_up(value: usize, multiple: usize) -> usize {
    value.div_ceil(multiple) * multiple
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malloc_never_returns_null() {
        let mut memory = LinearMemory::default();
        let ptr = memory.malloc(0).unwrap();
        assert!(!ptr.is_null());
        assert_eq!(ptr.offset() % ALIGN, 0);
    }

    #[test]
    fn test_memory_grows_in_pages() {
        let mut memory = LinearMemory::default();
        memory.malloc(10).unwrap();
        assert_eq!(memory.size(), PAGE_SIZE);

        memory.malloc(PAGE_SIZE).unwrap();
        assert_eq!(memory.size(), 2 * PAGE_SIZE);
    }

    #[test]
    fn test_limit_exhaustion_returns_none() {
        let mut memory = LinearMemory::with_limit(1024);
        assert!(memory.malloc(512).is_some());
        assert!(memory.malloc(1024).is_none());
        assert_eq!(memory.allocation_count(), 1);
    }

    #[test]
    fn test_free_reuses_and_coalesces() {
        let mut memory = LinearMemory::default();
        let a = memory.malloc(64).unwrap();
        let b = memory.malloc(64).unwrap();
        let c = memory.malloc(64).unwrap();

        assert!(memory.free(a));
        assert!(memory.free(b));
        // a and b coalesce into one 128-byte hole below c
        let d = memory.malloc(128).unwrap();
        assert_eq!(d, a);

        assert!(memory.free(c));
        assert!(memory.free(d));
        assert_eq!(memory.allocated_bytes(), 0);
        assert_eq!(memory.top, ALIGN);
    }

    #[test]
    fn test_double_free_is_rejected() {
        let mut memory = LinearMemory::default();
        let ptr = memory.malloc(16).unwrap();
        assert!(memory.free(ptr));
        assert!(!memory.free(ptr));
        assert!(!memory.free(Ptr::NULL));
    }

    #[test]
    fn test_write_f32_little_endian() {
        let mut memory = LinearMemory::default();
        let ptr = memory.malloc(8).unwrap();
        assert!(memory.write_f32(ptr, &[1.0, -0.5]));

        let bytes = memory.slice(ptr, 8).unwrap();
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-0.5f32).to_le_bytes());
    }

    #[test]
    fn test_slice_out_of_bounds() {
        let memory = LinearMemory::with_limit(PAGE_SIZE);
        assert!(memory.slice(Ptr::new(8), 16).is_none());
    }
}
