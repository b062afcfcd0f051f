//! # Typed Arena
//!
//! Fixed-size buffers living in a native module's linear memory.
//!
//! ## Overview
//!
//! An [`ArenaBuffer<T>`] pairs a native pointer with an element count and
//! exposes typed copy-in / copy-out access to that region. It owns the
//! allocation: [`ArenaBuffer::release`] (or `Drop`) hands it back to the
//! native allocator exactly once and leaves a tombstone behind, so a stale
//! buffer fails with [`DecoderError::Freed`] instead of touching memory the
//! module may have reused.
//!
//! Elements are stored little-endian, matching WebAssembly linear memory.

use crate::error::{DecoderError, Result};
use bridge_traits::{NativeModule, Ptr};
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// A native module shared between decoder instances.
pub type SharedModule = Arc<Mutex<Box<dyn NativeModule>>>;

/// Wrap an instantiated module for sharing.
pub fn share_module(module: Box<dyn NativeModule>) -> SharedModule {
    Arc::new(Mutex::new(module))
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for f32 {}
}

/// Element types that can live in an arena buffer.
pub trait Element: sealed::Sealed + Copy + Send + 'static {
    /// Size of one element in bytes.
    const WIDTH: usize;

    fn store(self, dst: &mut [u8]);

    fn load(src: &[u8]) -> Self;
}

impl Element for u8 {
    const WIDTH: usize = 1;

    fn store(self, dst: &mut [u8]) {
        dst[0] = self;
    }

    fn load(src: &[u8]) -> Self {
        src[0]
    }
}

impl Element for f32 {
    const WIDTH: usize = 4;

    fn store(self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.to_le_bytes());
    }

    fn load(src: &[u8]) -> Self {
        f32::from_le_bytes([src[0], src[1], src[2], src[3]])
    }
}

/// Owning typed view over a native allocation.
pub struct ArenaBuffer<T: Element> {
    module: SharedModule,
    /// `None` once released.
    ptr: Option<Ptr>,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> ArenaBuffer<T> {
    /// Allocate room for `len` elements in the module memory.
    pub fn allocate(module: &SharedModule, len: usize) -> Result<Self> {
        let bytes = len
            .checked_mul(T::WIDTH)
            .ok_or(DecoderError::AllocationFailed { bytes: usize::MAX })?;

        let ptr = module
            .lock()
            .malloc(bytes)
            .filter(|ptr| !ptr.is_null())
            .ok_or(DecoderError::AllocationFailed { bytes })?;

        trace!(%ptr, bytes, "allocated arena buffer");
        Ok(Self {
            module: Arc::clone(module),
            ptr: Some(ptr),
            len,
            _marker: PhantomData,
        })
    }

    /// Native pointer of the buffer.
    pub fn ptr(&self) -> Result<Ptr> {
        self.ptr.ok_or(DecoderError::Freed)
    }

    /// Capacity in elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len * T::WIDTH
    }

    pub fn is_released(&self) -> bool {
        self.ptr.is_none()
    }

    /// Copy `data` to the start of the buffer.
    pub fn write(&self, data: &[T]) -> Result<()> {
        let mut module = self.module.lock();
        self.write_into(&mut **module, data)
    }

    /// Copy the first `count` elements out of the buffer.
    pub fn read(&self, count: usize) -> Result<Vec<T>> {
        let module = self.module.lock();
        self.read_from(&**module, count)
    }

    /// [`write`](Self::write) against a module the caller already locked.
    pub(crate) fn write_into(&self, module: &mut dyn NativeModule, data: &[T]) -> Result<()> {
        let region = self.region(data.len())?;
        let dst = module
            .memory_mut()
            .get_mut(region)
            .ok_or_else(|| self.out_of_bounds())?;

        for (chunk, value) in dst.chunks_exact_mut(T::WIDTH).zip(data) {
            value.store(chunk);
        }
        Ok(())
    }

    /// [`read`](Self::read) against a module the caller already locked.
    pub(crate) fn read_from(&self, module: &dyn NativeModule, count: usize) -> Result<Vec<T>> {
        let region = self.region(count)?;
        let src = module
            .memory()
            .get(region)
            .ok_or_else(|| self.out_of_bounds())?;

        Ok(src.chunks_exact(T::WIDTH).map(T::load).collect())
    }

    /// Return the allocation to the native allocator. Idempotent.
    pub fn release(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            self.module.lock().free(ptr);
            trace!(%ptr, "released arena buffer");
        }
    }

    fn region(&self, count: usize) -> Result<std::ops::Range<usize>> {
        let ptr = self.ptr()?;
        if count > self.len {
            return Err(DecoderError::InvalidInput(format!(
                "{} elements exceed arena buffer capacity of {}",
                count, self.len
            )));
        }
        let start = ptr.offset();
        Ok(start..start + count * T::WIDTH)
    }

    fn out_of_bounds(&self) -> DecoderError {
        DecoderError::Internal(format!(
            "arena buffer of {} bytes lies outside native memory",
            self.byte_len()
        ))
    }
}

impl<T: Element> Drop for ArenaBuffer<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: Element> std::fmt::Debug for ArenaBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("width", &T::WIDTH)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_is_little_endian() {
        let mut bytes = [0u8; 4];
        1.5f32.store(&mut bytes);
        assert_eq!(bytes, 1.5f32.to_le_bytes());
        assert_eq!(f32::load(&bytes), 1.5);
    }

    #[test]
    fn test_widths() {
        assert_eq!(<u8 as Element>::WIDTH, 1);
        assert_eq!(<f32 as Element>::WIDTH, 4);
    }
}
