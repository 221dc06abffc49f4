//! Reusable scratch buffers for record decoding.
//!
//! Each record leases a byte buffer for the raw frame and a string buffer for
//! the decoded text. A [`Lease`] hands its buffer back when dropped, so success
//! and error paths release identically and peak memory tracks the largest
//! record rather than the file size.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Buffers larger than this are freed instead of returned to the pool.
const MAX_RETAINED_CAPACITY: usize = 4 * 1024 * 1024;

/// A buffer type that can be recycled between records.
pub trait Scratch: Default + Send {
    fn reset(&mut self);
    fn reserve_total(&mut self, capacity: usize);
    fn capacity(&self) -> usize;
}

impl Scratch for Vec<u8> {
    fn reset(&mut self) {
        self.clear();
    }

    fn reserve_total(&mut self, capacity: usize) {
        self.reserve(capacity.saturating_sub(self.len()));
    }

    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }
}

impl Scratch for String {
    fn reset(&mut self) {
        self.clear();
    }

    fn reserve_total(&mut self, capacity: usize) {
        self.reserve(capacity.saturating_sub(self.len()));
    }

    fn capacity(&self) -> usize {
        String::capacity(self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub acquired: u64,
    pub released: u64,
}

impl PoolStats {
    pub fn outstanding(&self) -> u64 {
        self.acquired - self.released
    }
}

#[derive(Debug)]
pub struct BufferPool<B> {
    free: Mutex<Vec<B>>,
    max_free: usize,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl<B: Scratch> BufferPool<B> {
    pub fn new(max_free: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_free,
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Borrow an empty buffer with room for at least `capacity` elements.
    pub fn lease(&self, capacity: usize) -> Lease<'_, B> {
        let mut buf = self
            .free
            .lock()
            .ok()
            .and_then(|mut free| free.pop())
            .unwrap_or_default();
        buf.reserve_total(capacity);
        self.acquired.fetch_add(1, Ordering::Relaxed);
        Lease { pool: self, buf }
    }

    fn release(&self, mut buf: B) {
        self.released.fetch_add(1, Ordering::Relaxed);
        if buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buf.reset();
        if let Ok(mut free) = self.free.lock()
            && free.len() < self.max_free
        {
            free.push(buf);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
        }
    }
}

impl<B: Scratch> Default for BufferPool<B> {
    fn default() -> Self {
        Self::new(8)
    }
}

/// A buffer on loan from a [`BufferPool`].
pub struct Lease<'a, B: Scratch> {
    pool: &'a BufferPool<B>,
    buf: B,
}

impl<B: Scratch> Deref for Lease<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.buf
    }
}

impl<B: Scratch> DerefMut for Lease<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.buf
    }
}

impl<B: Scratch> Drop for Lease<'_, B> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_returns_on_drop() {
        let pool: BufferPool<Vec<u8>> = BufferPool::new(2);
        {
            let mut buf = pool.lease(16);
            assert!(buf.capacity() >= 16);
            buf.extend_from_slice(b"abc");
            assert_eq!(pool.stats().outstanding(), 1);
        }
        assert_eq!(
            pool.stats(),
            PoolStats {
                acquired: 1,
                released: 1
            }
        );

        let buf = pool.lease(4);
        assert!(buf.is_empty(), "recycled buffers are cleared");
    }

    #[test]
    fn test_release_on_early_return() {
        fn fails(pool: &BufferPool<String>) -> Result<(), &'static str> {
            let mut text = pool.lease(8);
            text.push_str("partial");
            Err("boom")
        }

        let pool: BufferPool<String> = BufferPool::default();
        assert!(fails(&pool).is_err());
        assert!(fails(&pool).is_err());
        let stats = pool.stats();
        assert_eq!(stats.acquired, 2);
        assert_eq!(stats.released, 2);
    }

    #[test]
    fn test_oversized_buffers_not_retained() {
        let pool: BufferPool<Vec<u8>> = BufferPool::new(4);
        drop(pool.lease(MAX_RETAINED_CAPACITY + 1));
        assert!(pool.free.lock().unwrap().is_empty());
        assert_eq!(pool.stats().outstanding(), 0);
    }
}
