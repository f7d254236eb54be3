//! Recycling of frame-scoped containers.
//!
//! Per-frame structures (proxy arenas, draw lists) are rebuilt every frame.
//! Dropping them at the end of a frame throws away their `Vec` capacity and
//! the next frame pays for the same allocations again. [`RecyclePool`] keeps
//! released values around in a cleared state so the next frame can reuse
//! their storage.
//!
//! # Example
//!
//! ```
//! use lumen_core::pool::{Poolable, RecyclePool};
//!
//! #[derive(Debug, Default)]
//! struct DrawList {
//!     items: Vec<u32>,
//! }
//!
//! impl Poolable for DrawList {
//!     fn new_empty() -> Self {
//!         Self::default()
//!     }
//!     fn reset(&mut self) {
//!         self.items.clear();
//!     }
//! }
//!
//! let mut pool = RecyclePool::<DrawList>::new(4);
//! let mut list = pool.acquire();
//! list.items.extend_from_slice(&[1, 2, 3]);
//! pool.release(list);
//!
//! // The recycled list is empty but keeps its capacity.
//! let list = pool.acquire();
//! assert!(list.items.is_empty());
//! assert!(list.items.capacity() >= 3);
//! ```

/// Trait for types that can be recycled.
///
/// Implementors must be able to create an empty instance and clear their
/// contents while preserving allocated capacity.
pub trait Poolable {
    /// Create a new empty instance for a cold pool.
    fn new_empty() -> Self;

    /// Reset the value to an empty state, preserving allocated capacity.
    ///
    /// For example, call `Vec::clear()` rather than replacing with a new `Vec`.
    fn reset(&mut self);
}

/// A bounded free-list of cleared values.
///
/// [`acquire`](Self::acquire) hands out a recycled value when one is
/// available and creates a fresh one otherwise. [`release`](Self::release)
/// resets the value and keeps it unless the pool already holds
/// `max_retained` values, in which case it is dropped.
#[derive(Debug)]
pub struct RecyclePool<T: Poolable> {
    free: Vec<T>,
    max_retained: usize,
    created: usize,
    reused: usize,
}

impl<T: Poolable> RecyclePool<T> {
    /// Create an empty pool retaining at most `max_retained` released values.
    pub fn new(max_retained: usize) -> Self {
        Self {
            free: Vec::with_capacity(max_retained),
            max_retained,
            created: 0,
            reused: 0,
        }
    }

    /// Take a cleared value out of the pool, creating one if the pool is empty.
    pub fn acquire(&mut self) -> T {
        match self.free.pop() {
            Some(value) => {
                self.reused += 1;
                value
            }
            None => {
                self.created += 1;
                T::new_empty()
            }
        }
    }

    /// Take a recycled value only, never creating a new one.
    pub fn try_acquire(&mut self) -> Option<T> {
        let value = self.free.pop()?;
        self.reused += 1;
        Some(value)
    }

    /// Return a value to the pool.
    pub fn release(&mut self, mut value: T) {
        if self.free.len() >= self.max_retained {
            return;
        }
        value.reset();
        self.free.push(value);
    }

    /// Number of values waiting to be reused.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Number of values created because the pool was empty.
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Number of acquisitions served from recycled values.
    pub fn reused_count(&self) -> usize {
        self.reused
    }
}

impl<T: Poolable> Default for RecyclePool<T> {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct TestBuffer {
        data: Vec<u32>,
    }

    impl Poolable for TestBuffer {
        fn new_empty() -> Self {
            Self::default()
        }
        fn reset(&mut self) {
            self.data.clear();
        }
    }

    #[test]
    fn test_acquire_from_empty_creates() {
        let mut pool = RecyclePool::<TestBuffer>::new(2);
        let buf = pool.acquire();
        assert!(buf.data.is_empty());
        assert_eq!(pool.created_count(), 1);
        assert_eq!(pool.reused_count(), 0);
    }

    #[test]
    fn test_release_clears_and_preserves_capacity() {
        let mut pool = RecyclePool::<TestBuffer>::new(2);
        pool.release(TestBuffer {
            data: vec![1, 2, 3, 4, 5],
        });
        assert_eq!(pool.available(), 1);

        let buf = pool.acquire();
        assert!(buf.data.is_empty());
        assert!(buf.data.capacity() >= 5);
        assert_eq!(pool.reused_count(), 1);
    }

    #[test]
    fn test_release_beyond_limit_drops() {
        let mut pool = RecyclePool::<TestBuffer>::new(1);
        pool.release(TestBuffer::default());
        pool.release(TestBuffer::default());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_try_acquire() {
        let mut pool = RecyclePool::<TestBuffer>::new(1);
        assert!(pool.try_acquire().is_none());
        pool.release(TestBuffer::default());
        assert!(pool.try_acquire().is_some());
        assert_eq!(pool.created_count(), 0);
    }

    #[test]
    fn test_steady_state_reuses() {
        let mut pool = RecyclePool::<TestBuffer>::new(2);
        for i in 0..8 {
            let mut buf = pool.acquire();
            buf.data.extend(0..i);
            pool.release(buf);
        }
        assert_eq!(pool.created_count(), 1);
        assert_eq!(pool.reused_count(), 7);
    }
}
