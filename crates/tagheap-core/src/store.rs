//! Grow-only backing store capability.
//!
//! The allocator never touches process memory directly; it holds a value
//! implementing [`MemStore`] and asks it for more contiguous bytes on
//! demand. The region only ever grows. Injecting the store lets tests
//! substitute a bounded or exhausted region for the real thing.

use thiserror::Error;

/// Backing store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store cannot supply `requested` more bytes within `limit`.
    #[error("backing store exhausted: requested {requested} more bytes, limit {limit}")]
    Exhausted { requested: usize, limit: usize },
}

/// A single contiguous, grow-only memory region.
///
/// `extend` is never called with a zero request. A failed extension must
/// leave the region untouched.
pub trait MemStore {
    /// Grows the region by `bytes`, returning the offset of the first
    /// newly appended byte (the region's previous length).
    fn extend(&mut self, bytes: usize) -> Result<usize, StoreError>;

    /// Current region length in bytes.
    fn len(&self) -> usize;

    /// Whether the region is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole region.
    fn bytes(&self) -> &[u8];

    /// The whole region, mutably.
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// `Vec`-backed store, optionally bounded by a byte limit.
#[derive(Debug, Default)]
pub struct VecStore {
    buf: Vec<u8>,
    limit: Option<usize>,
}

impl VecStore {
    /// An unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses to grow past `limit` total bytes.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit: Some(limit),
        }
    }

    /// Pins the limit at the current length so every later extension
    /// fails. Used by tests to simulate an exhausted backing store.
    pub fn exhaust(&mut self) {
        self.limit = Some(self.buf.len());
    }
}

impl MemStore for VecStore {
    fn extend(&mut self, bytes: usize) -> Result<usize, StoreError> {
        debug_assert!(bytes > 0, "extend must be called with a nonzero request");
        let old_len = self.buf.len();
        let limit = self.limit.unwrap_or(usize::MAX);
        let exhausted = StoreError::Exhausted {
            requested: bytes,
            limit,
        };
        let new_len = old_len
            .checked_add(bytes)
            .filter(|&n| n <= limit)
            .ok_or(exhausted)?;
        // try_reserve turns an impossible capacity or a refused allocation
        // into an error instead of aborting the process.
        self.buf.try_reserve_exact(bytes).map_err(|_| exhausted)?;
        self.buf.resize(new_len, 0);
        Ok(old_len)
    }

    fn len(&self) -> usize {
        self.buf.len()
    }

    fn bytes(&self) -> &[u8] {
        &self.buf
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}
