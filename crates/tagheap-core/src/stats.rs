//! Heap statistics snapshots.
//!
//! Serializable so instrumentation can export them as JSON without the
//! heap growing an output dependency of its own.

use serde::Serialize;

/// Operation counters maintained incrementally by the heap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpCounters {
    /// Successful allocations.
    pub allocations: u64,
    /// Deallocations of non-null pointers.
    pub frees: u64,
    /// Reallocations satisfied at the original address.
    pub reallocs_in_place: u64,
    /// Reallocations that fell back to allocate-copy-free.
    pub reallocs_moved: u64,
    /// Successful backing-store extensions.
    pub extensions: u64,
    /// Extension attempts refused by the backing store.
    pub failed_extensions: u64,
}

/// A point-in-time view of the heap, computed by a full block walk plus
/// the maintained [`OpCounters`].
#[derive(Debug, Clone, Serialize)]
pub struct HeapStats {
    /// Total bytes obtained from the backing store.
    pub heap_bytes: usize,
    /// Allocated blocks between prologue and epilogue.
    pub live_blocks: usize,
    /// Total size of allocated blocks, tags included.
    pub live_bytes: usize,
    /// Free blocks between prologue and epilogue.
    pub free_blocks: usize,
    /// Total size of free blocks, tags included.
    pub free_bytes: usize,
    /// Size of the largest free block.
    pub largest_free_block: usize,
    /// Operation counters since heap construction.
    pub counters: OpCounters,
}
