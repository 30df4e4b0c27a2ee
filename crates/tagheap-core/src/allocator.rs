//! Allocator core: init, allocate, deallocate, reallocate.
//!
//! The heap is bounded by a prologue block (allocated, minimal size) and
//! a zero-size allocated epilogue header. It grows only by appending
//! through the backing store; memory is never returned. Free blocks are
//! indexed by the segregated list and physically adjacent free blocks are
//! merged immediately, so invariant 3 (no free-free neighbors) holds
//! between public calls.
//!
//! Not reentrant and not thread safe; callers sharing a heap across
//! threads must serialize access externally.

use thiserror::Error;

use crate::block::{self, DSIZE, MIN_BLOCK, NIL, Tag, WSIZE, align_up};
use crate::seglist::SegIndex;
use crate::stats::{HeapStats, OpCounters};
use crate::store::{MemStore, StoreError};
use crate::trace::{TraceEvent, TraceLog};

/// Default backing-store growth granularity in bytes.
pub const CHUNK_SIZE: usize = 4096;

/// Optional fragmentation tuning.
///
/// Workload-specific heuristic, not part of the allocation contract:
/// requests whose size is a nonzero multiple of `multiple` (and not
/// `multiple` itself) get `slack` extra bytes of adjusted size, leaving
/// room for the common grow-a-bit reallocation pattern to stay in place.
/// Every invariant holds with tuning on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    /// Request sizes that are multiples of this get padded.
    pub multiple: usize,
    /// Extra bytes of slack applied to padded requests.
    pub slack: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            multiple: 128,
            slack: 128,
        }
    }
}

/// Constructor-time heap configuration.
///
/// Replaces global debug flags: tracing and self-checking are properties
/// of the heap instance, never module state.
#[derive(Debug, Clone, Default)]
pub struct HeapConfig {
    /// Backing-store growth granularity; 0 falls back to [`CHUNK_SIZE`].
    pub chunk_size: usize,
    /// Record a [`TraceEvent`] per public operation.
    pub trace: bool,
    /// Run the full consistency checker at every public-call boundary.
    /// Debug aid only; violations panic.
    pub check_on_op: bool,
    /// Optional fragmentation tuning.
    pub tuning: Option<Tuning>,
}

/// Heap construction failure.
#[derive(Debug, Error)]
pub enum HeapError {
    /// The backing store could not supply the initial prologue/epilogue
    /// region.
    #[error("heap bootstrap failed: {0}")]
    Bootstrap(#[from] StoreError),
}

/// A segregated-fit, boundary-tag heap over a grow-only backing store.
///
/// All public pointers are payload offsets into the store's region;
/// [`NIL`] (0) plays the role of the null pointer. `allocate` and
/// `reallocate` communicate exhaustion through `None`, never panics.
pub struct Heap<S: MemStore> {
    pub(crate) store: S,
    pub(crate) index: SegIndex,
    /// Prologue payload offset; heap walks start here.
    pub(crate) prologue: usize,
    config: HeapConfig,
    counters: OpCounters,
    trace: TraceLog,
}

impl<S: MemStore> Heap<S> {
    /// Initializes an empty heap on `store`: one alignment padding word,
    /// the prologue header/footer, and the epilogue header.
    pub fn new(mut store: S, config: HeapConfig) -> Result<Self, HeapError> {
        let base = store.extend(4 * WSIZE)?;
        let prologue = base + 2 * WSIZE;
        let buf = store.bytes_mut();
        block::write_word(buf, base, 0);
        block::write_tags(buf, prologue, DSIZE, true);
        block::write_word(buf, base + 3 * WSIZE, Tag::new(0, true).word());

        let trace = TraceLog::new(config.trace);
        Ok(Self {
            store,
            index: SegIndex::new(),
            prologue,
            config,
            counters: OpCounters::default(),
            trace,
        })
    }

    /// Allocates a block with at least `size` payload bytes.
    ///
    /// Returns the payload offset, double-word aligned, or `None` when
    /// the backing store is exhausted. A zero-size request is a defined
    /// no-op returning `None`.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        self.check_boundary();
        if size == 0 {
            self.trace.record("allocate", None, Some(0), "noop");
            return None;
        }

        let Some(asize) = self.adjusted_size(size) else {
            // The block size would not fit in usize; no store can help.
            self.trace.record("allocate", None, Some(size), "oom");
            return None;
        };
        if let Some(bp) = self.index.first_fit(self.store.bytes(), asize) {
            let ptr = self.place(bp, asize);
            self.counters.allocations += 1;
            self.trace.record("allocate", Some(ptr), Some(size), "fit");
            return Some(ptr);
        }

        // No fit anywhere; grow the heap and place into the new block.
        let chunk = match self.config.chunk_size {
            0 => CHUNK_SIZE,
            n => n,
        };
        let Some(grow) = align_up(asize.max(chunk)) else {
            self.counters.failed_extensions += 1;
            self.trace.record("allocate", None, Some(size), "oom");
            return None;
        };
        let bp = match self.extend_heap(grow) {
            Ok(bp) => bp,
            Err(_) => {
                self.counters.failed_extensions += 1;
                self.trace.record("allocate", None, Some(size), "oom");
                return None;
            }
        };
        let ptr = self.place(bp, asize);
        self.counters.allocations += 1;
        self.trace
            .record("allocate", Some(ptr), Some(size), "extended");
        Some(ptr)
    }

    /// Frees the block at `ptr`. [`NIL`] is a defined no-op.
    pub fn deallocate(&mut self, ptr: usize) {
        self.check_boundary();
        if ptr == NIL {
            self.trace.record("deallocate", None, None, "noop");
            return;
        }

        let size = block::header(self.store.bytes(), ptr).size();
        let buf = self.store.bytes_mut();
        block::write_tags(buf, ptr, size, false);
        self.index.insert(buf, ptr, size);
        self.coalesce(ptr);
        self.counters.frees += 1;
        self.trace.record("deallocate", Some(ptr), None, "freed");
    }

    /// Resizes the block at `ptr` to at least `size` payload bytes.
    ///
    /// `NIL` behaves as `allocate(size)`; `size == 0` behaves as
    /// `deallocate(ptr)` and returns `None`. Shrinking and growing into a
    /// free successor happen in place; otherwise the contents move to a
    /// fresh block. If the fallback allocation fails the original block
    /// is left untouched and `None` is returned.
    pub fn reallocate(&mut self, ptr: usize, size: usize) -> Option<usize> {
        if ptr == NIL {
            return self.allocate(size);
        }
        if size == 0 {
            self.deallocate(ptr);
            return None;
        }
        self.check_boundary();

        let Some(asize) = block::adjust_request(size) else {
            // Unsatisfiable request; the original block is untouched.
            self.trace.record("reallocate", Some(ptr), Some(size), "oom");
            return None;
        };
        let old_size = block::header(self.store.bytes(), ptr).size();

        if asize == old_size {
            self.counters.reallocs_in_place += 1;
            self.trace
                .record("reallocate", Some(ptr), Some(size), "unchanged");
            return Some(ptr);
        }

        if asize < old_size {
            // Shrink: carve off the tail when it can stand alone as a
            // free block, otherwise leave the block oversized.
            let remainder = old_size - asize;
            if remainder >= MIN_BLOCK {
                let buf = self.store.bytes_mut();
                block::write_tags(buf, ptr, asize, true);
                let rest = ptr + asize;
                block::write_tags(buf, rest, remainder, false);
                self.index.insert(buf, rest, remainder);
                self.coalesce(rest);
            }
            self.counters.reallocs_in_place += 1;
            self.trace
                .record("reallocate", Some(ptr), Some(size), "shrunk");
            return Some(ptr);
        }

        // Grow: absorb a free successor when the combined span suffices.
        let next_bp = ptr + old_size;
        let next = block::header(self.store.bytes(), next_bp);
        if !next.is_allocated() {
            let combined = old_size + next.size();
            if combined >= asize + MIN_BLOCK {
                // Enough surplus to re-split a free remainder.
                let buf = self.store.bytes_mut();
                self.index.remove(buf, next_bp);
                block::write_tags(buf, ptr, asize, true);
                let rest = ptr + asize;
                block::write_tags(buf, rest, combined - asize, false);
                self.index.insert(buf, rest, combined - asize);
                self.coalesce(rest);
                self.counters.reallocs_in_place += 1;
                self.trace
                    .record("reallocate", Some(ptr), Some(size), "absorbed");
                return Some(ptr);
            }
            if combined >= asize {
                let buf = self.store.bytes_mut();
                self.index.remove(buf, next_bp);
                block::write_tags(buf, ptr, combined, true);
                self.counters.reallocs_in_place += 1;
                self.trace
                    .record("reallocate", Some(ptr), Some(size), "absorbed");
                return Some(ptr);
            }
        }

        // Move: allocate, copy, free. On allocation failure the original
        // block is untouched.
        let new_ptr = self.allocate(size)?;
        let copy_len = (old_size - DSIZE).min(size);
        let buf = self.store.bytes_mut();
        buf.copy_within(ptr..ptr + copy_len, new_ptr);
        self.deallocate(ptr);
        self.counters.reallocs_moved += 1;
        self.trace
            .record("reallocate", Some(new_ptr), Some(size), "moved");
        Some(new_ptr)
    }

    /// A point-in-time statistics snapshot (full block walk).
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let buf = self.store.bytes();
        let mut stats = HeapStats {
            heap_bytes: self.store.len(),
            live_blocks: 0,
            live_bytes: 0,
            free_blocks: 0,
            free_bytes: 0,
            largest_free_block: 0,
            counters: self.counters.clone(),
        };
        let mut bp = block::next_block(buf, self.prologue);
        loop {
            let tag = block::header(buf, bp);
            if tag.size() == 0 {
                break;
            }
            if tag.is_allocated() {
                stats.live_blocks += 1;
                stats.live_bytes += tag.size();
            } else {
                stats.free_blocks += 1;
                stats.free_bytes += tag.size();
                stats.largest_free_block = stats.largest_free_block.max(tag.size());
            }
            bp = block::next_block(buf, bp);
        }
        stats
    }

    /// Hands out the trace events recorded so far, emptying the buffer.
    pub fn drain_trace(&mut self) -> Vec<TraceEvent> {
        self.trace.drain()
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the backing store, for tests and
    /// instrumentation. Writes into live payloads are the caller's
    /// business; writes into block tags are heap corruption, which the
    /// checker exists to catch.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Adjusted block size for a request, tuning applied. `None` when the
    /// block size would not fit in `usize`.
    fn adjusted_size(&self, size: usize) -> Option<usize> {
        if let Some(t) = self.config.tuning {
            if t.multiple != 0 && size % t.multiple == 0 && size != t.multiple {
                return block::adjust_request(size.checked_add(t.slack)?);
            }
        }
        block::adjust_request(size)
    }

    /// Appends `bytes` (a [`DSIZE`] multiple) to the heap as one free
    /// block, rebuilds the epilogue behind it, and coalesces with the
    /// preceding block. Returns the resulting free block.
    fn extend_heap(&mut self, bytes: usize) -> Result<usize, StoreError> {
        let old_len = self.store.extend(bytes)?;
        // The new block's header lands where the old epilogue header was.
        let bp = old_len;
        let buf = self.store.bytes_mut();
        block::write_tags(buf, bp, bytes, false);
        block::write_word(buf, bp + bytes - WSIZE, Tag::new(0, true).word());
        self.index.insert(buf, bp, bytes);
        self.counters.extensions += 1;
        Ok(self.coalesce(bp))
    }

    /// Carves `asize` bytes out of the free block at `bp`, splitting when
    /// the remainder can stand alone as a free block. Returns the payload
    /// offset of the allocated block.
    fn place(&mut self, bp: usize, asize: usize) -> usize {
        let csize = block::header(self.store.bytes(), bp).size();
        let buf = self.store.bytes_mut();
        self.index.remove(buf, bp);
        if csize - asize >= MIN_BLOCK {
            block::write_tags(buf, bp, asize, true);
            let rest = bp + asize;
            block::write_tags(buf, rest, csize - asize, false);
            self.index.insert(buf, rest, csize - asize);
        } else {
            block::write_tags(buf, bp, csize, true);
        }
        bp
    }

    /// Merges the free block at `bp` with free physical neighbors.
    ///
    /// Each of the four neighbor-state cases removes every affected node
    /// from its list before rewriting tags and reinserts the merged block
    /// once, at its final size: class membership is recomputed from the
    /// header at removal time, so removal must precede the rewrite.
    fn coalesce(&mut self, bp: usize) -> usize {
        let (prev_free, next_free, size, prev_size, next_size, next_bp) = {
            let buf = self.store.bytes();
            let size = block::header(buf, bp).size();
            let next_bp = bp + size;
            let prev_footer = Tag::from_word(block::read_word(buf, bp - DSIZE));
            let next_header = block::header(buf, next_bp);
            (
                !prev_footer.is_allocated(),
                !next_header.is_allocated(),
                size,
                prev_footer.size(),
                next_header.size(),
                next_bp,
            )
        };

        match (prev_free, next_free) {
            (false, false) => bp,
            (false, true) => {
                let merged = size + next_size;
                let buf = self.store.bytes_mut();
                self.index.remove(buf, bp);
                self.index.remove(buf, next_bp);
                block::write_tags(buf, bp, merged, false);
                self.index.insert(buf, bp, merged);
                bp
            }
            (true, false) => {
                let prev_bp = bp - prev_size;
                let merged = size + prev_size;
                let buf = self.store.bytes_mut();
                self.index.remove(buf, bp);
                self.index.remove(buf, prev_bp);
                block::write_tags(buf, prev_bp, merged, false);
                self.index.insert(buf, prev_bp, merged);
                prev_bp
            }
            (true, true) => {
                let prev_bp = bp - prev_size;
                let merged = size + prev_size + next_size;
                let buf = self.store.bytes_mut();
                self.index.remove(buf, bp);
                self.index.remove(buf, next_bp);
                self.index.remove(buf, prev_bp);
                block::write_tags(buf, prev_bp, merged, false);
                self.index.insert(buf, prev_bp, merged);
                prev_bp
            }
        }
    }

    fn check_boundary(&self) {
        if self.config.check_on_op {
            self.check_heap(false);
            self.check_lists();
        }
    }
}
