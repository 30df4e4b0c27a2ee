//! Segregated free-list index.
//!
//! Free blocks are partitioned into a fixed set of size classes following
//! an approximately geometric progression; each class is an intrusive
//! doubly linked list threaded through the payloads of its free blocks.
//! The index itself stores only the list heads; `next`/`prev` live inside
//! the heap buffer as offset words.
//!
//! Insertion is LIFO (most recently freed first) and removal is O(1)
//! given only the block offset: the class is recomputed from the block's
//! own header size, which is why callers must remove a block *before*
//! rewriting its tags.

use crate::block::{self, NIL};

/// Number of size classes.
pub const SEGLIST_COUNT: usize = 18;

/// Upper bound of the smallest size class range.
pub const LOW_BOUND: usize = 128;

/// Maps a block size to its size class.
///
/// Halves a working copy of the size, starting from class 0, until the
/// remaining value falls to `LOW_BOUND` or the last class is reached.
/// Monotonic: a larger size never maps to a lower class.
#[must_use]
pub fn class_of(size: usize) -> usize {
    let mut remaining = size;
    for class in 0..SEGLIST_COUNT {
        if remaining <= LOW_BOUND || class == SEGLIST_COUNT - 1 {
            return class;
        }
        remaining >>= 1;
    }
    SEGLIST_COUNT - 1
}

/// The table of size-class list heads.
#[derive(Debug)]
pub struct SegIndex {
    heads: [usize; SEGLIST_COUNT],
}

impl SegIndex {
    /// An index with every class empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heads: [NIL; SEGLIST_COUNT],
        }
    }

    /// Head of the given class list, or [`NIL`] if empty.
    #[must_use]
    pub fn head(&self, class: usize) -> usize {
        self.heads[class]
    }

    /// Inserts the free block at `bp` at the head of its class list.
    ///
    /// `size` must equal the size recorded in the block's header.
    pub fn insert(&mut self, buf: &mut [u8], bp: usize, size: usize) {
        debug_assert_eq!(size, block::header(buf, bp).size());
        let class = class_of(size);
        let old_head = self.heads[class];
        block::set_link_prev(buf, bp, NIL);
        block::set_link_next(buf, bp, old_head);
        if old_head != NIL {
            block::set_link_prev(buf, old_head, bp);
        }
        self.heads[class] = bp;
    }

    /// Unlinks the free block at `bp` from its class list.
    ///
    /// The class is recomputed from the block's current header size, so
    /// this must run before the block's tags change.
    pub fn remove(&mut self, buf: &mut [u8], bp: usize) {
        let class = class_of(block::header(buf, bp).size());
        let prev = block::link_prev(buf, bp);
        let next = block::link_next(buf, bp);

        if prev == NIL {
            self.heads[class] = next;
        } else {
            block::set_link_next(buf, prev, next);
        }
        if next != NIL {
            block::set_link_prev(buf, next, prev);
        }
    }

    /// Finds the first free block with size ≥ `asize`.
    ///
    /// Scans classes in ascending order starting at `class_of(asize)`;
    /// within a class, scans front to back. First fit within a class is
    /// effectively near-best-fit across the heap because classes are
    /// size-ordered.
    #[must_use]
    pub fn first_fit(&self, buf: &[u8], asize: usize) -> Option<usize> {
        for class in class_of(asize)..SEGLIST_COUNT {
            let mut bp = self.heads[class];
            while bp != NIL {
                if block::header(buf, bp).size() >= asize {
                    return Some(bp);
                }
                bp = block::link_next(buf, bp);
            }
        }
        None
    }

    /// Whether `bp` appears in the given class list.
    #[must_use]
    pub fn contains(&self, buf: &[u8], class: usize, bp: usize) -> bool {
        let mut cur = self.heads[class];
        while cur != NIL {
            if cur == bp {
                return true;
            }
            cur = block::link_next(buf, cur);
        }
        false
    }
}

impl Default for SegIndex {
    fn default() -> Self {
        Self::new()
    }
}
