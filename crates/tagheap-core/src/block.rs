//! Boundary-tag block model.
//!
//! Every block carries a header word immediately before its payload and a
//! footer word at its end, both packing `(size, allocated-bit)` into one
//! `u64`. The footer duplicates the header so the previous physical block
//! can be reached in O(1) during coalescing. While a block is free, the
//! first two payload words are overlaid with `next`/`prev` offsets forming
//! one node of a segregated free list; that linkage is meaningless once
//! the block is allocated and must not be read.
//!
//! Blocks are addressed by the offset of their payload (`bp`) into the
//! backing buffer, never by pointer. All word access goes through
//! bounds-checked slice indexing.

/// Word and header/footer size in bytes.
pub const WSIZE: usize = 8;

/// Double-word size in bytes. Block sizes and payload offsets are
/// multiples of this, so payloads are 16-aligned.
pub const DSIZE: usize = 2 * WSIZE;

/// Minimum block size: header + footer + two free-list link words.
pub const MIN_BLOCK: usize = 2 * DSIZE;

/// Null offset. The heap's alignment padding and prologue guarantee no
/// payload ever sits at offset 0, so 0 is free to mean "none".
pub const NIL: usize = 0;

/// A boundary tag: block size and allocated flag packed into one word.
///
/// The size is a multiple of [`DSIZE`], so its low four bits are zero;
/// bit 0 carries the allocated flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag(u64);

impl Tag {
    /// Packs a size and allocated flag into a tag word.
    #[must_use]
    pub fn new(size: usize, allocated: bool) -> Self {
        debug_assert_eq!(size % DSIZE, 0, "tag size must be double-word aligned");
        Self(size as u64 | u64::from(allocated))
    }

    /// Reinterprets a raw word as a tag.
    #[must_use]
    pub fn from_word(word: u64) -> Self {
        Self(word)
    }

    /// The raw tag word.
    #[must_use]
    pub fn word(self) -> u64 {
        self.0
    }

    /// The block size encoded in this tag.
    #[must_use]
    pub fn size(self) -> usize {
        (self.0 & !(DSIZE as u64 - 1)) as usize
    }

    /// Whether the allocated bit is set.
    #[must_use]
    pub fn is_allocated(self) -> bool {
        self.0 & 1 == 1
    }
}

/// Rounds `n` up to the next multiple of [`DSIZE`], or `None` when the
/// rounded value does not fit in `usize`.
#[must_use]
pub fn align_up(n: usize) -> Option<usize> {
    Some(n.checked_add(DSIZE - 1)? & !(DSIZE - 1))
}

/// Computes the adjusted block size for a payload request: the payload
/// rounded up to alignment granularity plus header/footer overhead, never
/// below the minimum block size. `None` when the block size would not fit
/// in `usize`; such a request can never be satisfied.
#[must_use]
pub fn adjust_request(size: usize) -> Option<usize> {
    if size <= DSIZE {
        Some(MIN_BLOCK)
    } else {
        align_up(size)?.checked_add(DSIZE)
    }
}

/// Reads the little-endian word at `off`.
#[must_use]
pub fn read_word(buf: &[u8], off: usize) -> u64 {
    let mut word = [0u8; WSIZE];
    word.copy_from_slice(&buf[off..off + WSIZE]);
    u64::from_le_bytes(word)
}

/// Writes a little-endian word at `off`.
pub fn write_word(buf: &mut [u8], off: usize, word: u64) {
    buf[off..off + WSIZE].copy_from_slice(&word.to_le_bytes());
}

/// The header tag of the block with payload offset `bp`.
#[must_use]
pub fn header(buf: &[u8], bp: usize) -> Tag {
    Tag::from_word(read_word(buf, bp - WSIZE))
}

/// The footer tag of the block with payload offset `bp`.
#[must_use]
pub fn footer(buf: &[u8], bp: usize) -> Tag {
    let size = header(buf, bp).size();
    Tag::from_word(read_word(buf, bp + size - DSIZE))
}

/// Writes matching header and footer tags for the block at `bp`.
pub fn write_tags(buf: &mut [u8], bp: usize, size: usize, allocated: bool) {
    let tag = Tag::new(size, allocated).word();
    write_word(buf, bp - WSIZE, tag);
    write_word(buf, bp + size - DSIZE, tag);
}

/// Payload offset of the next physical block.
#[must_use]
pub fn next_block(buf: &[u8], bp: usize) -> usize {
    bp + header(buf, bp).size()
}

/// Payload offset of the previous physical block, reached through the
/// footer word sitting just before this block's header.
#[must_use]
pub fn prev_block(buf: &[u8], bp: usize) -> usize {
    bp - Tag::from_word(read_word(buf, bp - DSIZE)).size()
}

/// The `next` free-list link of the free block at `bp`.
#[must_use]
pub fn link_next(buf: &[u8], bp: usize) -> usize {
    read_word(buf, bp) as usize
}

/// The `prev` free-list link of the free block at `bp`.
#[must_use]
pub fn link_prev(buf: &[u8], bp: usize) -> usize {
    read_word(buf, bp + WSIZE) as usize
}

/// Sets the `next` free-list link of the free block at `bp`.
pub fn set_link_next(buf: &mut [u8], bp: usize, to: usize) {
    write_word(buf, bp, to as u64);
}

/// Sets the `prev` free-list link of the free block at `bp`.
pub fn set_link_prev(buf: &mut [u8], bp: usize, to: usize) {
    write_word(buf, bp + WSIZE, to as u64);
}
