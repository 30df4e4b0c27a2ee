//! Heap consistency checker.
//!
//! Debug collaborator: walks the physical block chain and the segregated
//! lists verifying the structural invariants. A violation means the heap
//! is corrupt (an out-of-bounds write, a double free, or an allocator
//! defect), which is not a recoverable condition; the checker panics with
//! a diagnostic. Production paths never run these implicitly — only
//! tests and heaps configured with `check_on_op` do.

use crate::allocator::Heap;
use crate::block::{self, DSIZE, NIL};
use crate::seglist::{SEGLIST_COUNT, class_of};
use crate::store::MemStore;

impl<S: MemStore> Heap<S> {
    /// Verifies every block from the prologue to the epilogue: prologue
    /// and epilogue shape, payload alignment, header/footer agreement,
    /// no adjacent free pair, and that every free block is reachable
    /// through its size class's list.
    ///
    /// # Panics
    ///
    /// On any invariant violation. With `verbose`, prints each block to
    /// stderr on the way.
    pub fn check_heap(&self, verbose: bool) {
        let buf = self.store.bytes();
        let pro = block::header(buf, self.prologue);
        assert!(
            pro.size() == DSIZE && pro.is_allocated(),
            "heap corruption: bad prologue header at {}",
            self.prologue
        );

        let mut bp = self.prologue;
        while block::header(buf, bp).size() > 0 {
            if verbose {
                eprintln!("{}", describe_block(buf, bp));
            }
            self.check_block(bp);
            bp = block::next_block(buf, bp);
        }

        let epi = block::header(buf, bp);
        assert!(
            epi.is_allocated(),
            "heap corruption: bad epilogue header at {bp}"
        );
        if verbose {
            eprintln!("{bp}: end of heap");
        }
    }

    fn check_block(&self, bp: usize) {
        let buf = self.store.bytes();
        assert!(
            bp % DSIZE == 0,
            "heap corruption: payload at {bp} is not double-word aligned"
        );
        let header = block::header(buf, bp);
        let footer = block::footer(buf, bp);
        assert!(
            header == footer,
            "heap corruption: header does not match footer at {bp}"
        );

        if !header.is_allocated() {
            let prev_free = !block::Tag::from_word(block::read_word(buf, bp - DSIZE)).is_allocated();
            let next_free = !block::header(buf, block::next_block(buf, bp)).is_allocated();
            assert!(
                !prev_free && !next_free,
                "heap corruption: adjacent free blocks escaped coalescing at {bp}"
            );
            let class = class_of(header.size());
            assert!(
                self.index.contains(buf, class, bp),
                "heap corruption: free block at {bp} missing from class {class}"
            );
        }
    }

    /// Verifies every segregated list: each member is marked free in both
    /// tags, sits in the class matching its size, and its `next`/`prev`
    /// links lead to structurally valid free blocks.
    ///
    /// # Panics
    ///
    /// On any invariant violation.
    pub fn check_lists(&self) {
        let buf = self.store.bytes();
        for class in 0..SEGLIST_COUNT {
            let mut bp = self.index.head(class);
            while bp != NIL {
                let header = block::header(buf, bp);
                let footer = block::footer(buf, bp);
                assert!(
                    !header.is_allocated() && !footer.is_allocated(),
                    "heap corruption: list member at {bp} not marked free"
                );
                assert!(
                    class_of(header.size()) == class,
                    "heap corruption: block of size {} at {bp} filed in class {class}",
                    header.size()
                );
                for link in [block::link_next(buf, bp), block::link_prev(buf, bp)] {
                    if link != NIL {
                        check_free_block(buf, link);
                    }
                }
                bp = block::link_next(buf, bp);
            }
        }
    }
}

/// Structural validity of a free-list link target.
fn check_free_block(buf: &[u8], bp: usize) {
    assert!(
        bp % DSIZE == 0,
        "heap corruption: link target at {bp} is not double-word aligned"
    );
    let header = block::header(buf, bp);
    assert!(
        header == block::footer(buf, bp),
        "heap corruption: link target at {bp} has mismatched tags"
    );
    assert!(
        !header.is_allocated(),
        "heap corruption: link target at {bp} not marked free"
    );
}

fn describe_block(buf: &[u8], bp: usize) -> String {
    let header = block::header(buf, bp);
    let footer = block::footer(buf, bp);
    let flag = |allocated: bool| if allocated { 'a' } else { 'f' };
    format!(
        "{bp}: header [{}:{}] footer [{}:{}]",
        header.size(),
        flag(header.is_allocated()),
        footer.size(),
        flag(footer.is_allocated()),
    )
}
