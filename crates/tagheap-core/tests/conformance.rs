//! End-to-end allocator behavior: alignment, payload isolation,
//! coalescing, in-place reallocation, exhaustion, and a deterministic
//! random workload, all swept by the consistency checker.

use tagheap_core::block::{self, DSIZE};
use tagheap_core::{Heap, HeapConfig, MemStore, VecStore};

fn heap() -> Heap<VecStore> {
    Heap::new(VecStore::new(), HeapConfig::default()).expect("bootstrap")
}

fn fill(heap: &mut Heap<VecStore>, ptr: usize, len: usize, byte: u8) {
    let buf = heap.store_mut().bytes_mut();
    buf[ptr..ptr + len].fill(byte);
}

fn assert_filled(heap: &Heap<VecStore>, ptr: usize, len: usize, byte: u8) {
    let buf = heap.store().bytes();
    assert!(
        buf[ptr..ptr + len].iter().all(|&b| b == byte),
        "payload at {ptr} (len {len}) lost its contents"
    );
}

#[test]
fn allocations_are_aligned_and_do_not_overlap() {
    let mut heap = heap();
    let sizes = [1usize, 8, 16, 24, 100, 512, 1000, 4096, 10000];
    let blocks: Vec<(usize, usize)> = sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| {
            let ptr = heap.allocate(size).expect("allocation");
            assert_eq!(ptr % DSIZE, 0, "payload for size {size} not aligned");
            fill(&mut heap, ptr, size, i as u8 + 1);
            (ptr, size)
        })
        .collect();

    for (i, &(ptr, size)) in blocks.iter().enumerate() {
        assert_filled(&heap, ptr, size, i as u8 + 1);
    }
    heap.check_heap(false);
    heap.check_lists();
}

#[test]
fn free_after_allocate_is_checker_clean_for_representative_sizes() {
    for size in [1usize, 16, 32, 512, 4096, 65536] {
        let mut heap = heap();
        let ptr = heap.allocate(size).expect("allocation");
        heap.deallocate(ptr);
        heap.check_heap(false);
        heap.check_lists();
    }
}

#[test]
fn deallocate_null_alters_nothing() {
    let mut heap = heap();
    let a = heap.allocate(64).expect("a");
    let before = heap.stats();
    heap.deallocate(block::NIL);
    let after = heap.stats();
    assert_eq!(before.free_blocks, after.free_blocks);
    assert_eq!(before.counters, after.counters);
    heap.check_heap(false);
    heap.check_lists();
    heap.deallocate(a);
}

#[test]
fn adjacent_frees_become_one_spanning_block() {
    for order in [[0usize, 1], [1, 0]] {
        let mut heap = heap();
        let a = heap.allocate(64).expect("a");
        let b = heap.allocate(64).expect("b");
        let _wall = heap.allocate(64).expect("wall");
        let sizes = {
            let buf = heap.store().bytes();
            [block::header(buf, a).size(), block::header(buf, b).size()]
        };
        let blocks = [a, b];
        for &i in &order {
            heap.deallocate(blocks[i]);
        }
        let buf = heap.store().bytes();
        let merged = block::header(buf, a);
        assert!(!merged.is_allocated(), "free order {order:?}");
        assert_eq!(
            merged.size(),
            sizes[0] + sizes[1],
            "free order {order:?}: expected one block spanning both extents"
        );
        heap.check_heap(false);
        heap.check_lists();
    }
}

#[test]
fn coalesced_block_satisfies_combined_request_without_growth() {
    let mut heap = heap();
    let a16 = heap.allocate(16).expect("16");
    let a32 = heap.allocate(32).expect("32");
    let _a512 = heap.allocate(512).expect("512");
    let _a4096 = heap.allocate(4096).expect("4096");

    heap.deallocate(a16);
    heap.deallocate(a32);

    let heap_bytes = heap.store().len();
    // Adjusted sizes of the two freed blocks were 32 and 48; a 64-byte
    // payload adjusts to exactly their combined 80 bytes.
    let reused = heap.allocate(64).expect("combined request");
    assert_eq!(reused, a16, "must be served from the coalesced block");
    assert_eq!(
        heap.store().len(),
        heap_bytes,
        "request must be satisfied without growing the heap"
    );
    heap.check_heap(false);
    heap.check_lists();
}

#[test]
fn realloc_grows_into_free_successor_without_moving() {
    let mut heap = heap();
    let a = heap.allocate(64).expect("a");
    let b = heap.allocate(64).expect("b");
    let _wall = heap.allocate(64).expect("wall");
    fill(&mut heap, a, 64, 0x3D);
    heap.deallocate(b);

    // Old block (80) plus freed successor (80) hold a 144-byte payload.
    let grown = heap.reallocate(a, 144).expect("grow");
    assert_eq!(grown, a, "in-place growth must return the original offset");
    assert_filled(&heap, a, 64, 0x3D);
    heap.check_heap(false);
    heap.check_lists();
}

#[test]
fn realloc_shrink_keeps_address_and_frees_remainder() {
    let mut heap = heap();
    let a = heap.allocate(4096).expect("a");
    fill(&mut heap, a, 64, 0x77);
    let free_before = heap.stats().free_blocks;

    let shrunk = heap.reallocate(a, 64).expect("shrink");
    assert_eq!(shrunk, a);
    assert_filled(&heap, a, 64, 0x77);
    let stats = heap.stats();
    assert_eq!(
        stats.free_blocks,
        free_before + 1,
        "shrink must surface the remainder as a free block"
    );
    heap.check_heap(false);
    heap.check_lists();
}

#[test]
fn failing_store_never_corrupts_live_blocks() {
    // Store large enough for bootstrap only: every growth attempt fails.
    let store = VecStore::with_limit(32);
    let mut bounded = Heap::new(store, HeapConfig::default()).expect("bootstrap");
    assert_eq!(bounded.allocate(1), None);
    assert_eq!(bounded.allocate(4096), None);
    bounded.check_heap(false);
    bounded.check_lists();

    // And with live data: exhaust after the first chunk.
    let mut heap = heap();
    let probe = heap.allocate(128).expect("probe");
    fill(&mut heap, probe, 128, 0xC4);
    heap.store_mut().exhaust();
    assert_eq!(heap.allocate(64 * 1024), None);
    heap.check_heap(false);
    heap.check_lists();
    assert_filled(&heap, probe, 128, 0xC4);
}

#[test]
fn huge_requests_return_null_without_panicking() {
    let mut heap = heap();
    let a = heap.allocate(64).expect("a");
    fill(&mut heap, a, 64, 0x11);
    // Block size would overflow usize.
    assert_eq!(heap.allocate(usize::MAX), None);
    // Representable block sizes, but no store can back them.
    assert_eq!(heap.allocate(usize::MAX - 64), None);
    assert_eq!(heap.allocate(usize::MAX / 2), None);
    assert_eq!(heap.reallocate(a, usize::MAX - 64), None);
    assert_filled(&heap, a, 64, 0x11);
    heap.check_heap(false);
    heap.check_lists();
}

#[test]
fn deterministic_workload_stays_consistent() {
    fn lcg(state: &mut u64) -> u64 {
        *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        *state
    }

    let mut heap = heap();
    let mut live: Vec<(usize, usize, u8)> = Vec::new();
    let mut rng = 0xA5A5_5A5A_DEAD_BEEFu64;

    for step in 0..2000 {
        let r = lcg(&mut rng);
        match r % 3 {
            0 => {
                let size = ((r >> 8) as usize % 2048).max(1);
                if let Some(ptr) = heap.allocate(size) {
                    let byte = (r >> 32) as u8 | 1;
                    fill(&mut heap, ptr, size, byte);
                    live.push((ptr, size, byte));
                }
            }
            1 if !live.is_empty() => {
                let idx = (r as usize) % live.len();
                let (ptr, size, byte) = live.swap_remove(idx);
                assert_filled(&heap, ptr, size, byte);
                heap.deallocate(ptr);
            }
            2 if !live.is_empty() => {
                let idx = (r as usize) % live.len();
                let (ptr, size, byte) = live[idx];
                let new_size = (((r >> 16) as usize) % 2048).max(1);
                let new_ptr = heap
                    .reallocate(ptr, new_size)
                    .expect("unbounded store realloc");
                let kept = size.min(new_size);
                assert_filled(&heap, new_ptr, kept, byte);
                fill(&mut heap, new_ptr, new_size, byte);
                live[idx] = (new_ptr, new_size, byte);
            }
            _ => {}
        }

        if step % 64 == 0 {
            heap.check_heap(false);
            heap.check_lists();
        }
    }

    for (ptr, size, byte) in live {
        assert_filled(&heap, ptr, size, byte);
        heap.deallocate(ptr);
    }
    heap.check_heap(false);
    heap.check_lists();
    assert_eq!(heap.stats().live_blocks, 0);
}

#[test]
fn stats_snapshot_serializes() {
    let mut heap = heap();
    let a = heap.allocate(64).expect("a");
    heap.deallocate(a);
    let value = serde_json::to_value(heap.stats()).expect("serialize");
    assert_eq!(value["counters"]["allocations"], 1);
    assert_eq!(value["counters"]["frees"], 1);
    assert_eq!(value["live_blocks"], 0);
    assert!(value["heap_bytes"].as_u64().expect("heap_bytes") > 0);
}
