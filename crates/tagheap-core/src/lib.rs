//! # tagheap-core
//!
//! A segregated-fit, boundary-tag dynamic memory allocator over a single
//! grow-only backing region. The heap is modeled entirely in safe Rust:
//! blocks are spans of an owned byte buffer addressed by offset, boundary
//! tags are little-endian words read and written through bounds-checked
//! accessors, and free-list linkage is stored as offset pairs overlaid on
//! free block payloads. No `unsafe` code is permitted at the crate level.
//!
//! The backing region is an injected capability ([`store::MemStore`]), so
//! tests can substitute a bounded or always-failing store without touching
//! real process memory.

#![deny(unsafe_code)]

pub mod allocator;
pub mod block;
pub mod seglist;
pub mod stats;
pub mod store;
pub mod trace;

mod check;

pub use allocator::{Heap, HeapConfig, HeapError, Tuning};
pub use stats::{HeapStats, OpCounters};
pub use store::{MemStore, StoreError, VecStore};
pub use trace::TraceEvent;
