//! Structured operation trace.
//!
//! When enabled through [`crate::HeapConfig`], every public heap
//! operation appends one record here instead of printing. Callers drain
//! the buffer when they want it; nothing is emitted implicitly.

/// One traced heap operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Monotonic event id.
    pub seq: u64,
    /// Operation symbol (`allocate`, `deallocate`, `reallocate`).
    pub op: &'static str,
    /// Payload offset involved, if any.
    pub ptr: Option<usize>,
    /// Request size involved, if any.
    pub size: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
}

#[derive(Debug)]
pub(crate) struct TraceLog {
    enabled: bool,
    next_seq: u64,
    events: Vec<TraceEvent>,
}

impl TraceLog {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            next_seq: 0,
            events: Vec::new(),
        }
    }

    pub(crate) fn record(
        &mut self,
        op: &'static str,
        ptr: Option<usize>,
        size: Option<usize>,
        outcome: &'static str,
    ) {
        if !self.enabled {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(TraceEvent {
            seq,
            op,
            ptr,
            size,
            outcome,
        });
    }

    pub(crate) fn drain(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.events)
    }
}
