//! Observer hooks for pipeline finalization.
//!
//! Diagnostics are injected explicitly instead of flowing through any
//! global logger: callers that want to watch the optimizer pass an
//! observer to [`crate::Pipeline::finalize_with`].

/// Callbacks fired while a pipeline is finalized. All methods have empty
/// default bodies; implement only what you care about.
pub trait FinalizeObserver {
    /// Every op passed validation.
    fn ops_validated(&self, _count: usize) {}

    /// An identity op was dropped. `index` is its position at the time of
    /// removal.
    fn op_removed(&self, _index: usize, _kind: &'static str) {}

    /// The op at `index` absorbed its successor.
    fn ops_fused(&self, _index: usize, _kind: &'static str) {}

    /// A non-clipping range was rewritten as a matrix.
    fn range_converted(&self, _index: usize) {}

    /// A renderer was chosen for the op at `index`.
    fn renderer_selected(&self, _index: usize, _kind: &'static str) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl FinalizeObserver for NullObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_observer_accepts_all_events() {
        let obs = NullObserver;
        obs.ops_validated(3);
        obs.op_removed(0, "matrix");
        obs.ops_fused(1, "matrix");
        obs.range_converted(2);
        obs.renderer_selected(0, "lut1d");
    }
}
