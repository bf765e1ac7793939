use super::TextBlock;

/// Receives per-block diagnostics from the scanner and substitution engine.
///
/// All methods default to doing nothing, so implementors only override the
/// events they care about.
pub trait TagObserver {
    fn block_visited(&self, _index: usize, _block: &TextBlock) {}

    fn tag_found(&self, _raw: &str) {}

    fn tag_replaced(&self, _tag: &str, _replacement: &str) {}

    fn tag_missing(&self, _tag: &str) {}

    fn block_rewritten(&self, _before: &str, _after: &str) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TagObserver for NoopObserver {}

/// Observer that forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TagObserver for TracingObserver {
    fn block_visited(&self, index: usize, block: &TextBlock) {
        tracing::trace!(index, origin = ?block.origin, text = %block.content, "visiting block");
    }

    fn tag_found(&self, raw: &str) {
        tracing::trace!(tag = raw, "tag found");
    }

    fn tag_replaced(&self, tag: &str, replacement: &str) {
        tracing::debug!(tag, replacement, "replacing tag");
    }

    fn tag_missing(&self, tag: &str) {
        tracing::trace!(tag, "tag not present in block");
    }

    fn block_rewritten(&self, before: &str, after: &str) {
        tracing::debug!(before, after, "block rewritten");
    }
}
