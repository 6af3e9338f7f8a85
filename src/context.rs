//! Handles shared by every synchronizer in a run.

/// Whether a synchronizer rebuilds its table or applies changes since the
/// stored watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Incremental,
}

impl SyncMode {
    pub fn is_full(self) -> bool {
        self == SyncMode::Full
    }
}

/// Explicit source, mirror and watermark handles for one run.
pub struct SyncContext<'a, S, M, W> {
    pub source: &'a S,
    pub mirror: &'a M,
    pub watermarks: &'a W,
}

impl<'a, S, M, W> SyncContext<'a, S, M, W> {
    pub fn new(source: &'a S, mirror: &'a M, watermarks: &'a W) -> Self {
        Self {
            source,
            mirror,
            watermarks,
        }
    }
}
