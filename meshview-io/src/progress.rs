//! Byte-level load progress

/// Bytes received so far and, when the source announces it, the total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl LoadProgress {
    pub fn new(loaded: u64, total: Option<u64>) -> Self {
        Self { loaded, total }
    }

    /// Whole percent received, truncated and never above 100. `None` when the
    /// total is unknown or zero.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total.filter(|&t| t > 0)?;
        let pct = (self.loaded as u128 * 100 / total as u128).min(100);
        Some(pct as u8)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.total, Some(t) if self.loaded >= t)
    }
}
