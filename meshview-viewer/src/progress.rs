//! Progress values for the presentation layer

use meshview_io::LoadProgress;

/// Load progress as a presentation-layer value: `-1` failed, `0..=100`
/// loading, `101` finished and the indicator should hide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressSignal {
    Failed,
    Percent(u8),
    #[default]
    Hidden,
}

impl ProgressSignal {
    pub const FAILED: i32 = -1;
    pub const HIDDEN: i32 = 101;

    pub fn value(&self) -> i32 {
        match self {
            ProgressSignal::Failed => Self::FAILED,
            ProgressSignal::Percent(p) => i32::from((*p).min(100)),
            ProgressSignal::Hidden => Self::HIDDEN,
        }
    }

    pub fn from_value(value: i32) -> Self {
        match value {
            v if v < 0 => ProgressSignal::Failed,
            v if v > 100 => ProgressSignal::Hidden,
            v => ProgressSignal::Percent(v as u8),
        }
    }

    /// Signal for a transport event; unknown totals keep `previous`
    pub fn from_progress(progress: &LoadProgress, previous: ProgressSignal) -> Self {
        match progress.percent() {
            Some(p) => ProgressSignal::Percent(p),
            None => previous,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, ProgressSignal::Percent(_))
    }
}
