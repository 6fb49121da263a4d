//! Delay precision setting.

use crate::extent::Extent;

/// Controls the spin budget at the tail of a precision delay.
///
/// The delay primitive composes ≤ 1 ms interrupt-driven sleeps with a final
/// busy-spin whose length is this option's factor times the platform minimum
/// timer period. A larger budget trades CPU for lower jitter; `Default`
/// never spins and therefore has observably greater jitter at negligible
/// CPU cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrecisionOption {
    /// No spin tail; interrupt-driven sleeps only.
    #[default]
    Default,
    /// Spin budget of 2/3 of the minimum timer period.
    Medium,
    /// Spin budget of 4/3 of the minimum timer period.
    High,
    /// Spin budget of twice the minimum timer period.
    Maximum,
}

impl PrecisionOption {
    /// Tight-loop factor applied to the platform minimum period.
    pub fn spin_factor(self) -> f64 {
        match self {
            PrecisionOption::Default => 0.0,
            PrecisionOption::Medium => 2.0 / 3.0,
            PrecisionOption::High => 4.0 / 3.0,
            PrecisionOption::Maximum => 2.0,
        }
    }

    /// Spin budget for a platform whose minimum period is `min_period_ms`.
    pub(crate) fn spin_budget(self, min_period_ms: u32) -> Extent {
        Extent::from_millis(f64::from(min_period_ms)) * self.spin_factor()
    }
}
