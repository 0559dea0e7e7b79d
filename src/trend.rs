// Comparison figures for the metric cards ("vs prior period", "vs plan").
//
// There is no historical feed behind the dataset. The default source
// fabricates prior and plan values from the current value with fixed
// multipliers, and every `Trend` it produces is flagged as synthetic so
// renderers can label it. A real feed can implement `TrendSource` later.
use crate::error::{EngineError, EngineResult};
use serde::Serialize;

pub const DEFAULT_PRIOR_FACTOR: f64 = 0.95;
pub const DEFAULT_PLAN_FACTOR: f64 = 1.10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub current: f64,
    pub prior: f64,
    pub plan: f64,
    pub mom_change_pct: f64,
    pub plan_change_pct: f64,
    pub is_synthetic: bool,
}

pub trait TrendSource {
    fn trend(&self, current: f64) -> EngineResult<Trend>;

    /// Whether the figures are fabricated rather than measured.
    fn is_synthetic(&self) -> bool {
        false
    }
}

/// Synthetic prior/plan values: `current * factor`. Not measured data.
pub fn derived_trend(current: f64, prior_factor: f64, plan_factor: f64) -> EngineResult<Trend> {
    for (name, f) in [("prior factor", prior_factor), ("plan factor", plan_factor)] {
        if !f.is_finite() || f <= 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "{} must be a positive number, got {}",
                name, f
            )));
        }
    }
    if !current.is_finite() {
        return Err(EngineError::InvalidArgument(format!(
            "current value must be finite, got {}",
            current
        )));
    }

    let prior = current * prior_factor;
    let plan = current * plan_factor;
    Ok(Trend {
        current,
        prior,
        plan,
        mom_change_pct: change_pct(current, prior),
        plan_change_pct: change_pct(current, plan),
        is_synthetic: true,
    })
}

fn change_pct(current: f64, reference: f64) -> f64 {
    // reference is only zero when current is zero (factors are positive)
    if reference == 0.0 {
        return 0.0;
    }
    (current - reference) / reference * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticTrend {
    pub prior_factor: f64,
    pub plan_factor: f64,
}

impl Default for SyntheticTrend {
    fn default() -> Self {
        Self {
            prior_factor: DEFAULT_PRIOR_FACTOR,
            plan_factor: DEFAULT_PLAN_FACTOR,
        }
    }
}

impl SyntheticTrend {
    pub fn new(prior_factor: f64, plan_factor: f64) -> Self {
        Self {
            prior_factor,
            plan_factor,
        }
    }

    /// Prior and plan equal to the current value; used for counts that are
    /// not expected to move (number of offices).
    pub fn flat() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl TrendSource for SyntheticTrend {
    fn trend(&self, current: f64) -> EngineResult<Trend> {
        derived_trend(current, self.prior_factor, self.plan_factor)
    }

    fn is_synthetic(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_factors() {
        let t = SyntheticTrend::default().trend(100.0).unwrap();
        assert!((t.prior - 95.0).abs() < 1e-9);
        assert!((t.plan - 110.0).abs() < 1e-9);
        // (100 - 95) / 95
        assert!((t.mom_change_pct - 5.263).abs() < 0.001);
        // (100 - 110) / 110
        assert!((t.plan_change_pct + 9.091).abs() < 0.001);
        assert!(t.is_synthetic);
        assert!(SyntheticTrend::default().is_synthetic());
    }

    #[test]
    fn test_flat_trend_has_no_change() {
        let t = SyntheticTrend::flat().trend(42.0).unwrap();
        assert_eq!(t.mom_change_pct, 0.0);
        assert_eq!(t.plan_change_pct, 0.0);
    }

    #[test]
    fn test_zero_current_value() {
        let t = derived_trend(0.0, 0.95, 1.1).unwrap();
        assert_eq!(t.mom_change_pct, 0.0);
        assert_eq!(t.plan_change_pct, 0.0);
    }

    #[test]
    fn test_rejects_non_positive_factor() {
        assert!(matches!(
            derived_trend(10.0, 0.0, 1.1),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            derived_trend(10.0, 0.95, f64::NAN),
            Err(EngineError::InvalidArgument(_))
        ));
    }
}
