//! Interest-rate plane: one pricing curve per market "tightness".
//!
//! Tightness `t` runs over the market's plane range. At the low end the
//! anchors sit on the max rate bound; they fall linearly toward the min bound
//! as `t` grows. The step loop never reads the plane; it backs what-if
//! pricing (`Bank::apply_rate_slice`) and the `plane` command.

use rayon::prelude::*;
use serde::Serialize;

use crate::agents::InterestRateMapping;
use crate::domain::RateRange;
use crate::error::SimError;
use crate::market::Market;
use crate::math::round_to;

/// Decimals kept in plane rate tables.
pub const PLANE_DECIMALS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaneSlice {
    pub tightness: f64,
    pub anchors: RateRange,
    #[serde(skip)]
    pub mapping: InterestRateMapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InterestRatePlane {
    pub slices: Vec<PlaneSlice>,
}

impl InterestRatePlane {
    /// Build every slice of `[plane_min, plane_max]` at `slice_step` spacing.
    ///
    /// The slice count is `round((plane_max - plane_min) / slice_step) + 1`.
    pub fn build(market: &Market, plane_min: f64, plane_max: f64, slice_step: f64) -> Result<Self, SimError> {
        let span = plane_max - plane_min;
        if !(span.is_finite() && span > 0.0 && slice_step.is_finite() && slice_step > 0.0) {
            return Err(SimError::invalid(format!(
                "invalid plane [{plane_min}, {plane_max}] with step {slice_step}"
            )));
        }
        let count = (span / slice_step).round() as usize + 1;
        let hi = market.max_interest_rate_range;
        let lo = market.min_interest_rate_range;
        let range = market.score_range;

        let slices = (0..count)
            .into_par_iter()
            .map(|i| {
                let t = plane_min + i as f64 * slice_step;
                let frac = t / span;
                let anchors = RateRange::new(
                    hi.low_score - (hi.low_score - lo.low_score) * frac,
                    hi.high_score - (hi.high_score - lo.high_score) * frac,
                );
                PlaneSlice {
                    tightness: round_to(t, 4),
                    anchors,
                    mapping: InterestRateMapping::new(range, anchors, PLANE_DECIMALS),
                }
            })
            .collect();

        Ok(Self { slices })
    }

    /// Build over the market's own plane range and step.
    pub fn for_market(market: &Market) -> Result<Self, SimError> {
        let [plane_min, plane_max] = market.plane_range;
        Self::build(market, plane_min, plane_max, market.plane_slice_step)
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// The slice whose tightness is nearest `tightness`. Ties go to the lower slice.
    pub fn slice(&self, tightness: f64) -> Option<&PlaneSlice> {
        self.slices.iter().min_by(|a, b| {
            (a.tightness - tightness)
                .abs()
                .total_cmp(&(b.tightness - tightness).abs())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Bank;
    use crate::domain::{BankParams, MarketParams};

    fn market() -> Market {
        Market::new(&MarketParams::default()).unwrap()
    }

    #[test]
    fn default_plane_has_101_slices() {
        let plane = InterestRatePlane::for_market(&market()).unwrap();
        assert_eq!(plane.len(), 101);
        assert_eq!(plane.slices[0].tightness, 0.0);
        assert_eq!(plane.slices[100].tightness, 1.0);
        assert!(plane.slices.windows(2).all(|w| w[0].tightness < w[1].tightness));
    }

    #[test]
    fn endpoints_follow_the_bounds() {
        let plane = InterestRatePlane::for_market(&market()).unwrap();
        let loose = &plane.slices[0];
        assert_eq!(loose.mapping.rate(300), 0.5);
        assert_eq!(loose.mapping.rate(850), 0.5);
        let tight = &plane.slices[100];
        assert!((tight.mapping.rate(300) - 0.001).abs() < 1e-12);
        let mid = plane.slice(0.5).unwrap();
        assert!((mid.anchors.low_score - 0.2505).abs() < 1e-12);
    }

    #[test]
    fn nearest_lookup() {
        let plane = InterestRatePlane::build(&market(), 0.0, 1.0, 0.25).unwrap();
        assert_eq!(plane.len(), 5);
        assert_eq!(plane.slice(0.3).unwrap().tightness, 0.25);
        assert_eq!(plane.slice(7.0).unwrap().tightness, 1.0);
        assert!(InterestRatePlane::default().slice(0.5).is_none());
    }

    #[test]
    fn rejects_bad_step() {
        assert!(InterestRatePlane::build(&market(), 0.0, 1.0, 0.0).is_err());
        assert!(InterestRatePlane::build(&market(), 1.0, 1.0, 0.1).is_err());
    }

    #[test]
    fn bank_adopts_slice() {
        let m = market();
        let plane = InterestRatePlane::build(&m, 0.0, 1.0, 0.5).unwrap();
        let mut bank = Bank::new(&BankParams::new("b", RateRange::new(0.15, 0.06)), m.score_range);
        let slice = plane.slice(0.5).unwrap();
        bank.apply_rate_slice(slice);
        assert_eq!(bank.interest_rate_range(), slice.anchors);
        assert_eq!(bank.score_to_rate(850), slice.mapping.rate(850));
    }
}
