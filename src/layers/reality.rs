//! Convergence layer: a pre-computed agreement signal between external
//! heuristics for the match. Weight stays low to avoid double counting with
//! the tactical and xg layers, which see much of the same data.

use crate::context::MatchContext;
use crate::domain::{LayerKey, LayerSignal};
use crate::layers::{ramp, signal, Layer, PickInput};

pub struct RealityCheckLayer;

impl Layer for RealityCheckLayer {
    fn key(&self) -> LayerKey {
        LayerKey::RealityCheck
    }

    fn evaluate(&self, _pick: &PickInput, ctx: &MatchContext, weight: f64) -> LayerSignal {
        let row = match ctx.reality.as_ref() {
            Some(row) => row,
            None => return LayerSignal::silent(self.key()),
        };
        let strength = ramp(row.reality_score, 40.0, 90.0);
        let (contribution, verdict) = if row.converged() {
            (weight * (0.4 + 0.6 * strength), "external heuristics converge")
        } else if row.diverged() {
            (-weight * (0.4 + 0.6 * (1.0 - strength)), "external heuristics diverge")
        } else {
            (0.0, "external heuristics are mixed")
        };
        signal(
            self.key(),
            contribution,
            format!("{verdict} (score {:.0})", row.reality_score),
        )
    }
}
