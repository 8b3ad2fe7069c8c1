//! Signal-producing evaluators. Each layer reads the prefetched context,
//! returns a contribution bounded by its configured weight and a reason
//! string, and may append warnings. Layers run in a fixed order so reasons
//! and warnings accumulate deterministically; the composer downstream is
//! order-insensitive.

use crate::config::Config;
use crate::context::MatchContext;
use crate::domain::{LayerKey, LayerSignal, MarketType};

pub mod h2h;
pub mod market_profile;
pub mod momentum;
pub mod reality;
pub mod referee;
pub mod steam;
pub mod tactical;
pub mod team_class;
pub mod xg;

/// The slice of the pick each evaluator is allowed to see.
#[derive(Debug, Clone)]
pub struct PickInput<'a> {
    pub market: &'a MarketType,
    pub model_prob: f64,
    pub quoted_price: f64,
    pub edge: f64,
    pub lambda_home: f64,
    pub lambda_away: f64,
}

impl PickInput<'_> {
    pub fn expected_total(&self) -> f64 {
        self.lambda_home + self.lambda_away
    }
}

pub trait Layer {
    fn key(&self) -> LayerKey;
    fn evaluate(&self, pick: &PickInput, ctx: &MatchContext, weight: f64) -> LayerSignal;
}

/// Runs every layer in the documented order, clamping each contribution to
/// its weight regardless of what the evaluator produced.
pub fn evaluate_all(pick: &PickInput, ctx: &MatchContext, config: &Config) -> Vec<LayerSignal> {
    let layers: [&dyn Layer; 9] = [
        &tactical::Tactical,
        &team_class::TeamClass,
        &xg::ExpectedGoals,
        &momentum::Momentum,
        &h2h::HeadToHead,
        &referee::Referee,
        &market_profile::MarketProfileLayer,
        &steam::Steam,
        &reality::RealityCheckLayer,
    ];
    layers
        .iter()
        .map(|layer| {
            let weight = config.weight(layer.key());
            let mut signal = layer.evaluate(pick, ctx, weight);
            signal.contribution = signal.contribution.clamp(-weight, weight);
            signal
        })
        .collect()
}

/// Ratio of layers whose data was actually present.
pub fn data_coverage(signals: &[LayerSignal]) -> f64 {
    if signals.is_empty() {
        return 0.0;
    }
    signals.iter().filter(|signal| signal.consulted).count() as f64 / signals.len() as f64
}

/// Linear ramp: 0 at `lo`, 1 at `hi`, clamped outside.
pub(crate) fn ramp(value: f64, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return 0.0;
    }
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

pub(crate) fn signal(
    key: LayerKey,
    contribution: f64,
    reason: impl Into<String>,
) -> LayerSignal {
    LayerSignal {
        key,
        contribution,
        reason: reason.into(),
        consulted: true,
        warnings: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchResult;
    use crate::testing;
    use assert_float_eq::*;
    use strum::IntoEnumIterator;

    #[test]
    fn ramp_behaviour() {
        assert_float_absolute_eq!(0.0, ramp(0.5, 1.0, 2.0));
        assert_float_absolute_eq!(0.5, ramp(1.5, 1.0, 2.0));
        assert_float_absolute_eq!(1.0, ramp(2.5, 1.0, 2.0));
        assert_float_absolute_eq!(0.0, ramp(1.0, 2.0, 1.0));
    }

    #[test]
    fn order_is_fixed_and_complete() {
        let ctx = testing::context_fixture();
        let config = Config::default();
        let market = MarketType::BttsYes;
        let pick = testing::pick_input_fixture(&market);
        let signals = evaluate_all(&pick, &ctx, &config);
        let keys: Vec<LayerKey> = signals.iter().map(|signal| signal.key).collect();
        assert_eq!(LayerKey::iter().collect::<Vec<_>>(), keys);
    }

    #[test]
    fn every_contribution_respects_its_weight() {
        let config = Config::default();
        let markets = [
            MarketType::BttsYes,
            MarketType::Over(2),
            MarketType::Under(2),
            MarketType::Result(MatchResult::Home),
            MarketType::WinToNil(crate::domain::Side::Home),
        ];
        for ctx in [testing::context_fixture(), testing::sparse_context_fixture()] {
            for market in &markets {
                let pick = testing::pick_input_fixture(market);
                for signal in evaluate_all(&pick, &ctx, &config) {
                    let weight = config.weight(signal.key);
                    assert!(
                        signal.contribution.abs() <= weight + 1e-12,
                        "{} contribution {} exceeds weight {} on {market:?}",
                        signal.key,
                        signal.contribution,
                        weight
                    );
                }
            }
        }
    }

    #[test]
    fn absent_data_does_not_inflate_coverage() {
        let ctx = testing::sparse_context_fixture();
        let config = Config::default();
        let market = MarketType::BttsYes;
        let pick = testing::pick_input_fixture(&market);
        let signals = evaluate_all(&pick, &ctx, &config);
        for signal in signals.iter().filter(|signal| !signal.consulted) {
            assert_float_absolute_eq!(0.0, signal.contribution);
        }
        assert!(data_coverage(&signals) <= 0.25);
    }

    #[test]
    fn coverage_of_empty_slice_is_zero() {
        assert_float_absolute_eq!(0.0, data_coverage(&[]));
    }
}
