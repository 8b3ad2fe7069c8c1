//! Expected-goals layer. Blends each side's xG for and against into an
//! expected match total, regresses sides that have been scoring above their
//! underlying numbers, and rewards clear alignment with the picked side of
//! the market.

use crate::context::MatchContext;
use crate::domain::{LayerKey, LayerSignal, MarketType, Side};
use crate::layers::{ramp, signal, Layer, PickInput};

/// Goals above xG across the sample before regression-to-the-mean bites.
const OVERPERFORMANCE_TOLERANCE: f64 = 0.30;

pub struct ExpectedGoals;

impl Layer for ExpectedGoals {
    fn key(&self) -> LayerKey {
        LayerKey::ExpectedGoals
    }

    fn evaluate(&self, pick: &PickInput, ctx: &MatchContext, weight: f64) -> LayerSignal {
        let (home, away) = match (ctx.intelligence(Side::Home), ctx.intelligence(Side::Away)) {
            (Some(home), Some(away)) => (home, away),
            _ => return LayerSignal::silent(self.key()),
        };

        let home_expected = (home.xg_for_per_match + away.xg_against_per_match) / 2.0;
        let away_expected = (away.xg_for_per_match + home.xg_against_per_match) / 2.0;
        let expected_total = home_expected + away_expected;

        let overperformance =
            home.overperformance_goals.max(0.0) + away.overperformance_goals.max(0.0);
        let regression = ramp(overperformance, OVERPERFORMANCE_TOLERANCE, 1.0);

        let mut result = match pick.market {
            market if market.favours_goals() => {
                let aligned = ramp(expected_total, 2.5, 3.2) - 0.5;
                let score = weight * (aligned * 1.6 - regression * 0.5).clamp(-1.0, 1.0);
                signal(
                    self.key(),
                    score,
                    format!("xg total {expected_total:.2}"),
                )
            }
            market if market.is_defensive() => {
                let aligned = ramp(2.6 - expected_total, 0.0, 0.8) - 0.3;
                let score = weight * (aligned * 1.4 + regression * 0.3).clamp(-1.0, 1.0);
                signal(
                    self.key(),
                    score,
                    format!("xg total {expected_total:.2} suits restraint"),
                )
            }
            MarketType::Result(_) | MarketType::AsianHandicap(_, _) => {
                let gap = home_expected - away_expected;
                let direction = match pick.market {
                    MarketType::Result(crate::domain::MatchResult::Home)
                    | MarketType::AsianHandicap(Side::Home, _) => gap,
                    MarketType::Result(crate::domain::MatchResult::Away)
                    | MarketType::AsianHandicap(Side::Away, _) => -gap,
                    _ => -gap.abs(), // the draw wants no gap
                };
                let score = weight * (ramp(direction, 0.15, 0.8) - ramp(-direction, 0.15, 0.8));
                signal(self.key(), score, format!("xg gap {gap:+.2}"))
            }
            _ => signal(self.key(), 0.0, "xg carries no read for this market"),
        };

        if regression > 0.0 {
            result.warnings.push(format!(
                "scoring {overperformance:.1} above xg; regression likely"
            ));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn high_xg_total_backs_goal_markets() {
        let mut ctx = testing::context_fixture();
        ctx.home_intelligence.as_mut().unwrap().xg_for_per_match = 2.1;
        ctx.away_intelligence.as_mut().unwrap().xg_for_per_match = 1.7;
        let market = MarketType::Over(2);
        let pick = testing::pick_input_fixture(&market);
        let signal = ExpectedGoals.evaluate(&pick, &ctx, 10.0);
        assert!(signal.contribution > 0.0, "{signal:?}");
    }

    #[test]
    fn overperformance_warns_and_drags() {
        let mut ctx = testing::context_fixture();
        ctx.home_intelligence.as_mut().unwrap().overperformance_goals = 0.9;
        let market = MarketType::Over(2);
        let pick = testing::pick_input_fixture(&market);
        let with_overperformance = ExpectedGoals.evaluate(&pick, &ctx, 10.0);
        assert!(!with_overperformance.warnings.is_empty());

        ctx.home_intelligence.as_mut().unwrap().overperformance_goals = 0.0;
        let without = ExpectedGoals.evaluate(&pick, &ctx, 10.0);
        assert!(without.contribution >= with_overperformance.contribution);
    }
}
