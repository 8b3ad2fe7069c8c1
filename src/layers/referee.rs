//! Referee layer: goals-per-game average, over/under tendency tag, and a
//! home-bias factor that feeds home-favoured markets. The prefetcher already
//! substituted a league-average profile when the individual record was
//! missing.

use crate::context::MatchContext;
use crate::domain::{DoubleChance, LayerKey, LayerSignal, MarketType, MatchResult, Side};
use crate::layers::{ramp, signal, Layer, PickInput};

const HOME_BIAS_THRESHOLD: f64 = 1.08;

pub struct Referee;

impl Layer for Referee {
    fn key(&self) -> LayerKey {
        LayerKey::Referee
    }

    fn evaluate(&self, pick: &PickInput, ctx: &MatchContext, weight: f64) -> LayerSignal {
        let profile = match ctx.referee_profile.as_ref() {
            Some(profile) => profile,
            None => return LayerSignal::silent(self.key()),
        };
        let who = &profile.referee_name;
        let avg = profile.avg_goals_per_game;

        match pick.market {
            market if market.favours_goals() => {
                let mut score = weight * (ramp(avg, 2.4, 3.1) - 0.4);
                if profile.favours_overs() {
                    score += weight * 0.2;
                } else if profile.favours_unders() {
                    score -= weight * 0.2;
                }
                signal(
                    self.key(),
                    score,
                    format!("{who} averages {avg:.1} goals"),
                )
            }
            market if market.is_defensive() => {
                let mut score = weight * (ramp(2.9 - avg, 0.0, 0.7) - 0.4);
                if profile.favours_unders() {
                    score += weight * 0.2;
                } else if profile.favours_overs() {
                    score -= weight * 0.2;
                }
                signal(
                    self.key(),
                    score,
                    format!("{who} averages {avg:.1} goals"),
                )
            }
            MarketType::Result(MatchResult::Home)
            | MarketType::Result(MatchResult::Draw)
            | MarketType::DoubleChance(DoubleChance::HomeOrDraw)
            | MarketType::AsianHandicap(Side::Home, _)
            | MarketType::HalfTimeResult(MatchResult::Home) => {
                let score = if profile.home_bias_factor >= HOME_BIAS_THRESHOLD {
                    weight * 0.5 * ramp(profile.home_bias_factor, HOME_BIAS_THRESHOLD, 1.30)
                        + weight * 0.2
                } else {
                    0.0
                };
                signal(
                    self.key(),
                    score,
                    format!("{who} home bias {:.2}", profile.home_bias_factor),
                )
            }
            _ => signal(self.key(), 0.0, format!("{who} carries no read for this market")),
        }
    }
}
