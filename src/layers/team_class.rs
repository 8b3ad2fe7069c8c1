//! Class layer: power gap, combined attacking quality and combined defensive
//! frailty. Lopsided attack against weak defence feeds goal markets; close
//! tiers feed both-teams-to-score.

use crate::context::MatchContext;
use crate::domain::{LayerKey, LayerSignal, MarketType, MatchResult, Side};
use crate::layers::{ramp, signal, Layer, PickInput};

pub struct TeamClass;

impl Layer for TeamClass {
    fn key(&self) -> LayerKey {
        LayerKey::TeamClass
    }

    fn evaluate(&self, pick: &PickInput, ctx: &MatchContext, weight: f64) -> LayerSignal {
        let (home, away) = match (ctx.class(Side::Home), ctx.class(Side::Away)) {
            (Some(home), Some(away)) => (home, away),
            _ => return LayerSignal::silent(self.key()),
        };

        let power_diff = home.power_index - away.power_index;
        let attack_avg = (home.attack_rating + away.attack_rating) / 2.0;
        let defence_avg = (home.defense_rating + away.defense_rating) / 2.0;
        let tiers_close = match (home.tier(), away.tier()) {
            (Some(home_tier), Some(away_tier)) => {
                home_tier.rank().abs_diff(away_tier.rank()) <= 1
            }
            _ => false,
        };

        match pick.market {
            MarketType::Over(_) | MarketType::FivePlusGoals => {
                let firepower = ramp(attack_avg, 60.0, 80.0);
                let frailty = ramp(65.0 - defence_avg, 0.0, 20.0);
                let score = weight * (firepower * frailty * 1.4 - 0.2).clamp(-0.6, 1.0);
                signal(
                    self.key(),
                    score,
                    format!(
                        "attack {attack_avg:.0} against defence {defence_avg:.0}"
                    ),
                )
            }
            MarketType::Under(_) => {
                let solidity = ramp(defence_avg, 60.0, 80.0);
                let blunt = ramp(65.0 - attack_avg, 0.0, 20.0);
                let score = weight * (solidity * blunt * 1.2 - 0.15).clamp(-0.6, 1.0);
                signal(
                    self.key(),
                    score,
                    format!("defence {defence_avg:.0} against attack {attack_avg:.0}"),
                )
            }
            MarketType::BttsYes => {
                let firepower = ramp(attack_avg, 58.0, 75.0);
                let score = if tiers_close {
                    weight * (0.3 + 0.7 * firepower)
                } else {
                    weight * (firepower - 0.4) * 0.5
                };
                signal(
                    self.key(),
                    score,
                    if tiers_close {
                        format!("close tiers with attack {attack_avg:.0}")
                    } else {
                        format!("tier gap tempers btts; attack {attack_avg:.0}")
                    },
                )
            }
            MarketType::Result(MatchResult::Home)
            | MarketType::WinToNil(Side::Home)
            | MarketType::AsianHandicap(Side::Home, _) => {
                let score = weight * symmetric_ramp(power_diff, 8.0, 30.0);
                signal(self.key(), score, format!("power gap {power_diff:+.0}"))
            }
            MarketType::Result(MatchResult::Away)
            | MarketType::WinToNil(Side::Away)
            | MarketType::AsianHandicap(Side::Away, _) => {
                let score = weight * symmetric_ramp(-power_diff, 8.0, 30.0);
                signal(self.key(), score, format!("power gap {power_diff:+.0}"))
            }
            MarketType::Result(MatchResult::Draw) => {
                let score = weight * (0.6 - ramp(power_diff.abs(), 5.0, 25.0)) * 0.8;
                signal(
                    self.key(),
                    score,
                    format!("power gap {:.0} for the draw", power_diff.abs()),
                )
            }
            _ => signal(self.key(), 0.0, "class carries no read for this market"),
        }
    }
}

/// Positive ramp above +lo, mirrored negative below -lo.
fn symmetric_ramp(value: f64, lo: f64, hi: f64) -> f64 {
    if value >= 0.0 {
        ramp(value, lo, hi)
    } else {
        -ramp(-value, lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn power_gap_backs_the_stronger_side() {
        let mut ctx = testing::context_fixture();
        ctx.home_class.as_mut().unwrap().power_index = 85.0;
        ctx.away_class.as_mut().unwrap().power_index = 55.0;
        let home_win = MarketType::Result(MatchResult::Home);
        let pick = testing::pick_input_fixture(&home_win);
        let for_home = TeamClass.evaluate(&pick, &ctx, 10.0);
        assert!(for_home.contribution > 0.0);

        let away_win = MarketType::Result(MatchResult::Away);
        let pick = testing::pick_input_fixture(&away_win);
        let for_away = TeamClass.evaluate(&pick, &ctx, 10.0);
        assert!(for_away.contribution < 0.0);
    }

    #[test]
    fn missing_class_is_silent() {
        let ctx = testing::sparse_context_fixture();
        let market = MarketType::Over(2);
        let pick = testing::pick_input_fixture(&market);
        let signal = TeamClass.evaluate(&pick, &ctx, 10.0);
        assert!(!signal.consulted);
    }
}
