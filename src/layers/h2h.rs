//! Head-to-head layer, weighted by how many meetings back the record.
//! Aligned historical rates reward the pick; contradictions cost it.

use crate::context::MatchContext;
use crate::domain::{LayerKey, LayerSignal, MarketType};
use crate::layers::{ramp, signal, Layer, PickInput};

/// Meetings needed before the record carries full conviction.
const FULL_VOLUME: f64 = 6.0;

pub struct HeadToHead;

impl Layer for HeadToHead {
    fn key(&self) -> LayerKey {
        LayerKey::HeadToHead
    }

    fn evaluate(&self, pick: &PickInput, ctx: &MatchContext, weight: f64) -> LayerSignal {
        let record = match ctx.head_to_head.as_ref() {
            Some(record) if record.total_matches > 0 => record,
            _ => return LayerSignal::silent(self.key()),
        };
        let volume = (record.total_matches as f64 / FULL_VOLUME).min(1.0);
        let meetings = record.total_matches;

        match pick.market {
            MarketType::BttsYes => {
                let mut score = weight * volume * rate_alignment(record.btts_pct, 60.0, 40.0);
                if record
                    .last3_btts
                    .as_ref()
                    .is_some_and(|recent| recent.len() >= 3 && recent.iter().all(|&flag| flag))
                {
                    score += weight * 0.15;
                }
                signal(
                    self.key(),
                    score,
                    format!("btts in {:.0}% of {meetings} meetings", record.btts_pct),
                )
            }
            MarketType::BttsNo => {
                let score = weight * volume * rate_alignment(100.0 - record.btts_pct, 60.0, 40.0);
                signal(
                    self.key(),
                    score,
                    format!("btts in {:.0}% of {meetings} meetings", record.btts_pct),
                )
            }
            MarketType::Over(2) => {
                let score = weight * volume * rate_alignment(record.over25_pct, 60.0, 40.0);
                signal(
                    self.key(),
                    score,
                    format!("over 2.5 in {:.0}% of {meetings} meetings", record.over25_pct),
                )
            }
            MarketType::Under(2) => {
                let score =
                    weight * volume * rate_alignment(100.0 - record.over25_pct, 60.0, 40.0);
                signal(
                    self.key(),
                    score,
                    format!("over 2.5 in {:.0}% of {meetings} meetings", record.over25_pct),
                )
            }
            MarketType::Over(line) => {
                let needed = *line as f64 + 0.8;
                let score =
                    weight * volume * (ramp(record.avg_total_goals, needed - 0.8, needed) - 0.5);
                signal(
                    self.key(),
                    score,
                    format!("{:.1} goals on average across {meetings} meetings", record.avg_total_goals),
                )
            }
            _ => signal(self.key(), 0.0, "head-to-head carries no read for this market"),
        }
    }
}

/// +1 at or above `reward`, -1 at or below `punish`, linear between.
fn rate_alignment(rate: f64, reward: f64, punish: f64) -> f64 {
    if rate >= reward {
        ramp(rate, reward, reward + 15.0) * 0.4 + 0.6
    } else if rate <= punish {
        -(ramp(punish - rate, 0.0, 20.0) * 0.4 + 0.6)
    } else {
        (rate - (reward + punish) / 2.0) / (reward - punish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn aligned_history_rewards() {
        let ctx = testing::context_fixture();
        let market = MarketType::BttsYes;
        let pick = testing::pick_input_fixture(&market);
        let signal = HeadToHead.evaluate(&pick, &ctx, 8.0);
        assert!(signal.contribution > 0.0, "{signal:?}");
    }

    #[test]
    fn contradiction_costs() {
        let mut ctx = testing::context_fixture();
        ctx.head_to_head.as_mut().unwrap().btts_pct = 25.0;
        let market = MarketType::BttsYes;
        let pick = testing::pick_input_fixture(&market);
        let signal = HeadToHead.evaluate(&pick, &ctx, 8.0);
        assert!(signal.contribution < 0.0, "{signal:?}");
    }

    #[test]
    fn thin_record_is_discounted() {
        let mut ctx = testing::context_fixture();
        let full = {
            let market = MarketType::BttsYes;
            let pick = testing::pick_input_fixture(&market);
            HeadToHead.evaluate(&pick, &ctx, 8.0).contribution
        };
        ctx.head_to_head.as_mut().unwrap().total_matches = 2;
        let market = MarketType::BttsYes;
        let pick = testing::pick_input_fixture(&market);
        let thin = HeadToHead.evaluate(&pick, &ctx, 8.0).contribution;
        assert!(thin.abs() < full.abs());
    }

    #[test]
    fn empty_record_is_silent() {
        let mut ctx = testing::context_fixture();
        ctx.head_to_head = None;
        let market = MarketType::BttsYes;
        let pick = testing::pick_input_fixture(&market);
        assert!(!HeadToHead.evaluate(&pick, &ctx, 8.0).consulted);
    }
}
