//! The blocking layer: if either side has an active trap entry for the picked
//! market, the pick is vetoed before any scoring happens. Pure and
//! idempotent; repeating the analysis yields the identical verdict.

use crate::context::MatchContext;
use crate::domain::{MarketType, Side};
use crate::store::Movement;

#[derive(Debug, Clone, PartialEq)]
pub struct TrapHit {
    pub team: String,
    pub reason: String,
    pub alternative_market: Option<String>,
}

pub fn check(market: &MarketType, ctx: &MatchContext) -> Option<TrapHit> {
    let label = market.label();
    for side in [Side::Home, Side::Away] {
        for entry in ctx.traps(side) {
            if !entry.is_active || !entry.market_type.eq_ignore_ascii_case(&label) {
                continue;
            }
            let mut reason = format!("{}: {}", entry.team_name, entry.alert_reason);
            // money leaving a trapped price is the bookmaker showing its hand
            if let Some(observation) = ctx.steam_for(market) {
                if observation.direction() == Some(Movement::Drifting) {
                    reason.push_str("; price drifting while trapped");
                }
            }
            return Some(TrapHit {
                team: entry.team_name.clone(),
                reason,
                alternative_market: entry.alternative_market.clone(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn active_entry_vetoes_the_market() {
        let mut ctx = testing::context_fixture();
        ctx.home_traps
            .push(testing::trap_fixture("arsenal", "OVER_2.5", "TRAP"));
        let hit = check(&MarketType::Over(2), &ctx).expect("trap should fire");
        assert_eq!("arsenal", hit.team);
        assert!(hit.reason.contains("arsenal"));
    }

    #[test]
    fn other_markets_pass() {
        let mut ctx = testing::context_fixture();
        ctx.home_traps
            .push(testing::trap_fixture("arsenal", "OVER_2.5", "TRAP"));
        assert_eq!(None, check(&MarketType::BttsYes, &ctx));
    }

    #[test]
    fn inactive_entries_are_ignored() {
        let mut ctx = testing::context_fixture();
        let mut entry = testing::trap_fixture("arsenal", "OVER_2.5", "TRAP");
        entry.is_active = false;
        ctx.home_traps.push(entry);
        assert_eq!(None, check(&MarketType::Over(2), &ctx));
    }

    #[test]
    fn away_side_traps_too() {
        let mut ctx = testing::context_fixture();
        ctx.away_traps
            .push(testing::trap_fixture("chelsea", "BTTS_YES", "DANGER"));
        let hit = check(&MarketType::BttsYes, &ctx).expect("trap should fire");
        assert_eq!("chelsea", hit.team);
    }

    #[test]
    fn drifting_steam_escalates_the_reason() {
        let mut ctx = testing::context_fixture();
        ctx.home_traps
            .push(testing::trap_fixture("arsenal", "OVER_2.5", "TRAP"));
        ctx.sharp_money[0].movement_direction = "drifting".into();
        let hit = check(&MarketType::Over(2), &ctx).unwrap();
        assert!(hit.reason.contains("drifting"));
    }

    #[test]
    fn verdict_is_idempotent() {
        let mut ctx = testing::context_fixture();
        ctx.home_traps
            .push(testing::trap_fixture("arsenal", "OVER_2.5", "TRAP"));
        let first = check(&MarketType::Over(2), &ctx);
        let second = check(&MarketType::Over(2), &ctx);
        assert_eq!(first, second);
    }
}
