//! Rolling-form layer: recent scoring, recent leakiness, momentum score and
//! squad disruptions. Works with whichever side's row is present.

use crate::context::MatchContext;
use crate::domain::{LayerKey, LayerSignal, MarketType, MatchResult, Side};
use crate::layers::{ramp, signal, Layer, PickInput};
use crate::store::TeamMomentum;

pub struct Momentum;

impl Layer for Momentum {
    fn key(&self) -> LayerKey {
        LayerKey::Momentum
    }

    fn evaluate(&self, pick: &PickInput, ctx: &MatchContext, weight: f64) -> LayerSignal {
        let home = ctx.momentum(Side::Home);
        let away = ctx.momentum(Side::Away);
        if home.is_none() && away.is_none() {
            return LayerSignal::silent(self.key());
        }

        let scored: i32 = present(home, away, |row| row.goals_scored_last_5);
        let conceded: i32 = present(home, away, |row| row.goals_conceded_last_5);
        let sides = home.iter().chain(away.iter()).count() as f64;
        // rows carry five-match totals; compare per team per match
        let matches_seen = sides * 5.0;

        let mut result = match pick.market {
            market if market.favours_goals() => {
                let firing = ramp(scored as f64 / matches_seen, 1.6, 2.4);
                let leaky = ramp(conceded as f64 / matches_seen, 1.0, 1.8);
                let score = weight * ((firing + leaky) / 2.0 - 0.25) * 1.2;
                signal(
                    self.key(),
                    score,
                    format!("last five: {scored} scored, {conceded} conceded"),
                )
            }
            market if market.is_defensive() => {
                let tight = ramp(1.3 - conceded as f64 / matches_seen, 0.0, 0.8);
                let score = weight * (tight - 0.35) * 1.1;
                signal(
                    self.key(),
                    score,
                    format!("last five concede {conceded} between them"),
                )
            }
            MarketType::Result(MatchResult::Home) | MarketType::AsianHandicap(Side::Home, _) => {
                side_form(self.key(), home, away, weight)
            }
            MarketType::Result(MatchResult::Away) | MarketType::AsianHandicap(Side::Away, _) => {
                side_form(self.key(), away, home, weight)
            }
            _ => signal(self.key(), 0.0, "momentum carries no read for this market"),
        };

        for (label, row) in [("home", home), ("away", away)] {
            if let Some(row) = row {
                if row.key_player_absent {
                    result.warnings.push(format!("{label} missing a key player"));
                }
                if row.coach_under_pressure {
                    result.warnings.push(format!("{label} coach under pressure"));
                }
            }
        }
        result
    }
}

fn present(home: Option<&TeamMomentum>, away: Option<&TeamMomentum>, f: impl Fn(&TeamMomentum) -> i32) -> i32 {
    home.map(&f).unwrap_or(0) + away.map(&f).unwrap_or(0)
}

fn side_form(
    key: LayerKey,
    backed: Option<&TeamMomentum>,
    opponent: Option<&TeamMomentum>,
    weight: f64,
) -> LayerSignal {
    match backed {
        Some(row) => {
            let form = ramp(row.momentum_score, 40.0, 80.0) - 0.4;
            let opposition_wobble = opponent
                .map(|other| ramp(45.0 - other.momentum_score, 0.0, 25.0) * 0.3)
                .unwrap_or(0.0);
            let bounce = if row.new_coach_bounce { 0.1 } else { 0.0 };
            let score = weight * (form + opposition_wobble + bounce).clamp(-1.0, 1.0);
            signal(
                key,
                score,
                format!("momentum {:.0} over five matches", row.momentum_score),
            )
        }
        None => signal(key, 0.0, "no momentum row for the backed side"),
    }
}
