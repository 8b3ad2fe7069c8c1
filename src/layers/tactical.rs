//! Style-matchup layer. Prefers the tactical cell for the two playing styles
//! when its sample is large enough; falls back to the teams' direct rates.

use crate::context::MatchContext;
use crate::domain::{LayerKey, LayerSignal, MarketType, Side};
use crate::layers::{ramp, signal, Layer, PickInput};
use crate::store::CellConfidence;

const BTTS_THRESHOLD: f64 = 0.55;
const OVER_THRESHOLD: f64 = 0.58;
const CLEAN_SHEET_THRESHOLD: f64 = 0.30;

pub struct Tactical;

impl Layer for Tactical {
    fn key(&self) -> LayerKey {
        LayerKey::Tactical
    }

    fn evaluate(&self, pick: &PickInput, ctx: &MatchContext, weight: f64) -> LayerSignal {
        if let Some(cell) = ctx.tactical_cell.as_ref().filter(|cell| cell.is_reliable()) {
            let styles = format!("{}/{}", cell.style_a, cell.style_b);
            // the cell's own confidence tag shades how hard it is allowed to push
            let weight = weight
                * match cell.confidence() {
                    Some(CellConfidence::High) => 1.0,
                    Some(CellConfidence::Low) => 0.6,
                    _ => 0.85,
                };
            return match pick.market {
                MarketType::BttsYes => aligned(
                    self.key(),
                    cell.btts_prob,
                    BTTS_THRESHOLD,
                    weight,
                    format!("{styles} cell btts {:.0}%", cell.btts_prob * 100.0),
                ),
                MarketType::BttsNo => aligned(
                    self.key(),
                    1.0 - cell.btts_prob,
                    1.0 - BTTS_THRESHOLD + 0.1,
                    weight,
                    format!("{styles} cell btts {:.0}%", cell.btts_prob * 100.0),
                ),
                MarketType::Over(2) => aligned(
                    self.key(),
                    cell.over25_prob,
                    OVER_THRESHOLD,
                    weight,
                    format!("{styles} cell over {:.0}%", cell.over25_prob * 100.0),
                ),
                MarketType::Under(2) => aligned(
                    self.key(),
                    cell.under25_prob,
                    OVER_THRESHOLD,
                    weight,
                    format!("{styles} cell under {:.0}%", cell.under25_prob * 100.0),
                ),
                MarketType::Over(line) => {
                    let needed = *line as f64 + 0.9;
                    let score = weight * (ramp(cell.avg_total_goals, needed - 0.6, needed) - 0.5)
                        * 1.4;
                    signal(
                        self.key(),
                        score,
                        format!("{styles} cell averages {:.1} goals", cell.avg_total_goals),
                    )
                }
                MarketType::WinToNil(_) => aligned(
                    self.key(),
                    cell.clean_sheet_prob,
                    CLEAN_SHEET_THRESHOLD,
                    weight,
                    format!(
                        "{styles} cell clean sheet {:.0}%",
                        cell.clean_sheet_prob * 100.0
                    ),
                ),
                _ => signal(
                    self.key(),
                    0.0,
                    format!("{styles} cell carries no read for this market"),
                ),
            };
        }

        // thin or missing cell: direct team rates at reduced conviction
        match (ctx.intelligence(Side::Home), ctx.intelligence(Side::Away)) {
            (Some(home), Some(away)) => {
                let blended_btts = (home.btts(Side::Home) + away.btts(Side::Away)) / 2.0;
                let blended_over = (home.over25(Side::Home) + away.over25(Side::Away)) / 2.0;
                let half = weight * 0.5;
                match pick.market {
                    MarketType::BttsYes => aligned(
                        self.key(),
                        blended_btts,
                        BTTS_THRESHOLD,
                        half,
                        format!("direct btts rates blend to {:.0}%", blended_btts * 100.0),
                    ),
                    MarketType::Over(2) => aligned(
                        self.key(),
                        blended_over,
                        OVER_THRESHOLD,
                        half,
                        format!("direct over rates blend to {:.0}%", blended_over * 100.0),
                    ),
                    _ => signal(self.key(), 0.0, "no tactical cell; direct rates silent"),
                }
            }
            _ => LayerSignal::silent(self.key()),
        }
    }
}

/// Positive above the threshold, negative when clearly below its complement
/// band, scaled into the available weight.
fn aligned(
    key: LayerKey,
    probability: f64,
    threshold: f64,
    weight: f64,
    reason: String,
) -> LayerSignal {
    let contribution = if probability >= threshold {
        weight * (0.6 + 0.4 * ramp(probability, threshold, threshold + 0.12))
    } else if probability <= threshold - 0.10 {
        -weight * 0.6 * ramp(threshold - probability, 0.10, 0.25)
    } else {
        0.0
    };
    signal(key, contribution, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn strong_cell_backs_btts() {
        let ctx = testing::context_fixture();
        let market = MarketType::BttsYes;
        let pick = testing::pick_input_fixture(&market);
        let signal = Tactical.evaluate(&pick, &ctx, 12.0);
        assert!(signal.contribution > 0.0, "{signal:?}");
        assert!(signal.consulted);
    }

    #[test]
    fn thin_cell_falls_back_to_direct_rates() {
        let mut ctx = testing::context_fixture();
        ctx.tactical_cell.as_mut().unwrap().sample_size = 1;
        let market = MarketType::BttsYes;
        let pick = testing::pick_input_fixture(&market);
        let signal = Tactical.evaluate(&pick, &ctx, 12.0);
        assert!(signal.consulted);
        assert!(signal.contribution.abs() <= 6.0);
    }

    #[test]
    fn low_confidence_cell_pushes_less() {
        let ctx = testing::context_fixture();
        let market = MarketType::BttsYes;
        let pick = testing::pick_input_fixture(&market);
        let high = Tactical.evaluate(&pick, &ctx, 12.0);

        let mut ctx = testing::context_fixture();
        ctx.tactical_cell.as_mut().unwrap().confidence_level = "low".into();
        let low = Tactical.evaluate(&pick, &ctx, 12.0);
        assert!(low.contribution > 0.0);
        assert!(low.contribution < high.contribution);
    }

    #[test]
    fn no_data_is_silent() {
        let ctx = testing::sparse_context_fixture();
        let market = MarketType::BttsYes;
        let pick = testing::pick_input_fixture(&market);
        let signal = Tactical.evaluate(&pick, &ctx, 12.0);
        assert!(!signal.consulted);
        assert_eq!(0.0, signal.contribution);
    }
}
