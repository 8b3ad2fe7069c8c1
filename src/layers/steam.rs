//! Sharp-money layer: price movement as an information signal. Shortening in
//! the pick's direction with a sharp signature rewards; drifting punishes.

use crate::context::MatchContext;
use crate::domain::{LayerKey, LayerSignal};
use crate::layers::{ramp, signal, Layer, PickInput};
use crate::store::Movement;

pub struct Steam;

impl Layer for Steam {
    fn key(&self) -> LayerKey {
        LayerKey::Steam
    }

    fn evaluate(&self, pick: &PickInput, ctx: &MatchContext, weight: f64) -> LayerSignal {
        let observation = match ctx.steam_for(pick.market) {
            Some(observation) => observation,
            None => return LayerSignal::silent(self.key()),
        };
        let moved = observation.movement_pct.abs();
        let magnitude = ramp(moved, 2.0, 8.0);

        let (contribution, verdict) = match observation.direction() {
            Some(Movement::Shortening) => {
                let base = weight * (0.4 + 0.6 * magnitude);
                if observation.is_sharp_move {
                    (base, "sharp money shortening this price")
                } else {
                    (base * 0.6, "price shortening without sharp signature")
                }
            }
            Some(Movement::Drifting) => {
                let base = -weight * (0.4 + 0.6 * magnitude);
                if observation.is_sharp_move {
                    (base, "sharp money deserting this price")
                } else {
                    (base * 0.7, "price drifting")
                }
            }
            Some(Movement::Stable) => (0.0, "price stable"),
            None => (0.0, "unrecognised movement tag"),
        };

        signal(
            self.key(),
            contribution,
            format!(
                "{verdict} ({:.2} -> {:.2}, {:+.1}%)",
                observation.opening_odds, observation.current_odds, observation.movement_pct
            ),
        )
    }
}
