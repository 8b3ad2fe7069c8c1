//! Team market-profile layer: rewards a pick on a team's historically best
//! market and penalises anything on its avoid list.

use crate::context::MatchContext;
use crate::domain::{LayerKey, LayerSignal, Side};
use crate::layers::{signal, Layer, PickInput};
use crate::store::MarketProfile;

pub struct MarketProfileLayer;

impl Layer for MarketProfileLayer {
    fn key(&self) -> LayerKey {
        LayerKey::MarketProfile
    }

    fn evaluate(&self, pick: &PickInput, ctx: &MatchContext, weight: f64) -> LayerSignal {
        let home = ctx.market_profile(Side::Home);
        let away = ctx.market_profile(Side::Away);
        if home.is_none() && away.is_none() {
            return LayerSignal::silent(self.key());
        }
        let label = pick.market.label();

        let mut contribution = 0.0;
        let mut reasons = vec![];
        for (side, profile) in [("home", home), ("away", away)] {
            let Some(profile) = profile else { continue };
            if on_avoid_list(profile, &label) {
                contribution -= weight;
                reasons.push(format!("{side} side avoids this market"));
                continue;
            }
            if profile.best_market.eq_ignore_ascii_case(&label) {
                let conviction = (profile.confidence_score / 100.0).clamp(0.0, 1.0);
                contribution += weight * 0.5 * conviction
                    + weight * 0.3 * (profile.historical_success_rate / 100.0).clamp(0.0, 1.0);
                reasons.push(format!(
                    "{side} side's best market ({:.0}% historically)",
                    profile.historical_success_rate
                ));
            }
        }
        if reasons.is_empty() {
            reasons.push("profiled, but not this market".into());
        }
        signal(self.key(), contribution, reasons.join("; "))
    }
}

fn on_avoid_list(profile: &MarketProfile, label: &str) -> bool {
    profile
        .avoid_markets
        .as_ref()
        .is_some_and(|avoided| avoided.iter().any(|market| market.eq_ignore_ascii_case(label)))
}
