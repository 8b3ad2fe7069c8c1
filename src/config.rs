//! Engine configuration: layer weights, per-market edge and price rules,
//! sizing parameters, and the probability-engine tunables. Weights and tables
//! are static inputs; nothing here mutates at request time.

use std::error::Error;
use std::ops::RangeInclusive;

use anyhow::anyhow;
use rustc_hash::FxHashMap;
use strum::IntoEnumIterator;
use thiserror::Error;

use crate::domain::{LayerKey, MarketType, PlayingStyle};

pub const DEFAULT_KELLY_FRACTION: f64 = 0.25;
pub const DEFAULT_STAKE_CAP: f64 = 0.05;
pub const DEFAULT_FIRST_HALF_SHARE: f64 = 0.45;
pub const DEFAULT_MAX_GOALS_PER_SIDE: u8 = 7;
pub const DEFAULT_COVERAGE_FLOOR: f64 = 0.5;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_CONTEXT_CACHE_CAPACITY: usize = 64;
pub const DEFAULT_CORRECT_SCORE_TOP_N: usize = 10;
pub const DEFAULT_SNAPSHOT_RETENTION_DAYS: u16 = 180;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationError(#[from] pub Box<dyn Error>);

impl From<anyhow::Error> for ValidationError {
    fn from(value: anyhow::Error) -> Self {
        ValidationError(value.into())
    }
}

/// Final-score thresholds mapping to action tiers, strictly descending.
#[derive(Debug, Clone)]
pub struct ScoreTiers {
    pub strong_bet: f64,
    pub bet: f64,
    pub watch: f64,
}

impl Default for ScoreTiers {
    fn default() -> Self {
        Self {
            strong_bet: 70.0,
            bet: 50.0,
            watch: 38.0,
        }
    }
}

/// Classifier-confidence bands and the multiplier each maps to. Ordered by
/// descending threshold; the first band at or below the confidence wins.
#[derive(Debug, Clone)]
pub struct MlTier {
    pub min_confidence: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub layer_weights: FxHashMap<LayerKey, f64>,
    pub score_tiers: ScoreTiers,
    pub base_min_edge: f64,
    pub defensive_min_edge: f64,
    pub correct_score_min_edge: f64,
    pub min_edge_overrides: FxHashMap<MarketType, f64>,
    pub sweet_spot_overrides: FxHashMap<MarketType, RangeInclusive<f64>>,
    pub price_floor: f64,
    pub correct_score_price_floor: f64,
    pub kelly_fraction: f64,
    pub stake_cap: f64,
    pub ml_tiers: Vec<MlTier>,
    pub ml_bonus_cap: f64,
    pub variance_penalty_threshold: f64,
    pub variance_penalty_floor: f64,
    pub first_half_share: f64,
    pub max_goals_per_side: u8,
    pub common_rate: f64,
    pub zero_inflation: f64,
    pub high_total_damp: f64,
    pub high_total_from: u16,
    pub coverage_floor: f64,
    pub consensus_outlier_threshold: f64,
    pub consensus_sigma_threshold: f64,
    pub consensus_damping: f64,
    pub correct_score_top_n: usize,
    pub top_k: usize,
    pub context_cache_capacity: usize,
    pub snapshot_retention_days: u16,
}

impl Default for Config {
    fn default() -> Self {
        let layer_weights = FxHashMap::from_iter([
            (LayerKey::Tactical, 12.0),
            (LayerKey::TeamClass, 10.0),
            (LayerKey::ExpectedGoals, 10.0),
            (LayerKey::Momentum, 10.0),
            (LayerKey::HeadToHead, 8.0),
            (LayerKey::Referee, 6.0),
            (LayerKey::MarketProfile, 6.0),
            (LayerKey::Steam, 8.0),
            (LayerKey::RealityCheck, 4.0),
        ]);
        Self {
            layer_weights,
            score_tiers: ScoreTiers::default(),
            base_min_edge: 0.02,
            defensive_min_edge: 0.04,
            correct_score_min_edge: 0.08,
            min_edge_overrides: FxHashMap::default(),
            sweet_spot_overrides: FxHashMap::default(),
            price_floor: 1.25,
            correct_score_price_floor: 4.0,
            kelly_fraction: DEFAULT_KELLY_FRACTION,
            stake_cap: DEFAULT_STAKE_CAP,
            ml_tiers: vec![
                MlTier {
                    min_confidence: 85.0,
                    multiplier: 1.25,
                },
                MlTier {
                    min_confidence: 70.0,
                    multiplier: 1.15,
                },
                MlTier {
                    min_confidence: 55.0,
                    multiplier: 1.05,
                },
                MlTier {
                    min_confidence: 45.0,
                    multiplier: 1.00,
                },
                MlTier {
                    min_confidence: 30.0,
                    multiplier: 0.92,
                },
                MlTier {
                    min_confidence: 0.0,
                    multiplier: 0.85,
                },
            ],
            ml_bonus_cap: 3.0,
            variance_penalty_threshold: 0.15,
            variance_penalty_floor: 0.7,
            first_half_share: DEFAULT_FIRST_HALF_SHARE,
            max_goals_per_side: DEFAULT_MAX_GOALS_PER_SIDE,
            common_rate: 0.1,
            zero_inflation: 0.01,
            high_total_damp: 0.97,
            high_total_from: 6,
            coverage_floor: DEFAULT_COVERAGE_FLOOR,
            consensus_outlier_threshold: 25.0,
            consensus_sigma_threshold: 18.0,
            consensus_damping: 0.85,
            correct_score_top_n: DEFAULT_CORRECT_SCORE_TOP_N,
            top_k: DEFAULT_TOP_K,
            context_cache_capacity: DEFAULT_CONTEXT_CACHE_CAPACITY,
            snapshot_retention_days: DEFAULT_SNAPSHOT_RETENTION_DAYS,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for key in LayerKey::iter() {
            let weight = self
                .layer_weights
                .get(&key)
                .ok_or_else(|| anyhow!("missing weight for layer {key}"))?;
            if *weight < 0.0 {
                return Err(anyhow!("weight for layer {key} cannot be negative").into());
            }
        }
        if self.kelly_fraction <= 0.0 || self.kelly_fraction > 1.0 {
            return Err(anyhow!("kelly fraction must lie in (0, 1]").into());
        }
        if self.stake_cap <= 0.0 || self.stake_cap > 0.2 {
            return Err(anyhow!("stake cap must lie in (0, 0.2]").into());
        }
        if self.first_half_share <= 0.2 || self.first_half_share >= 0.8 {
            return Err(anyhow!("first-half share must lie in (0.2, 0.8)").into());
        }
        const MIN_GOALS_PER_SIDE: u8 = 5;
        if self.max_goals_per_side < MIN_GOALS_PER_SIDE {
            return Err(
                anyhow!("max goals per side cannot be less than {MIN_GOALS_PER_SIDE}").into(),
            );
        }
        if !(self.score_tiers.strong_bet > self.score_tiers.bet
            && self.score_tiers.bet > self.score_tiers.watch)
        {
            return Err(anyhow!("score tiers must be strictly descending").into());
        }
        if !(0.0..=1.0).contains(&self.coverage_floor) {
            return Err(anyhow!("coverage floor must lie in [0, 1]").into());
        }
        if !(0.7..=1.0).contains(&self.variance_penalty_floor) {
            return Err(anyhow!("variance penalty floor must lie in [0.7, 1]").into());
        }
        if self.ml_tiers.is_empty() {
            return Err(anyhow!("at least one ml confidence tier is required").into());
        }
        for window in self.ml_tiers.windows(2) {
            if window[0].min_confidence <= window[1].min_confidence {
                return Err(anyhow!("ml tiers must have strictly descending thresholds").into());
            }
        }
        for tier in &self.ml_tiers {
            if !(0.85..=1.25).contains(&tier.multiplier) {
                return Err(anyhow!("ml multipliers must lie in [0.85, 1.25]").into());
            }
        }
        if !(0.0..1.0).contains(&self.consensus_damping) {
            return Err(anyhow!("consensus damping must lie in [0, 1)").into());
        }
        Ok(())
    }

    pub fn weight(&self, key: LayerKey) -> f64 {
        self.layer_weights.get(&key).copied().unwrap_or(0.0)
    }

    /// Minimum model-vs-implied edge to back a market; tighter for correct
    /// score and defensive markets.
    pub fn min_edge(&self, market: &MarketType) -> f64 {
        if let Some(&edge) = self.min_edge_overrides.get(market) {
            return edge;
        }
        if market.is_correct_score() {
            self.correct_score_min_edge
        } else if market.is_defensive() {
            self.defensive_min_edge
        } else {
            self.base_min_edge
        }
    }

    /// Quoted-price band in which the market's historical hit rate times mean
    /// price has been most favourable.
    pub fn sweet_spot(&self, market: &MarketType) -> RangeInclusive<f64> {
        if let Some(range) = self.sweet_spot_overrides.get(market) {
            return range.clone();
        }
        match market {
            MarketType::Result(_) => 1.50..=3.60,
            MarketType::DoubleChance(_) => 1.20..=1.90,
            MarketType::Over(_) | MarketType::Under(_) => 1.55..=2.40,
            MarketType::BttsYes | MarketType::BttsNo => 1.55..=2.20,
            MarketType::AsianHandicap(_, _) => 1.60..=2.50,
            MarketType::CorrectScore(_) => 5.00..=13.00,
            MarketType::DoubleResult(_, _) => 3.00..=15.00,
            _ => 1.40..=4.50,
        }
    }

    pub fn market_price_floor(&self, market: &MarketType) -> f64 {
        if market.is_correct_score() {
            self.correct_score_price_floor
        } else {
            self.price_floor
        }
    }

    /// First-half goal share for a pairing, nudged by the closed style table
    /// and clamped to a sane band.
    pub fn first_half_share_for(
        &self,
        home_style: Option<PlayingStyle>,
        away_style: Option<PlayingStyle>,
    ) -> f64 {
        let delta = style_share_delta(home_style) + style_share_delta(away_style);
        (self.first_half_share + delta).clamp(0.35, 0.55)
    }

    pub fn ml_multiplier(&self, confidence: f64) -> f64 {
        self.ml_tiers
            .iter()
            .find(|tier| confidence >= tier.min_confidence)
            .map(|tier| tier.multiplier)
            .unwrap_or(1.0)
    }
}

fn style_share_delta(style: Option<PlayingStyle>) -> f64 {
    match style {
        Some(PlayingStyle::Possession) => -0.01,
        Some(PlayingStyle::Defensive) => -0.015,
        Some(PlayingStyle::Counter) => -0.005,
        Some(PlayingStyle::Direct) => 0.01,
        Some(PlayingStyle::HighPress) => 0.01,
        Some(PlayingStyle::Chaotic) => 0.015,
        Some(PlayingStyle::Balanced) | None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_kelly_fraction() {
        let mut config = Config::default();
        config.kelly_fraction = 0.0;
        assert!(config.validate().is_err());
        config.kelly_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_missing_layer_weight() {
        let mut config = Config::default();
        config.layer_weights.remove(&LayerKey::Steam);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unordered_tiers() {
        let mut config = Config::default();
        config.score_tiers.bet = config.score_tiers.strong_bet;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unordered_ml_tiers() {
        let mut config = Config::default();
        config.ml_tiers.swap(0, 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn min_edge_tightens_by_market() {
        let config = Config::default();
        let base = config.min_edge(&MarketType::BttsYes);
        let defensive = config.min_edge(&MarketType::Under(2));
        let exact = config.min_edge(&MarketType::CorrectScore(crate::domain::Score::new(2, 1)));
        assert!(defensive > base);
        assert!(exact > defensive);
    }

    #[test]
    fn min_edge_override_wins() {
        let mut config = Config::default();
        config
            .min_edge_overrides
            .insert(MarketType::BttsYes, 0.10);
        assert_float_absolute_eq!(0.10, config.min_edge(&MarketType::BttsYes));
    }

    #[test]
    fn first_half_share_stays_in_band() {
        let config = Config::default();
        assert_float_absolute_eq!(
            DEFAULT_FIRST_HALF_SHARE,
            config.first_half_share_for(None, None)
        );
        let chaotic = config.first_half_share_for(
            Some(PlayingStyle::Chaotic),
            Some(PlayingStyle::Chaotic),
        );
        assert!(chaotic > DEFAULT_FIRST_HALF_SHARE);
        assert!(chaotic <= 0.55);
        let cagey = config.first_half_share_for(
            Some(PlayingStyle::Defensive),
            Some(PlayingStyle::Possession),
        );
        assert!(cagey < DEFAULT_FIRST_HALF_SHARE);
        assert!(cagey >= 0.35);
    }

    #[test]
    fn ml_multiplier_banding() {
        let config = Config::default();
        assert_float_absolute_eq!(1.25, config.ml_multiplier(91.0));
        assert_float_absolute_eq!(1.15, config.ml_multiplier(70.0));
        assert_float_absolute_eq!(1.0, config.ml_multiplier(50.0));
        assert_float_absolute_eq!(0.85, config.ml_multiplier(10.0));
    }
}
