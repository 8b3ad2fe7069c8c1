//! Aggregates independent model opinions into a weighted consensus score and
//! a divergence report. The engine collects however many weighted votes the
//! orchestrator wires in; it never chooses a market itself.

use serde::{Deserialize, Serialize};

use crate::domain::{MarketType, SettledResult};
use crate::probs::SliceExt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteSignal {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    Skip,
}
impl VoteSignal {
    pub fn is_positive(&self) -> bool {
        matches!(self, VoteSignal::StrongBuy | VoteSignal::Buy)
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, VoteSignal::Sell)
    }

    pub fn label(&self) -> &'static str {
        match self {
            VoteSignal::StrongBuy => "STRONG_BUY",
            VoteSignal::Buy => "BUY",
            VoteSignal::Hold => "HOLD",
            VoteSignal::Sell => "SELL",
            VoteSignal::Skip => "SKIP",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelVote {
    pub model: String,
    pub signal: VoteSignal,
    /// In [0, 100].
    pub confidence: f64,
    pub market: MarketType,
    pub probability: Option<f64>,
    pub reason: String,
    pub weight: f64,
}
impl ModelVote {
    /// Whether the settled outcome vindicated this vote: bullish votes need a
    /// win, bearish votes a loss, and neutral votes anything that did not pay.
    pub fn vindicated_by(&self, result: SettledResult) -> bool {
        if self.signal.is_positive() {
            result == SettledResult::Win
        } else if self.signal.is_negative() {
            result == SettledResult::Loss
        } else {
            matches!(
                result,
                SettledResult::Loss | SettledResult::Push | SettledResult::Void
            )
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Divergence {
    /// Votes agree; carries the tightness bonus applied to the score.
    Consensus { bonus: f64 },
    /// Exactly one vote sits far from the rest. Surfaced as a potential
    /// information asymmetry; never damped.
    SingleAgent { outlier: String, gap: f64 },
    /// Multiple outliers or a wide spread; the score was damped.
    General { std_dev: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}
impl Strength {
    pub fn label(&self) -> &'static str {
        match self {
            Strength::Weak => "WEAK",
            Strength::Moderate => "MODERATE",
            Strength::Strong => "STRONG",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusReport {
    pub positive: usize,
    pub total: usize,
    pub score: f64,
    pub mean_confidence: f64,
    pub std_dev: f64,
    pub divergence: Divergence,
    pub strength: Strength,
}
impl ConsensusReport {
    pub fn empty() -> Self {
        Self {
            positive: 0,
            total: 0,
            score: 0.0,
            mean_confidence: 0.0,
            std_dev: 0.0,
            divergence: Divergence::Consensus { bonus: 0.0 },
            strength: Strength::Weak,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub outlier_threshold: f64,
    pub sigma_threshold: f64,
    pub damping: f64,
}

const STRONG_SCORE: f64 = 70.0;
const MODERATE_SCORE: f64 = 50.0;
const MAX_TIGHTNESS_BONUS: f64 = 2.0;

/// A vote is an outlier when its confidence sits further than the threshold
/// from the mean of the remaining votes.
fn outliers(confidences: &[f64], threshold: f64) -> Vec<usize> {
    if confidences.len() < 3 {
        return vec![];
    }
    let total = confidences.sum();
    let mut found = vec![];
    for (index, &confidence) in confidences.iter().enumerate() {
        let rest_mean = (total - confidence) / (confidences.len() - 1) as f64;
        if (confidence - rest_mean).abs() > threshold {
            found.push(index);
        }
    }
    found
}

pub fn evaluate(votes: &[ModelVote], config: &ConsensusConfig) -> ConsensusReport {
    if votes.is_empty() {
        return ConsensusReport::empty();
    }

    let positive = votes.iter().filter(|vote| vote.signal.is_positive()).count();
    let confidences: Vec<f64> = votes.iter().map(|vote| vote.confidence).collect();
    let weight_sum: f64 = votes.iter().map(|vote| vote.weight).sum();
    let mean_confidence = if weight_sum > 0.0 {
        votes
            .iter()
            .map(|vote| vote.confidence * vote.weight)
            .sum::<f64>()
            / weight_sum
    } else {
        confidences.mean()
    };
    let std_dev = confidences.std_dev();

    let outlier_indices = outliers(&confidences, config.outlier_threshold);
    let (divergence, score) = if outlier_indices.len() == 1 {
        let index = outlier_indices[0];
        let rest_mean =
            (confidences.sum() - confidences[index]) / (confidences.len() - 1) as f64;
        (
            Divergence::SingleAgent {
                outlier: votes[index].model.clone(),
                gap: (confidences[index] - rest_mean).abs(),
            },
            mean_confidence,
        )
    } else if outlier_indices.len() > 1 || std_dev > config.sigma_threshold {
        (
            Divergence::General { std_dev },
            mean_confidence * config.damping,
        )
    } else {
        let tightness = 1.0 - (std_dev / config.sigma_threshold).min(1.0);
        let bonus = MAX_TIGHTNESS_BONUS * tightness;
        (
            Divergence::Consensus { bonus },
            (mean_confidence + bonus).min(100.0),
        )
    };

    let strength = if score >= STRONG_SCORE {
        Strength::Strong
    } else if score >= MODERATE_SCORE {
        Strength::Moderate
    } else {
        Strength::Weak
    };

    ConsensusReport {
        positive,
        total: votes.len(),
        score,
        mean_confidence,
        std_dev,
        divergence,
        strength,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::*;

    fn config() -> ConsensusConfig {
        ConsensusConfig {
            outlier_threshold: 25.0,
            sigma_threshold: 18.0,
            damping: 0.85,
        }
    }

    fn vote(model: &str, signal: VoteSignal, confidence: f64) -> ModelVote {
        ModelVote {
            model: model.into(),
            signal,
            confidence,
            market: MarketType::BttsYes,
            probability: None,
            reason: format!("{model} opinion"),
            weight: 1.0,
        }
    }

    #[test]
    fn empty_votes_report() {
        let report = evaluate(&[], &config());
        assert_eq!(0, report.total);
        assert_eq!(Strength::Weak, report.strength);
    }

    #[test]
    fn tight_agreement_earns_a_bonus() {
        let votes = vec![
            vote("prob", VoteSignal::Buy, 62.0),
            vote("price", VoteSignal::Buy, 60.0),
            vote("fit", VoteSignal::Buy, 64.0),
            vote("ml", VoteSignal::StrongBuy, 61.0),
        ];
        let report = evaluate(&votes, &config());
        assert_eq!(4, report.positive);
        assert!(matches!(report.divergence, Divergence::Consensus { bonus } if bonus > 0.0));
        assert!(report.score > report.mean_confidence);
        assert_eq!(Strength::Moderate, report.strength);
    }

    #[test]
    fn single_outlier_is_a_signal_not_a_penalty() {
        let votes = vec![
            vote("prob", VoteSignal::Buy, 58.0),
            vote("price", VoteSignal::Buy, 58.0),
            vote("fit", VoteSignal::Buy, 58.0),
            vote("style", VoteSignal::Buy, 58.0),
            vote("scenario", VoteSignal::Buy, 58.0),
            vote("ml", VoteSignal::Sell, 85.0),
        ];
        let report = evaluate(&votes, &config());
        assert_eq!(5, report.positive);
        assert_eq!(6, report.total);
        match &report.divergence {
            Divergence::SingleAgent { outlier, gap } => {
                assert_eq!("ml", outlier);
                assert!(*gap > 25.0);
            }
            other => panic!("expected single-agent divergence, got {other:?}"),
        }
        // no damping: the score is exactly the weighted mean
        assert_float_absolute_eq!(report.mean_confidence, report.score);
    }

    #[test]
    fn wide_spread_is_damped() {
        let votes = vec![
            vote("prob", VoteSignal::Buy, 90.0),
            vote("price", VoteSignal::Sell, 30.0),
            vote("fit", VoteSignal::Buy, 75.0),
            vote("ml", VoteSignal::Sell, 25.0),
        ];
        let report = evaluate(&votes, &config());
        assert!(matches!(report.divergence, Divergence::General { .. }));
        assert_float_absolute_eq!(report.mean_confidence * 0.85, report.score);
        assert!(report.score < report.mean_confidence);
    }

    #[test]
    fn score_is_monotone_in_confidence() {
        let votes = vec![
            vote("prob", VoteSignal::Buy, 55.0),
            vote("price", VoteSignal::Buy, 60.0),
            vote("fit", VoteSignal::Sell, 50.0),
            vote("ml", VoteSignal::Buy, 58.0),
        ];
        let before = evaluate(&votes, &config());
        let raised: Vec<ModelVote> = votes
            .iter()
            .map(|vote| ModelVote {
                confidence: vote.confidence + 10.0,
                ..vote.clone()
            })
            .collect();
        let after = evaluate(&raised, &config());
        assert!(
            after.score >= before.score,
            "raising every confidence must not lower the consensus score \
             ({} -> {})",
            before.score,
            after.score
        );
    }

    #[test]
    fn weighting_tilts_the_mean() {
        let mut votes = vec![
            vote("prob", VoteSignal::Buy, 80.0),
            vote("ml", VoteSignal::Buy, 40.0),
        ];
        votes[0].weight = 3.0;
        let report = evaluate(&votes, &config());
        assert!(report.mean_confidence > 60.0);
    }

    #[test]
    fn vote_vindication() {
        let buy = vote("prob", VoteSignal::Buy, 60.0);
        assert!(buy.vindicated_by(SettledResult::Win));
        assert!(!buy.vindicated_by(SettledResult::Loss));
        let sell = vote("ml", VoteSignal::Sell, 60.0);
        assert!(sell.vindicated_by(SettledResult::Loss));
        assert!(!sell.vindicated_by(SettledResult::Win));
        let hold = vote("fit", VoteSignal::Hold, 60.0);
        assert!(hold.vindicated_by(SettledResult::Push));
        assert!(!hold.vindicated_by(SettledResult::Win));
    }

    #[test]
    fn strength_banding() {
        let strong = vec![
            vote("a", VoteSignal::Buy, 75.0),
            vote("b", VoteSignal::Buy, 74.0),
            vote("c", VoteSignal::Buy, 76.0),
        ];
        assert_eq!(Strength::Strong, evaluate(&strong, &config()).strength);
        let weak = vec![
            vote("a", VoteSignal::Hold, 30.0),
            vote("b", VoteSignal::Hold, 32.0),
            vote("c", VoteSignal::Hold, 31.0),
        ];
        assert_eq!(Strength::Weak, evaluate(&weak, &config()).strength);
    }
}
