//! Decision snapshots: one append-only audit record per decision (vetoes and
//! skips included), carrying the pick, every layer signal, every model vote,
//! and the serialized payload for replay. Settlement back-fills the result,
//! the profit/loss, and per-vote correctness after the match.

use serde_json::json;

use crate::consensus::{ConsensusReport, ModelVote};
use crate::context::MatchContext;
use crate::domain::{
    MarketType, MatchResult, Pick, Score, SettledResult, Side,
};
use crate::store::{Store, StoreError};

/// Row destined for `bet_snapshots`; the JSON columns are pre-serialized so
/// the store stays a dumb pipe.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub bet_id: String,
    pub match_id: String,
    pub teams: String,
    pub snapshot_data: String,
    pub home_dna: String,
    pub away_dna: String,
    pub friction_matrix: String,
    pub model_votes: String,
    pub model_weights: String,
    pub consensus_score: f64,
    pub consensus_count: i32,
    pub conviction: String,
    pub odds_snapshot: String,
    pub final_market: String,
    pub final_odds: f64,
    pub final_stake: f64,
    pub final_probability: f64,
    pub final_edge: f64,
    pub expected_value: f64,
}

/// Row destined for `model_votes`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteRecord {
    pub bet_id: String,
    pub model_name: String,
    pub signal: String,
    pub confidence: f64,
    pub market_suggested: String,
    pub probability_estimate: Option<f64>,
    pub reasoning: String,
    pub raw_data: String,
    pub agreed_with_consensus: bool,
    pub weight_used: f64,
}

pub fn bet_id(match_id: &str, market: &MarketType) -> String {
    format!("{match_id}:{}", market.label())
}

/// Assembles the snapshot and vote rows for one decision. Pure; the caller
/// hands the rows to the store in a single transaction.
pub fn build(
    pick: &Pick,
    votes: &[ModelVote],
    report: &ConsensusReport,
    ctx: &MatchContext,
    quoted_prices: &[(MarketType, f64)],
) -> Result<(SnapshotRecord, Vec<VoteRecord>), serde_json::Error> {
    let bet_id = bet_id(&pick.match_id, &pick.market);
    let snapshot_data = serde_json::to_string(pick)?;
    let home_dna = side_dna(ctx, Side::Home)?;
    let away_dna = side_dna(ctx, Side::Away)?;
    let friction_matrix = match &ctx.tactical_cell {
        Some(cell) => serde_json::to_string(&json!({
            "style_a": cell.style_a,
            "style_b": cell.style_b,
            "btts_prob": cell.btts_prob,
            "over25_prob": cell.over25_prob,
            "avg_total_goals": cell.avg_total_goals,
            "sample_size": cell.sample_size,
        }))?,
        None => "null".into(),
    };
    let model_votes = serde_json::to_string(votes)?;
    let model_weights = serde_json::to_string(
        &votes
            .iter()
            .map(|vote| (vote.model.clone(), vote.weight))
            .collect::<Vec<_>>(),
    )?;
    let odds_snapshot = serde_json::to_string(
        &quoted_prices
            .iter()
            .map(|(market, price)| (market.label(), *price))
            .collect::<Vec<_>>(),
    )?;

    let majority_positive = report.positive * 2 > report.total;
    let vote_records = votes
        .iter()
        .map(|vote| VoteRecord {
            bet_id: bet_id.clone(),
            model_name: vote.model.clone(),
            signal: vote.signal.label().into(),
            confidence: vote.confidence,
            market_suggested: vote.market.label(),
            probability_estimate: vote.probability,
            reasoning: vote.reason.clone(),
            raw_data: serde_json::to_string(vote).unwrap_or_else(|_| "null".into()),
            agreed_with_consensus: vote.signal.is_positive() == majority_positive,
            weight_used: vote.weight,
        })
        .collect();

    let expected_value = pick.edge * pick.quoted_price;
    let record = SnapshotRecord {
        bet_id,
        match_id: pick.match_id.clone(),
        teams: format!("{} vs {}", pick.home, pick.away),
        snapshot_data,
        home_dna,
        away_dna,
        friction_matrix,
        model_votes,
        model_weights,
        consensus_score: report.score,
        consensus_count: report.positive as i32,
        conviction: report.strength.label().into(),
        odds_snapshot,
        final_market: pick.market.label(),
        final_odds: pick.quoted_price,
        final_stake: pick.stake,
        final_probability: pick.model_prob,
        final_edge: pick.edge,
        expected_value,
    };
    Ok((record, vote_records))
}

fn side_dna(ctx: &MatchContext, side: Side) -> Result<String, serde_json::Error> {
    let intelligence = ctx.intelligence(side);
    let class = ctx.class(side);
    let momentum = ctx.momentum(side);
    serde_json::to_string(&json!({
        "style": intelligence.and_then(|row| row.current_style.clone()),
        "xg_for": intelligence.map(|row| row.xg_for_per_match),
        "xg_against": intelligence.map(|row| row.xg_against_per_match),
        "tier": class.map(|row| row.tier.clone()),
        "power_index": class.map(|row| row.power_index),
        "momentum_score": momentum.map(|row| row.momentum_score),
        "key_player_absent": momentum.map(|row| row.key_player_absent),
    }))
}

/// Grades a market against the final score (and the half-time score where the
/// market needs one). `Void` when the required half-time score is missing.
pub fn grade(market: &MarketType, full_time: &Score, half_time: Option<&Score>) -> SettledResult {
    use SettledResult::{Loss, Void, Win};
    let won = |hit: bool| if hit { Win } else { Loss };
    let total = full_time.total();
    let ft_result = result_of(full_time);
    match market {
        MarketType::Result(wanted) => won(ft_result == *wanted),
        MarketType::DoubleChance(dc) => {
            use crate::domain::DoubleChance::*;
            let hit = match dc {
                HomeOrDraw => ft_result != MatchResult::Away,
                HomeOrAway => ft_result != MatchResult::Draw,
                DrawOrAway => ft_result != MatchResult::Home,
            };
            won(hit)
        }
        MarketType::Over(line) => won(total > *line as u16),
        MarketType::Under(line) => won(total <= *line as u16),
        MarketType::BttsYes => won(full_time.home >= 1 && full_time.away >= 1),
        MarketType::BttsNo => won(full_time.home == 0 || full_time.away == 0),
        MarketType::AsianHandicap(side, line) => {
            let margin = match side {
                Side::Home => full_time.home as f64 - full_time.away as f64 + line.value(),
                Side::Away => full_time.away as f64 - full_time.home as f64 + line.value(),
            };
            if margin > 0.0 {
                Win
            } else if margin == 0.0 {
                SettledResult::Push
            } else {
                Loss
            }
        }
        MarketType::CorrectScore(score) => won(score == full_time),
        MarketType::WinToNil(side) => {
            let hit = match side {
                Side::Home => full_time.home > 0 && full_time.away == 0,
                Side::Away => full_time.away > 0 && full_time.home == 0,
            };
            won(hit)
        }
        MarketType::OddGoals => won(total % 2 == 1),
        MarketType::EvenGoals => won(total % 2 == 0),
        MarketType::ExactGoals(goals) => won(total == *goals as u16),
        MarketType::FivePlusGoals => won(total >= 5),
        MarketType::GoalRange(range) => {
            let (lo, hi) = range.bounds();
            won(total >= lo && total <= hi)
        }
        MarketType::HalfTimeResult(wanted) => match half_time {
            Some(ht) => won(result_of(ht) == *wanted),
            None => Void,
        },
        MarketType::HalfTimeOver(line) => match half_time {
            Some(ht) => won(ht.total() > *line as u16),
            None => Void,
        },
        MarketType::HalfTimeBtts => match half_time {
            Some(ht) => won(ht.home >= 1 && ht.away >= 1),
            None => Void,
        },
        MarketType::DoubleResult(ht_wanted, ft_wanted) => match half_time {
            Some(ht) => won(result_of(ht) == *ht_wanted && ft_result == *ft_wanted),
            None => Void,
        },
        MarketType::BttsBothHalves => match half_time {
            Some(ht) => {
                let h2_home = full_time.home.saturating_sub(ht.home);
                let h2_away = full_time.away.saturating_sub(ht.away);
                won(ht.home >= 1 && ht.away >= 1 && h2_home >= 1 && h2_away >= 1)
            }
            None => Void,
        },
    }
}

fn result_of(score: &Score) -> MatchResult {
    if score.home > score.away {
        MatchResult::Home
    } else if score.home < score.away {
        MatchResult::Away
    } else {
        MatchResult::Draw
    }
}

pub fn profit_loss(result: SettledResult, stake: f64, price: f64) -> f64 {
    match result {
        SettledResult::Win => stake * (price - 1.0),
        SettledResult::Loss => -stake,
        SettledResult::Push | SettledResult::Void => 0.0,
    }
}

/// Settles a recorded decision: grades the market, computes the profit/loss,
/// back-fills per-vote correctness, and updates the fixed snapshot row.
pub async fn settle(
    store: &dyn Store,
    pick: &Pick,
    votes: &[ModelVote],
    full_time: &Score,
    half_time: Option<&Score>,
) -> Result<SettledResult, StoreError> {
    let result = grade(&pick.market, full_time, half_time);
    let pl = profit_loss(result, pick.stake, pick.quoted_price);
    let correctness: Vec<(String, bool)> = votes
        .iter()
        .map(|vote| (vote.model.clone(), vote.vindicated_by(result)))
        .collect();
    let result_label = match result {
        SettledResult::Win => "WIN",
        SettledResult::Loss => "LOSS",
        SettledResult::Push => "PUSH",
        SettledResult::Void => "VOID",
    };
    store
        .settle_snapshot(
            &bet_id(&pick.match_id, &pick.market),
            result_label,
            pl,
            &correctness,
        )
        .await?;
    Ok(result)
}
