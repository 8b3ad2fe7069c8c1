//! The full-time score matrix and every goal-dependent market gathered from
//! it. The grid is built once per fixture from the bivariate Poisson model and
//! reused by all market evaluations.

use crate::domain::{AhLine, DoubleChance, GoalRange, MarketType, MatchResult, Score, Side};
use crate::factorial;
use crate::linear::Matrix;
use crate::poisson;
use crate::probs::SliceExt;

/// Builds the (max+1)² score matrix from the bivariate Poisson pmf and
/// normalises it to unit mass. A cell whose pmf evaluation is not finite is
/// clamped to zero and the build continues.
pub fn from_bivariate_poisson(
    home_rate: f64,
    away_rate: f64,
    common_rate: f64,
    scoregrid: &mut Matrix,
) {
    let factorial = factorial::Lookup::default();
    for home_goals in 0..scoregrid.rows() {
        for away_goals in 0..scoregrid.cols() {
            let prob = poisson::bivariate(
                home_goals as u8,
                away_goals as u8,
                home_rate,
                away_rate,
                common_rate,
                &factorial,
            );
            scoregrid[(home_goals, away_goals)] = if prob.is_finite() { prob } else { 0.0 };
        }
    }
    scoregrid.flatten_mut().normalise(1.0);
}

/// Correlation tilt: raises the goalless cell and dampens improbable
/// high-scoring cells, then renormalises. Low-scoring draws are under-priced
/// by the independent model.
pub fn apply_correlation(
    zero_inflation: f64,
    high_total_damp: f64,
    high_total_from: u16,
    scoregrid: &mut Matrix,
) {
    scoregrid[(0, 0)] += zero_inflation;
    for home_goals in 0..scoregrid.rows() {
        for away_goals in 0..scoregrid.cols() {
            if (home_goals + away_goals) as u16 >= high_total_from {
                scoregrid[(home_goals, away_goals)] *= high_total_damp;
            }
        }
    }
    scoregrid.flatten_mut().normalise(1.0);
}

pub fn build(home_rate: f64, away_rate: f64, common_rate: f64, max_goals_per_side: u8) -> Matrix {
    let size = max_goals_per_side as usize + 1;
    let mut scoregrid = Matrix::allocate(size, size);
    from_bivariate_poisson(home_rate, away_rate, common_rate, &mut scoregrid);
    scoregrid
}

pub fn home_away_expectations(scoregrid: &Matrix) -> (f64, f64) {
    let (mut home_expectation, mut away_expectation) = (0.0, 0.0);
    for home_goals in 0..scoregrid.rows() {
        for away_goals in 0..scoregrid.cols() {
            let prob = scoregrid[(home_goals, away_goals)];
            home_expectation += home_goals as f64 * prob;
            away_expectation += away_goals as f64 * prob;
        }
    }
    (home_expectation, away_expectation)
}

pub fn win(side: Side, scoregrid: &Matrix) -> f64 {
    let mut prob = 0.0;
    match side {
        Side::Home => {
            for row in 1..scoregrid.rows() {
                for col in 0..row {
                    prob += scoregrid[(row, col)];
                }
            }
        }
        Side::Away => {
            for col in 1..scoregrid.cols() {
                for row in 0..col {
                    prob += scoregrid[(row, col)];
                }
            }
        }
    }
    prob
}

pub fn draw(scoregrid: &Matrix) -> f64 {
    let mut prob = 0.0;
    for index in 0..scoregrid.rows() {
        prob += scoregrid[(index, index)];
    }
    prob
}

pub fn result(result: MatchResult, scoregrid: &Matrix) -> f64 {
    match result {
        MatchResult::Home => win(Side::Home, scoregrid),
        MatchResult::Draw => draw(scoregrid),
        MatchResult::Away => win(Side::Away, scoregrid),
    }
}

pub fn double_chance(dc: DoubleChance, scoregrid: &Matrix) -> f64 {
    match dc {
        DoubleChance::HomeOrDraw => win(Side::Home, scoregrid) + draw(scoregrid),
        DoubleChance::HomeOrAway => win(Side::Home, scoregrid) + win(Side::Away, scoregrid),
        DoubleChance::DrawOrAway => draw(scoregrid) + win(Side::Away, scoregrid),
    }
}

/// Over `line`.5: total strictly greater than `line`.
pub fn goals_over(line: u8, scoregrid: &Matrix) -> f64 {
    let line = line as usize;
    let mut prob = 0.0;
    for row in 0..scoregrid.rows() {
        for col in 0..scoregrid.cols() {
            if row + col > line {
                prob += scoregrid[(row, col)];
            }
        }
    }
    prob
}

/// Under `line`.5: total at most `line`.
pub fn goals_under(line: u8, scoregrid: &Matrix) -> f64 {
    let line = line as usize;
    let mut prob = 0.0;
    for row in 0..scoregrid.rows() {
        for col in 0..scoregrid.cols() {
            if row + col <= line {
                prob += scoregrid[(row, col)];
            }
        }
    }
    prob
}

pub fn btts(scoregrid: &Matrix) -> f64 {
    let mut prob = 0.0;
    for row in 1..scoregrid.rows() {
        for col in 1..scoregrid.cols() {
            prob += scoregrid[(row, col)];
        }
    }
    prob
}

pub fn correct_score(score: &Score, scoregrid: &Matrix) -> f64 {
    if (score.home as usize) < scoregrid.rows() && (score.away as usize) < scoregrid.cols() {
        scoregrid[(score.home as usize, score.away as usize)]
    } else {
        0.0
    }
}

pub fn exact_goals(goals: u8, scoregrid: &Matrix) -> f64 {
    let goals = goals as usize;
    let mut prob = 0.0;
    for row in 0..scoregrid.rows() {
        for col in 0..scoregrid.cols() {
            if row + col == goals {
                prob += scoregrid[(row, col)];
            }
        }
    }
    prob
}

pub fn goals_at_least(goals: u16, scoregrid: &Matrix) -> f64 {
    let mut prob = 0.0;
    for row in 0..scoregrid.rows() {
        for col in 0..scoregrid.cols() {
            if (row + col) as u16 >= goals {
                prob += scoregrid[(row, col)];
            }
        }
    }
    prob
}

pub fn goal_range(range: GoalRange, scoregrid: &Matrix) -> f64 {
    let (lo, hi) = range.bounds();
    let mut prob = 0.0;
    for row in 0..scoregrid.rows() {
        for col in 0..scoregrid.cols() {
            let total = (row + col) as u16;
            if total >= lo && total <= hi {
                prob += scoregrid[(row, col)];
            }
        }
    }
    prob
}

pub fn even_total(scoregrid: &Matrix) -> f64 {
    let mut prob = 0.0;
    for row in 0..scoregrid.rows() {
        for col in 0..scoregrid.cols() {
            if (row + col) % 2 == 0 {
                prob += scoregrid[(row, col)];
            }
        }
    }
    prob
}

pub fn odd_total(scoregrid: &Matrix) -> f64 {
    1.0 - even_total(scoregrid)
}

pub fn win_to_nil(side: Side, scoregrid: &Matrix) -> f64 {
    let mut prob = 0.0;
    match side {
        Side::Home => {
            for row in 1..scoregrid.rows() {
                prob += scoregrid[(row, 0)];
            }
        }
        Side::Away => {
            for col in 1..scoregrid.cols() {
                prob += scoregrid[(0, col)];
            }
        }
    }
    prob
}

/// Surfaced two-way probability for the side giving `line`: the win mass plus
/// half of any push mass on whole-goal lines.
pub fn asian_handicap(side: Side, line: AhLine, scoregrid: &Matrix) -> f64 {
    let (mut win, mut push) = (0.0, 0.0);
    for row in 0..scoregrid.rows() {
        for col in 0..scoregrid.cols() {
            let margin = match side {
                Side::Home => row as f64 - col as f64 + line.value(),
                Side::Away => col as f64 - row as f64 + line.value(),
            };
            let prob = scoregrid[(row, col)];
            if margin > 0.0 {
                win += prob;
            } else if margin == 0.0 {
                push += prob;
            }
        }
    }
    if line.is_whole() {
        win + 0.5 * push
    } else {
        win
    }
}

/// The `n` most probable scorelines, descending, ties broken by scoreline
/// order for determinism. Fair odds are the reciprocal of each probability.
pub fn top_scores(scoregrid: &Matrix, n: usize) -> Vec<(Score, f64)> {
    let mut ranked = Vec::with_capacity(scoregrid.rows() * scoregrid.cols());
    for row in 0..scoregrid.rows() {
        for col in 0..scoregrid.cols() {
            ranked.push((Score::new(row as u8, col as u8), scoregrid[(row, col)]));
        }
    }
    ranked.sort_by(|(score_a, prob_a), (score_b, prob_b)| {
        prob_b
            .partial_cmp(prob_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| score_a.cmp(score_b))
    });
    ranked.truncate(n);
    ranked
}

/// Model probability of a full-time market; `None` for the half-time and
/// double-result markets, which are priced off the period engine.
pub fn market_prob(market: &MarketType, scoregrid: &Matrix) -> Option<f64> {
    let prob = match market {
        MarketType::Result(r) => result(*r, scoregrid),
        MarketType::DoubleChance(dc) => double_chance(*dc, scoregrid),
        MarketType::Over(line) => goals_over(*line, scoregrid),
        MarketType::Under(line) => goals_under(*line, scoregrid),
        MarketType::BttsYes => btts(scoregrid),
        MarketType::BttsNo => 1.0 - btts(scoregrid),
        MarketType::AsianHandicap(side, line) => asian_handicap(*side, *line, scoregrid),
        MarketType::CorrectScore(score) => correct_score(score, scoregrid),
        MarketType::WinToNil(side) => win_to_nil(*side, scoregrid),
        MarketType::OddGoals => odd_total(scoregrid),
        MarketType::EvenGoals => even_total(scoregrid),
        MarketType::ExactGoals(goals) => exact_goals(*goals, scoregrid),
        MarketType::FivePlusGoals => goals_at_least(5, scoregrid),
        MarketType::GoalRange(range) => goal_range(*range, scoregrid),
        MarketType::HalfTimeResult(_)
        | MarketType::HalfTimeOver(_)
        | MarketType::HalfTimeBtts
        | MarketType::DoubleResult(_, _)
        | MarketType::BttsBothHalves => return None,
    };
    Some(prob)
}

#[cfg(test)]
mod tests;
