//! Half-time derivations. A first-half share parameter splits the full-time
//! scoring rates into per-half components; a smaller score matrix per half
//! prices the half-time markets, and an iterative proportional fit reconciles
//! the nine half-time/full-time joint outcomes with both sets of marginals.

use crate::domain::{MarketType, MatchResult};
use crate::linear::Matrix;
use crate::probs::SliceExt;
use crate::scoregrid;

/// Goals per side tracked in the half matrices. Halves rarely see more.
pub const MAX_HALF_GOALS: u8 = 5;

/// Second-half transition probabilities P(full-time | half-time lead),
/// seeded from long-run top-league outcomes before marginal reconciliation.
const HT_TO_FT: [[f64; 3]; 3] = [
    [0.80, 0.14, 0.06], // leading at the break
    [0.35, 0.36, 0.29], // level at the break
    [0.07, 0.16, 0.77], // trailing at the break
];

const FIT_TOLERANCE: f64 = 1e-9;
const MAX_FIT_SWEEPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRates {
    pub h1_home: f64,
    pub h1_away: f64,
    pub h2_home: f64,
    pub h2_away: f64,
}

pub fn split_rates(home_rate: f64, away_rate: f64, first_half_share: f64) -> SplitRates {
    SplitRates {
        h1_home: home_rate * first_half_share,
        h1_away: away_rate * first_half_share,
        h2_home: home_rate * (1.0 - first_half_share),
        h2_away: away_rate * (1.0 - first_half_share),
    }
}

/// The per-half matrices and the reconciled half-time/full-time joint table,
/// built once per fixture alongside the full-time grid.
pub struct PeriodModel {
    pub h1_grid: Matrix,
    pub h2_grid: Matrix,
    /// 3x3, rows = half-time result, columns = full-time result, both in
    /// home/draw/away order.
    pub double_result: Matrix,
}

impl PeriodModel {
    pub fn build(
        home_rate: f64,
        away_rate: f64,
        first_half_share: f64,
        ft_grid: &Matrix,
    ) -> Self {
        let rates = split_rates(home_rate, away_rate, first_half_share);
        let size = MAX_HALF_GOALS as usize + 1;
        let mut h1_grid = Matrix::allocate(size, size);
        scoregrid::from_bivariate_poisson(rates.h1_home, rates.h1_away, 0.0, &mut h1_grid);
        let mut h2_grid = Matrix::allocate(size, size);
        scoregrid::from_bivariate_poisson(rates.h2_home, rates.h2_away, 0.0, &mut h2_grid);

        let ht_marginal = result_marginal(&h1_grid);
        let ft_marginal = result_marginal(ft_grid);
        let double_result = fit_double_result(&ht_marginal, &ft_marginal);

        Self {
            h1_grid,
            h2_grid,
            double_result,
        }
    }

    /// Model probability of a period-dependent market; `None` for full-time
    /// markets, which gather from the full-time grid directly.
    pub fn market_prob(&self, market: &MarketType) -> Option<f64> {
        let prob = match market {
            MarketType::HalfTimeResult(result) => scoregrid::result(*result, &self.h1_grid),
            MarketType::HalfTimeOver(line) => scoregrid::goals_over(*line, &self.h1_grid),
            MarketType::HalfTimeBtts => scoregrid::btts(&self.h1_grid),
            MarketType::DoubleResult(ht, ft) => {
                self.double_result[(result_index(*ht), result_index(*ft))]
            }
            MarketType::BttsBothHalves => {
                scoregrid::btts(&self.h1_grid) * scoregrid::btts(&self.h2_grid)
            }
            _ => return None,
        };
        Some(prob)
    }
}

fn result_index(result: MatchResult) -> usize {
    match result {
        MatchResult::Home => 0,
        MatchResult::Draw => 1,
        MatchResult::Away => 2,
    }
}

fn result_marginal(grid: &Matrix) -> [f64; 3] {
    let mut marginal = [
        scoregrid::result(MatchResult::Home, grid),
        scoregrid::result(MatchResult::Draw, grid),
        scoregrid::result(MatchResult::Away, grid),
    ];
    marginal.normalise(1.0);
    marginal
}

/// Seeds the joint table from the transition matrix, then sweeps rows and
/// columns until both marginals are met within tolerance.
fn fit_double_result(ht_marginal: &[f64; 3], ft_marginal: &[f64; 3]) -> Matrix {
    let mut joint = Matrix::allocate(3, 3);
    for ht in 0..3 {
        for ft in 0..3 {
            joint[(ht, ft)] = ht_marginal[ht] * HT_TO_FT[ht][ft];
        }
    }
    joint.flatten_mut().normalise(1.0);

    for _ in 0..MAX_FIT_SWEEPS {
        for ht in 0..3 {
            let sum = joint.row_sum(ht);
            if sum > 0.0 {
                let factor = ht_marginal[ht] / sum;
                joint.row_slice_mut(ht).scale(factor);
            }
        }
        for ft in 0..3 {
            let sum = joint.col_sum(ft);
            if sum > 0.0 {
                let factor = ft_marginal[ft] / sum;
                for ht in 0..3 {
                    joint[(ht, ft)] *= factor;
                }
            }
        }
        if marginal_deviation(&joint, ht_marginal, ft_marginal) < FIT_TOLERANCE {
            break;
        }
    }
    joint
}

fn marginal_deviation(joint: &Matrix, ht_marginal: &[f64; 3], ft_marginal: &[f64; 3]) -> f64 {
    let mut deviation: f64 = 0.0;
    for index in 0..3 {
        deviation = deviation.max((joint.row_sum(index) - ht_marginal[index]).abs());
        deviation = deviation.max((joint.col_sum(index) - ft_marginal[index]).abs());
    }
    deviation
}
