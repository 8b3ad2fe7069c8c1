use super::*;
use assert_float_eq::*;

fn create_test_4x4_scoregrid() -> Matrix {
    let mut scoregrid = Matrix::allocate(4, 4);
    scoregrid.row_slice_mut(0).copy_from_slice(&[0.04, 0.03, 0.02, 0.01]);
    scoregrid.row_slice_mut(1).copy_from_slice(&[0.08, 0.06, 0.04, 0.02]);
    scoregrid.row_slice_mut(2).copy_from_slice(&[0.12, 0.09, 0.06, 0.03]);
    scoregrid.row_slice_mut(3).copy_from_slice(&[0.16, 0.12, 0.08, 0.04]);
    scoregrid
}

#[test]
fn win_and_draw_gather() {
    let scoregrid = create_test_4x4_scoregrid();
    assert_float_absolute_eq!(0.65, win(Side::Home, &scoregrid));
    assert_float_absolute_eq!(0.15, win(Side::Away, &scoregrid));
    assert_float_absolute_eq!(0.2, draw(&scoregrid));
}

#[test]
fn double_chance_gather() {
    let scoregrid = create_test_4x4_scoregrid();
    assert_float_absolute_eq!(0.85, double_chance(DoubleChance::HomeOrDraw, &scoregrid));
    assert_float_absolute_eq!(0.80, double_chance(DoubleChance::HomeOrAway, &scoregrid));
    assert_float_absolute_eq!(0.35, double_chance(DoubleChance::DrawOrAway, &scoregrid));
}

#[test]
fn totals_gather() {
    let scoregrid = create_test_4x4_scoregrid();
    assert_float_absolute_eq!(0.65, goals_over(2, &scoregrid));
    assert_float_absolute_eq!(0.35, goals_under(2, &scoregrid));
    assert_float_absolute_eq!(1.0, goals_over(2, &scoregrid) + goals_under(2, &scoregrid));
}

#[test]
fn btts_gather() {
    let scoregrid = create_test_4x4_scoregrid();
    assert_float_absolute_eq!(0.54, btts(&scoregrid));
}

#[test]
fn correct_score_gather() {
    let scoregrid = create_test_4x4_scoregrid();
    assert_float_absolute_eq!(0.09, correct_score(&Score::new(2, 1), &scoregrid));
    assert_float_absolute_eq!(0.0, correct_score(&Score::new(9, 9), &scoregrid));
}

#[test]
fn exact_and_at_least_gather() {
    let scoregrid = create_test_4x4_scoregrid();
    assert_float_absolute_eq!(0.30, exact_goals(3, &scoregrid));
    assert_float_absolute_eq!(0.15, goals_at_least(5, &scoregrid));
}

#[test]
fn goal_range_gather() {
    let scoregrid = create_test_4x4_scoregrid();
    assert_float_absolute_eq!(0.5, goal_range(GoalRange::TwoToThree, &scoregrid));
    assert_float_absolute_eq!(0.15, goal_range(GoalRange::ZeroToOne, &scoregrid));
}

#[test]
fn odd_even_gather() {
    let scoregrid = create_test_4x4_scoregrid();
    assert_float_absolute_eq!(0.48, even_total(&scoregrid));
    assert_float_absolute_eq!(0.52, odd_total(&scoregrid));
}

#[test]
fn win_to_nil_gather() {
    let scoregrid = create_test_4x4_scoregrid();
    assert_float_absolute_eq!(0.36, win_to_nil(Side::Home, &scoregrid));
    assert_float_absolute_eq!(0.06, win_to_nil(Side::Away, &scoregrid));
}

#[test]
fn asian_handicap_gather() {
    let scoregrid = create_test_4x4_scoregrid();
    assert_float_absolute_eq!(0.65, asian_handicap(Side::Home, AhLine::Half, &scoregrid));
    // -1.0: win 0.40, push 0.25, half of push surfaces
    assert_float_absolute_eq!(0.525, asian_handicap(Side::Home, AhLine::One, &scoregrid));
    assert_float_absolute_eq!(0.40, asian_handicap(Side::Home, AhLine::OneAndHalf, &scoregrid));
    assert_float_absolute_eq!(0.28, asian_handicap(Side::Home, AhLine::Two, &scoregrid));
    assert_float_absolute_eq!(0.15, asian_handicap(Side::Away, AhLine::Half, &scoregrid));
    assert_float_absolute_eq!(0.10, asian_handicap(Side::Away, AhLine::One, &scoregrid));
}

#[test]
fn poisson_grid_is_normalised() {
    let scoregrid = build(1.9, 1.9, 0.0, 8);
    assert_float_absolute_eq!(1.0, scoregrid.flatten().sum(), 1e-9);
    let one_x_two =
        win(Side::Home, &scoregrid) + draw(&scoregrid) + win(Side::Away, &scoregrid);
    assert_float_absolute_eq!(1.0, one_x_two, 1e-9);
    assert_float_absolute_eq!(
        1.0,
        btts(&scoregrid) + market_prob(&MarketType::BttsNo, &scoregrid).unwrap(),
        1e-9
    );
    assert_float_absolute_eq!(
        1.0,
        odd_total(&scoregrid) + even_total(&scoregrid),
        1e-9
    );
}

#[test]
fn odd_even_matches_closed_form() {
    let (home_rate, away_rate) = (1.0, 1.0);
    let identity = poisson::even_total_prob(home_rate + away_rate);
    // a 12-a-side grid truncates so little mass that the identity holds to 1e-9
    let wide = build(home_rate, away_rate, 0.0, 12);
    assert_float_absolute_eq!(identity, even_total(&wide), 1e-9);
    // the production 8-a-side grid carries ~1e-7 of truncation error
    let production = build(home_rate, away_rate, 0.0, 8);
    assert_float_absolute_eq!(identity, even_total(&production), 1e-6);
}

#[test]
fn win_to_nil_partitions_the_win() {
    let scoregrid = build(1.6, 1.1, 0.0, 7);
    let mut win_not_to_nil = 0.0;
    for row in 1..scoregrid.rows() {
        for col in 1..row {
            win_not_to_nil += scoregrid[(row, col)];
        }
    }
    assert_float_absolute_eq!(
        win(Side::Home, &scoregrid),
        win_to_nil(Side::Home, &scoregrid) + win_not_to_nil,
        1e-12
    );
}

#[test]
fn expectations_recover_rates() {
    let scoregrid = build(1.4, 1.1, 0.0, 8);
    let (home_expectation, away_expectation) = home_away_expectations(&scoregrid);
    // truncation at 8 goals a side loses a sliver of mass
    assert_float_absolute_eq!(1.4, home_expectation, 1e-3);
    assert_float_absolute_eq!(1.1, away_expectation, 1e-3);
}

#[test]
fn correlation_tilt_raises_goalless_and_renormalises() {
    let mut scoregrid = build(1.9, 1.9, 0.0, 7);
    let before = scoregrid[(0, 0)];
    let high_before = goals_at_least(6, &scoregrid);
    apply_correlation(0.01, 0.97, 6, &mut scoregrid);
    assert!(scoregrid[(0, 0)] > before);
    assert!(goals_at_least(6, &scoregrid) < high_before);
    assert_float_absolute_eq!(1.0, scoregrid.flatten().sum(), 1e-9);
}

#[test]
fn non_finite_cells_are_clamped() {
    // a zero home rate with a positive common rate makes the pmf blow up on
    // home-scoring cells; those cells must come out as zero, not NaN
    let scoregrid = build(0.0, 1.0, 0.1, 6);
    for &cell in scoregrid.flatten() {
        assert!(cell.is_finite());
        assert!(cell >= 0.0);
    }
    assert_float_absolute_eq!(1.0, scoregrid.flatten().sum(), 1e-9);
}

#[test]
fn top_scores_ranked_and_deterministic() {
    let scoregrid = build(2.0, 1.0, 0.0, 7);
    let ranked = top_scores(&scoregrid, 10);
    assert_eq!(10, ranked.len());
    for window in ranked.windows(2) {
        assert!(window[0].1 >= window[1].1);
    }
    // P(1-0) and P(2-0) tie exactly under these rates; scoreline order breaks it
    let tie_first = ranked
        .iter()
        .position(|(score, _)| *score == Score::new(1, 0))
        .unwrap();
    let tie_second = ranked
        .iter()
        .position(|(score, _)| *score == Score::new(2, 0))
        .unwrap();
    assert!(tie_first < tie_second);
}

#[test]
fn market_prob_dispatch() {
    let scoregrid = create_test_4x4_scoregrid();
    assert_float_absolute_eq!(
        0.65,
        market_prob(&MarketType::Result(MatchResult::Home), &scoregrid).unwrap()
    );
    assert_float_absolute_eq!(
        0.54,
        market_prob(&MarketType::BttsYes, &scoregrid).unwrap()
    );
    assert_eq!(None, market_prob(&MarketType::HalfTimeBtts, &scoregrid));
    assert_eq!(
        None,
        market_prob(
            &MarketType::DoubleResult(MatchResult::Draw, MatchResult::Home),
            &scoregrid
        )
    );
}
