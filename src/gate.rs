//! Maps (score, edge, consensus, coverage, market) to an action tier and a
//! fractional-Kelly stake. Vetoes and skips take precedence over any score;
//! sub-minimum edges always zero the stake.

use crate::config::Config;
use crate::consensus::{ConsensusReport, Strength};
use crate::domain::{Action, MarketType};

#[derive(Debug, Clone)]
pub struct GateInput<'a> {
    pub market: &'a MarketType,
    pub final_score: f64,
    pub edge: f64,
    pub model_prob: f64,
    pub quoted_price: f64,
    pub data_coverage: f64,
    pub consensus: &'a ConsensusReport,
    pub trapped: bool,
    pub traps_unreadable: bool,
    pub risk_factor: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub stake: f64,
    pub low_data: bool,
    pub sweet_spot: bool,
    pub reasons: Vec<String>,
}

/// Fractional Kelly on a decimal price, clamped to [0, cap].
pub fn kelly_stake(model_prob: f64, price: f64, fraction: f64, cap: f64) -> f64 {
    let gain = price - 1.0;
    if gain <= 0.0 {
        return 0.0;
    }
    let full = (model_prob * gain - (1.0 - model_prob)) / gain;
    (full * fraction).clamp(0.0, cap)
}

pub fn decide(input: &GateInput, config: &Config) -> Decision {
    let sweet_spot = config.sweet_spot(input.market).contains(&input.quoted_price);
    let low_data = input.data_coverage < config.coverage_floor;
    let mut reasons = vec![];

    if input.trapped {
        reasons.push("vetoed by the trap list".into());
        return Decision {
            action: Action::Veto,
            stake: 0.0,
            low_data,
            sweet_spot,
            reasons,
        };
    }
    if input.risk_factor == 0.0 {
        reasons.push("critical risk factor zeroes the pick".into());
        return Decision {
            action: Action::Veto,
            stake: 0.0,
            low_data,
            sweet_spot,
            reasons,
        };
    }
    if input.traps_unreadable {
        reasons.push("trap table unreadable; holding to a skip".into());
        return Decision {
            action: Action::Skip,
            stake: 0.0,
            low_data,
            sweet_spot,
            reasons,
        };
    }

    let min_edge = config.min_edge(input.market);
    if input.edge < min_edge {
        reasons.push(format!(
            "edge {:.3} below the market minimum {:.3}",
            input.edge, min_edge
        ));
        return Decision {
            action: Action::Skip,
            stake: 0.0,
            low_data,
            sweet_spot,
            reasons,
        };
    }
    let floor = config.market_price_floor(input.market);
    if input.quoted_price < floor {
        reasons.push(format!(
            "price {:.2} below the market floor {floor:.2}",
            input.quoted_price
        ));
        return Decision {
            action: Action::Skip,
            stake: 0.0,
            low_data,
            sweet_spot,
            reasons,
        };
    }

    let tiers = &config.score_tiers;
    let mut action = if input.final_score >= tiers.strong_bet {
        Action::StrongBet
    } else if input.final_score >= tiers.bet {
        Action::Bet
    } else if input.final_score >= tiers.watch {
        Action::Watch
    } else {
        Action::Skip
    };

    if action == Action::StrongBet
        && (input.consensus.strength < Strength::Moderate || low_data)
    {
        reasons.push("top tier needs consensus and coverage; easing to a bet".into());
        action = Action::Bet;
    }
    if low_data && action != Action::Skip {
        reasons.push(format!(
            "low data: coverage {:.2} under {:.2}",
            input.data_coverage, config.coverage_floor
        ));
    }

    if !sweet_spot
        && input.quoted_price > *config.sweet_spot(input.market).end()
        && action.is_backable()
    {
        reasons.push(format!(
            "price {:.2} beyond the sweet spot; watching only",
            input.quoted_price
        ));
        action = Action::Watch;
    }

    let stake = if action.is_backable() {
        // conviction-scaled: the Kelly fraction is further shaded by the
        // final score, so a stronger composite backs a larger stake
        kelly_stake(
            input.model_prob,
            input.quoted_price,
            config.kelly_fraction,
            config.stake_cap,
        ) * (input.final_score / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };
    reasons.push(format!(
        "score {:.0} -> {action:?}, stake {:.2}% of bankroll",
        input.final_score,
        stake * 100.0
    ));

    Decision {
        action,
        stake,
        low_data,
        sweet_spot,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::ConsensusReport;
    use crate::domain::{MatchResult, Score};
    use assert_float_eq::*;

    fn moderate_consensus() -> ConsensusReport {
        crate::testing::consensus_fixture(Strength::Moderate)
    }

    fn input<'a>(market: &'a MarketType, consensus: &'a ConsensusReport) -> GateInput<'a> {
        GateInput {
            market,
            final_score: 65.0,
            edge: 0.05,
            model_prob: 0.58,
            quoted_price: 1.80,
            data_coverage: 0.8,
            consensus,
            trapped: false,
            traps_unreadable: false,
            risk_factor: 1.0,
        }
    }

    use crate::domain::MarketType;

    #[test]
    fn kelly_formula() {
        // p=0.55 at evens: full kelly 0.10, quartered to 0.025
        assert_float_absolute_eq!(0.025, kelly_stake(0.55, 2.0, 0.25, 0.05));
        // no edge
        assert_float_absolute_eq!(0.0, kelly_stake(0.40, 2.0, 0.25, 0.05));
        // cap binds
        assert_float_absolute_eq!(0.05, kelly_stake(0.90, 3.0, 1.0, 0.05));
        // degenerate price
        assert_float_absolute_eq!(0.0, kelly_stake(0.90, 1.0, 0.25, 0.05));
    }

    #[test]
    fn veto_takes_precedence() {
        let market = MarketType::Over(2);
        let consensus = moderate_consensus();
        let mut gate_input = input(&market, &consensus);
        gate_input.trapped = true;
        gate_input.final_score = 90.0;
        let decision = decide(&gate_input, &Config::default());
        assert_eq!(Action::Veto, decision.action);
        assert_float_absolute_eq!(0.0, decision.stake);
    }

    #[test]
    fn zero_risk_factor_vetoes() {
        let market = MarketType::Over(2);
        let consensus = moderate_consensus();
        let mut gate_input = input(&market, &consensus);
        gate_input.risk_factor = 0.0;
        let decision = decide(&gate_input, &Config::default());
        assert_eq!(Action::Veto, decision.action);
    }

    #[test]
    fn unreadable_traps_hold_to_a_skip() {
        let market = MarketType::Over(2);
        let consensus = moderate_consensus();
        let mut gate_input = input(&market, &consensus);
        gate_input.traps_unreadable = true;
        gate_input.final_score = 90.0;
        let decision = decide(&gate_input, &Config::default());
        assert_eq!(Action::Skip, decision.action);
        assert_float_absolute_eq!(0.0, decision.stake);
    }

    #[test]
    fn thin_edge_skips_and_zeroes_the_stake() {
        let market = MarketType::BttsYes;
        let consensus = moderate_consensus();
        let mut gate_input = input(&market, &consensus);
        gate_input.edge = 0.01;
        let decision = decide(&gate_input, &Config::default());
        assert_eq!(Action::Skip, decision.action);
        assert_float_absolute_eq!(0.0, decision.stake);
    }

    #[test]
    fn correct_score_needs_a_fatter_edge() {
        let market = MarketType::CorrectScore(Score::new(2, 1));
        let consensus = moderate_consensus();
        let mut gate_input = input(&market, &consensus);
        gate_input.quoted_price = 9.0;
        gate_input.edge = 0.05;
        let decision = decide(&gate_input, &Config::default());
        assert_eq!(Action::Skip, decision.action);
    }

    #[test]
    fn price_floor_skips() {
        let market = MarketType::DoubleChance(crate::domain::DoubleChance::HomeOrDraw);
        let consensus = moderate_consensus();
        let mut gate_input = input(&market, &consensus);
        gate_input.quoted_price = 1.10;
        let decision = decide(&gate_input, &Config::default());
        assert_eq!(Action::Skip, decision.action);
    }

    #[test]
    fn score_maps_to_tiers() {
        let market = MarketType::Over(2);
        let consensus = moderate_consensus();
        let config = Config::default();

        let mut gate_input = input(&market, &consensus);
        gate_input.final_score = 80.0;
        assert_eq!(Action::StrongBet, decide(&gate_input, &config).action);
        gate_input.final_score = 65.0;
        assert_eq!(Action::Bet, decide(&gate_input, &config).action);
        gate_input.final_score = 45.0;
        assert_eq!(Action::Watch, decide(&gate_input, &config).action);
        gate_input.final_score = 30.0;
        assert_eq!(Action::Skip, decide(&gate_input, &config).action);
    }

    #[test]
    fn top_tier_needs_consensus() {
        let market = MarketType::Over(2);
        let mut weak = moderate_consensus();
        weak.strength = Strength::Weak;
        let mut gate_input = input(&market, &weak);
        gate_input.final_score = 85.0;
        let decision = decide(&gate_input, &Config::default());
        assert_eq!(Action::Bet, decision.action);
    }

    #[test]
    fn low_coverage_labels_and_demotes_the_top_tier() {
        let market = MarketType::Over(2);
        let consensus = moderate_consensus();
        let mut gate_input = input(&market, &consensus);
        gate_input.final_score = 85.0;
        gate_input.data_coverage = 0.2;
        let decision = decide(&gate_input, &Config::default());
        assert!(decision.low_data);
        assert_eq!(Action::Bet, decision.action);
    }

    #[test]
    fn long_price_caps_the_action_at_watch() {
        let market = MarketType::Result(MatchResult::Home);
        let consensus = moderate_consensus();
        let mut gate_input = input(&market, &consensus);
        gate_input.final_score = 70.0;
        gate_input.quoted_price = 6.5;
        gate_input.model_prob = 0.20;
        gate_input.edge = 0.046;
        let decision = decide(&gate_input, &Config::default());
        assert_eq!(Action::Watch, decision.action);
        assert!(!decision.sweet_spot);
        assert_float_absolute_eq!(0.0, decision.stake);
    }

    #[test]
    fn backable_pick_earns_a_stake() {
        let market = MarketType::BttsYes;
        let consensus = moderate_consensus();
        let mut gate_input = input(&market, &consensus);
        gate_input.quoted_price = 1.65;
        gate_input.model_prob = 0.64;
        gate_input.edge = gate_input.model_prob - 1.0 / 1.65;
        let decision = decide(&gate_input, &Config::default());
        assert_eq!(Action::Bet, decision.action);
        assert!(decision.stake > 0.0);
        assert!(decision.stake <= Config::default().stake_cap);
        assert!(decision.sweet_spot);
    }
}
