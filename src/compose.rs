//! Non-linear composition of layer signals into the final score. Layer
//! contributions add onto a base; disagreement between layers damps it; risk,
//! trend and classifier multipliers then scale it. The classifier acts as a
//! multiplier (plus a small capped nudge) so it can never double-count with
//! the additive layers.

use crate::config::Config;
use crate::context::MatchContext;
use crate::domain::{LayerSignal, Side};
use crate::probs::SliceExt;
use crate::store::{AlertLevel, Movement, SharpMoney};

const BASE_OFFSET: f64 = 10.0;
pub const MAX_SCORE: f64 = 99.0;

/// Blockers and boosts, ordered most severe first; exactly one applies per
/// pick. Each maps to a fixed multiplier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiskCondition {
    TeamBlacklisted,
    TopScorerAbsent,
    MultipleAbsences,
    CoachTurmoil,
    StarAbsent,
    SquadDisruption,
    ContinentalFatigue,
    CongestedSchedule,
    PoorDataQuality,
    ExtremeWeather,
    Clear,
    BigGameLift,
    HighStakesExcellentForm,
}

impl RiskCondition {
    pub fn multiplier(&self) -> f64 {
        match self {
            RiskCondition::TeamBlacklisted => 0.0,
            RiskCondition::TopScorerAbsent => 0.50,
            RiskCondition::MultipleAbsences => 0.55,
            RiskCondition::CoachTurmoil => 0.60,
            RiskCondition::StarAbsent => 0.70,
            RiskCondition::SquadDisruption => 0.75,
            RiskCondition::ContinentalFatigue => 0.85,
            RiskCondition::CongestedSchedule => 0.88,
            RiskCondition::PoorDataQuality => 0.92,
            RiskCondition::ExtremeWeather => 0.93,
            RiskCondition::Clear => 1.00,
            RiskCondition::BigGameLift => 1.03,
            RiskCondition::HighStakesExcellentForm => 1.05,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            RiskCondition::TeamBlacklisted => "team blacklisted",
            RiskCondition::TopScorerAbsent => "top scorer absent",
            RiskCondition::MultipleAbsences => "absences on both sides",
            RiskCondition::CoachTurmoil => "absence amid coaching turmoil",
            RiskCondition::StarAbsent => "key player absent",
            RiskCondition::SquadDisruption => "coach under pressure",
            RiskCondition::ContinentalFatigue => "midweek continental exertion",
            RiskCondition::CongestedSchedule => "congested schedule",
            RiskCondition::PoorDataQuality => "thin data",
            RiskCondition::ExtremeWeather => "extreme weather",
            RiskCondition::Clear => "no risk flags",
            RiskCondition::BigGameLift => "big-game pedigree",
            RiskCondition::HighStakesExcellentForm => "high stakes in excellent form",
        }
    }
}

/// Out-of-band fixture flags the tables do not carry. Absent flags simply
/// never trigger their conditions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchFlags {
    pub continental_fatigue: bool,
    pub congested_schedule: bool,
    pub extreme_weather: bool,
    pub high_stakes: bool,
}

/// Picks the single most severe applicable condition.
pub fn risk_condition(ctx: &MatchContext, flags: &MatchFlags, data_coverage: f64) -> RiskCondition {
    let blacklisted = [Side::Home, Side::Away].iter().any(|&side| {
        ctx.traps(side)
            .iter()
            .any(|entry| entry.is_active && entry.level() == Some(AlertLevel::Danger))
    });
    if blacklisted {
        return RiskCondition::TeamBlacklisted;
    }

    let home = ctx.momentum(Side::Home);
    let away = ctx.momentum(Side::Away);
    let home_absent = home.is_some_and(|row| row.key_player_absent);
    let away_absent = away.is_some_and(|row| row.key_player_absent);
    let absences = [(Side::Home, home, home_absent), (Side::Away, away, away_absent)];

    for (side, momentum, absent) in absences {
        if !absent {
            continue;
        }
        let stars_listed = ctx
            .class(side)
            .and_then(|row| row.star_players.as_ref())
            .is_some_and(|stars| !stars.is_empty());
        let struggling = momentum.is_some_and(|row| row.momentum_score < 50.0);
        if stars_listed && struggling {
            return RiskCondition::TopScorerAbsent;
        }
    }
    if home_absent && away_absent {
        return RiskCondition::MultipleAbsences;
    }
    for (_, momentum, absent) in absences {
        if absent && momentum.is_some_and(|row| row.coach_under_pressure) {
            return RiskCondition::CoachTurmoil;
        }
    }
    if home_absent || away_absent {
        return RiskCondition::StarAbsent;
    }
    if home.is_some_and(|row| row.coach_under_pressure)
        || away.is_some_and(|row| row.coach_under_pressure)
    {
        return RiskCondition::SquadDisruption;
    }
    if flags.continental_fatigue {
        return RiskCondition::ContinentalFatigue;
    }
    if flags.congested_schedule {
        return RiskCondition::CongestedSchedule;
    }
    if data_coverage < 0.35 {
        return RiskCondition::PoorDataQuality;
    }
    if flags.extreme_weather {
        return RiskCondition::ExtremeWeather;
    }

    // positive lift only once nothing adverse matched
    let excellent_form = home.is_some_and(|row| row.momentum_score >= 75.0)
        && away.is_some_and(|row| row.momentum_score >= 75.0);
    if flags.high_stakes && excellent_form {
        return RiskCondition::HighStakesExcellentForm;
    }
    let pedigree = [Side::Home, Side::Away].iter().all(|&side| {
        ctx.class(side).is_some_and(|row| row.big_game_factor >= 1.1)
    });
    if flags.high_stakes && pedigree {
        return RiskCondition::BigGameLift;
    }
    RiskCondition::Clear
}

/// Odds-drift multiplier from the dominant steam signal.
pub fn trend_factor(observation: Option<&SharpMoney>) -> f64 {
    match observation {
        Some(row) => match (row.direction(), row.is_sharp_move) {
            (Some(Movement::Shortening), true) => 1.05,
            (Some(Movement::Shortening), false) => 1.02,
            (Some(Movement::Drifting), true) => 0.85,
            (Some(Movement::Drifting), false) => 0.95,
            _ => 1.00,
        },
        None => 1.00,
    }
}

/// Classifier head output, produced out-of-band and supplied at the request
/// boundary when available.
#[derive(Debug, Clone, Copy)]
pub struct MlAssessment {
    /// In [0, 100].
    pub confidence: f64,
    pub probability: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Composition {
    pub base: f64,
    pub variance_factor: f64,
    pub risk_condition: RiskCondition,
    pub risk_factor: f64,
    pub trend_factor: f64,
    pub ml_factor: f64,
    pub ml_bonus: f64,
    pub final_score: f64,
}

pub fn compose(
    signals: &[LayerSignal],
    risk: RiskCondition,
    trend: f64,
    ml: Option<&MlAssessment>,
    config: &Config,
) -> Composition {
    let consulted: Vec<&LayerSignal> = signals.iter().filter(|signal| signal.consulted).collect();
    let base = BASE_OFFSET
        + consulted
            .iter()
            .map(|signal| signal.contribution)
            .sum::<f64>();

    // disagreement is judged on weight-normalised scores so a heavy layer and
    // a light layer saying the same thing do not register as variance
    let normalised: Vec<f64> = consulted
        .iter()
        .filter(|signal| config.weight(signal.key) > 0.0)
        .map(|signal| signal.contribution / config.weight(signal.key))
        .collect();
    let cv = normalised.coefficient_of_variation();
    let variance_factor = if cv > config.variance_penalty_threshold {
        (1.0 - (cv - config.variance_penalty_threshold) * 0.2)
            .clamp(config.variance_penalty_floor, 1.0)
    } else {
        1.0
    };

    let risk_factor = risk.multiplier();
    let (ml_factor, ml_bonus) = match ml {
        Some(assessment) => {
            let factor = config.ml_multiplier(assessment.confidence);
            let bonus = ((assessment.confidence - 50.0) / 50.0 * config.ml_bonus_cap)
                .clamp(-config.ml_bonus_cap, config.ml_bonus_cap);
            (factor, bonus)
        }
        None => (1.0, 0.0),
    };

    let scaled = (base * variance_factor * risk_factor * trend * ml_factor).min(MAX_SCORE);
    let final_score = (scaled + ml_bonus).clamp(0.0, MAX_SCORE);

    Composition {
        base,
        variance_factor,
        risk_condition: risk,
        risk_factor,
        trend_factor: trend,
        ml_factor,
        ml_bonus,
        final_score,
    }
}
