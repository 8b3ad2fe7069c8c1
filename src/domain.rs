//! Entities shared across the engine: the closed market taxonomy, the layer
//! signal vocabulary, and the per-market decision object.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{EnumCount, EnumIter};
use thiserror::Error;

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Score {
    pub home: u8,
    pub away: u8,
}
impl Score {
    pub fn new(home: u8, away: u8) -> Self {
        Self { home, away }
    }

    pub fn nil_all() -> Self {
        Self { home: 0, away: 0 }
    }

    pub fn total(&self) -> u16 {
        self.home as u16 + self.away as u16
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchResult {
    Home,
    Draw,
    Away,
}
impl MatchResult {
    fn tag(&self) -> &'static str {
        match self {
            MatchResult::Home => "HOME",
            MatchResult::Draw => "DRAW",
            MatchResult::Away => "AWAY",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "HOME" => Some(MatchResult::Home),
            "DRAW" => Some(MatchResult::Draw),
            "AWAY" => Some(MatchResult::Away),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DoubleChance {
    HomeOrDraw,
    HomeOrAway,
    DrawOrAway,
}

/// Supported Asian handicap lines, always expressed as goals conceded by the
/// favoured side. `AhLine::One.value()` is −1.0.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AhLine {
    Half,
    One,
    OneAndHalf,
    Two,
}
impl AhLine {
    pub fn value(&self) -> f64 {
        match self {
            AhLine::Half => -0.5,
            AhLine::One => -1.0,
            AhLine::OneAndHalf => -1.5,
            AhLine::Two => -2.0,
        }
    }

    pub fn is_whole(&self) -> bool {
        matches!(self, AhLine::One | AhLine::Two)
    }

    fn tag(&self) -> &'static str {
        match self {
            AhLine::Half => "-0.5",
            AhLine::One => "-1.0",
            AhLine::OneAndHalf => "-1.5",
            AhLine::Two => "-2.0",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "-0.5" => Some(AhLine::Half),
            "-1.0" => Some(AhLine::One),
            "-1.5" => Some(AhLine::OneAndHalf),
            "-2.0" => Some(AhLine::Two),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GoalRange {
    ZeroToOne,
    TwoToThree,
    FourToSix,
    SevenPlus,
}
impl GoalRange {
    pub fn bounds(&self) -> (u16, u16) {
        match self {
            GoalRange::ZeroToOne => (0, 1),
            GoalRange::TwoToThree => (2, 3),
            GoalRange::FourToSix => (4, 6),
            GoalRange::SevenPlus => (7, u16::MAX),
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            GoalRange::ZeroToOne => "0_1",
            GoalRange::TwoToThree => "2_3",
            GoalRange::FourToSix => "4_6",
            GoalRange::SevenPlus => "7_PLUS",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "0_1" => Some(GoalRange::ZeroToOne),
            "2_3" => Some(GoalRange::TwoToThree),
            "4_6" => Some(GoalRange::FourToSix),
            "7_PLUS" => Some(GoalRange::SevenPlus),
            _ => None,
        }
    }
}

/// The closed set of offered markets. `Over(2)` reads as over 2.5 goals, the
/// same convention for `Under` and the half-time line.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum MarketType {
    Result(MatchResult),
    DoubleChance(DoubleChance),
    Over(u8),
    Under(u8),
    BttsYes,
    BttsNo,
    AsianHandicap(Side, AhLine),
    CorrectScore(Score),
    HalfTimeResult(MatchResult),
    HalfTimeOver(u8),
    HalfTimeBtts,
    DoubleResult(MatchResult, MatchResult),
    WinToNil(Side),
    OddGoals,
    EvenGoals,
    ExactGoals(u8),
    FivePlusGoals,
    GoalRange(GoalRange),
    BttsBothHalves,
}

impl MarketType {
    /// Stable wire/storage label; also the join key against the trap and
    /// market-profile tables.
    pub fn label(&self) -> String {
        match self {
            MarketType::Result(result) => result.tag().into(),
            MarketType::DoubleChance(dc) => match dc {
                DoubleChance::HomeOrDraw => "DC_1X".into(),
                DoubleChance::HomeOrAway => "DC_12".into(),
                DoubleChance::DrawOrAway => "DC_X2".into(),
            },
            MarketType::Over(line) => format!("OVER_{line}.5"),
            MarketType::Under(line) => format!("UNDER_{line}.5"),
            MarketType::BttsYes => "BTTS_YES".into(),
            MarketType::BttsNo => "BTTS_NO".into(),
            MarketType::AsianHandicap(side, line) => match side {
                Side::Home => format!("AH_HOME_{}", line.tag()),
                Side::Away => format!("AH_AWAY_{}", line.tag()),
            },
            MarketType::CorrectScore(score) => format!("CS_{}:{}", score.home, score.away),
            MarketType::HalfTimeResult(result) => format!("HT_{}", result.tag()),
            MarketType::HalfTimeOver(line) => format!("HT_OVER_{line}.5"),
            MarketType::HalfTimeBtts => "HT_BTTS_YES".into(),
            MarketType::DoubleResult(ht, ft) => format!("HTFT_{}_{}", ht.tag(), ft.tag()),
            MarketType::WinToNil(side) => match side {
                Side::Home => "WTN_HOME".into(),
                Side::Away => "WTN_AWAY".into(),
            },
            MarketType::OddGoals => "ODD".into(),
            MarketType::EvenGoals => "EVEN".into(),
            MarketType::ExactGoals(goals) => format!("EXACT_{goals}"),
            MarketType::FivePlusGoals => "GOALS_5_PLUS".into(),
            MarketType::GoalRange(range) => format!("RANGE_{}", range.tag()),
            MarketType::BttsBothHalves => "BTTS_BOTH_HALVES".into(),
        }
    }

    /// Markets priced off scoring restraint rather than goals; the gate holds
    /// these to a tighter minimum edge.
    pub fn is_defensive(&self) -> bool {
        matches!(
            self,
            MarketType::Under(_)
                | MarketType::BttsNo
                | MarketType::WinToNil(_)
                | MarketType::GoalRange(GoalRange::ZeroToOne)
        )
    }

    pub fn is_correct_score(&self) -> bool {
        matches!(self, MarketType::CorrectScore(_))
    }

    /// Markets whose pricing rewards goals; the steam and momentum layers
    /// treat these as the "over" direction.
    pub fn favours_goals(&self) -> bool {
        matches!(
            self,
            MarketType::Over(_)
                | MarketType::BttsYes
                | MarketType::FivePlusGoals
                | MarketType::BttsBothHalves
                | MarketType::HalfTimeOver(_)
                | MarketType::HalfTimeBtts
                | MarketType::GoalRange(GoalRange::FourToSix)
                | MarketType::GoalRange(GoalRange::SevenPlus)
        )
    }
}

impl Display for MarketType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketType::Result(MatchResult::Home) => write!(f, "Home win"),
            MarketType::Result(MatchResult::Draw) => write!(f, "Draw"),
            MarketType::Result(MatchResult::Away) => write!(f, "Away win"),
            MarketType::DoubleChance(DoubleChance::HomeOrDraw) => write!(f, "Double chance 1X"),
            MarketType::DoubleChance(DoubleChance::HomeOrAway) => write!(f, "Double chance 12"),
            MarketType::DoubleChance(DoubleChance::DrawOrAway) => write!(f, "Double chance X2"),
            MarketType::Over(line) => write!(f, "Over {line}.5 goals"),
            MarketType::Under(line) => write!(f, "Under {line}.5 goals"),
            MarketType::BttsYes => write!(f, "Both teams to score"),
            MarketType::BttsNo => write!(f, "Both teams to score: no"),
            MarketType::AsianHandicap(Side::Home, line) => {
                write!(f, "Home {}", line.tag())
            }
            MarketType::AsianHandicap(Side::Away, line) => {
                write!(f, "Away {}", line.tag())
            }
            MarketType::CorrectScore(score) => {
                write!(f, "Correct score {}-{}", score.home, score.away)
            }
            MarketType::HalfTimeResult(result) => write!(f, "Half-time {}", result.tag()),
            MarketType::HalfTimeOver(line) => write!(f, "Half-time over {line}.5"),
            MarketType::HalfTimeBtts => write!(f, "Both to score before half-time"),
            MarketType::DoubleResult(ht, ft) => {
                write!(f, "Half-time/full-time {}/{}", ht.tag(), ft.tag())
            }
            MarketType::WinToNil(Side::Home) => write!(f, "Home win to nil"),
            MarketType::WinToNil(Side::Away) => write!(f, "Away win to nil"),
            MarketType::OddGoals => write!(f, "Odd total goals"),
            MarketType::EvenGoals => write!(f, "Even total goals"),
            MarketType::ExactGoals(goals) => write!(f, "Exactly {goals} goals"),
            MarketType::FivePlusGoals => write!(f, "Five or more goals"),
            MarketType::GoalRange(range) => {
                let (lo, hi) = range.bounds();
                if hi == u16::MAX {
                    write!(f, "{lo}+ goals")
                } else {
                    write!(f, "{lo}-{hi} goals")
                }
            }
            MarketType::BttsBothHalves => write!(f, "Both teams to score in both halves"),
        }
    }
}

#[derive(Error, Debug)]
#[error("unsupported market label {0:?}")]
pub struct MarketParseError(String);

impl FromStr for MarketType {
    type Err = MarketParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MarketParseError(s.into());
        let label = s.trim().to_uppercase();
        if let Some(result) = MatchResult::from_tag(&label) {
            return Ok(MarketType::Result(result));
        }
        let parsed = match label.as_str() {
            "DC_1X" => Some(MarketType::DoubleChance(DoubleChance::HomeOrDraw)),
            "DC_12" => Some(MarketType::DoubleChance(DoubleChance::HomeOrAway)),
            "DC_X2" => Some(MarketType::DoubleChance(DoubleChance::DrawOrAway)),
            "BTTS_YES" => Some(MarketType::BttsYes),
            "BTTS_NO" => Some(MarketType::BttsNo),
            "HT_BTTS_YES" => Some(MarketType::HalfTimeBtts),
            "WTN_HOME" => Some(MarketType::WinToNil(Side::Home)),
            "WTN_AWAY" => Some(MarketType::WinToNil(Side::Away)),
            "ODD" => Some(MarketType::OddGoals),
            "EVEN" => Some(MarketType::EvenGoals),
            "GOALS_5_PLUS" => Some(MarketType::FivePlusGoals),
            "BTTS_BOTH_HALVES" => Some(MarketType::BttsBothHalves),
            _ => None,
        };
        if let Some(market) = parsed {
            return Ok(market);
        }
        if let Some(rest) = label.strip_prefix("HT_OVER_") {
            let line = parse_half_line(rest).ok_or_else(err)?;
            return Ok(MarketType::HalfTimeOver(line));
        }
        if let Some(rest) = label.strip_prefix("HT_") {
            let result = MatchResult::from_tag(rest).ok_or_else(err)?;
            return Ok(MarketType::HalfTimeResult(result));
        }
        if let Some(rest) = label.strip_prefix("OVER_") {
            let line = parse_half_line(rest).ok_or_else(err)?;
            return Ok(MarketType::Over(line));
        }
        if let Some(rest) = label.strip_prefix("UNDER_") {
            let line = parse_half_line(rest).ok_or_else(err)?;
            return Ok(MarketType::Under(line));
        }
        if let Some(rest) = label.strip_prefix("AH_HOME_") {
            let line = AhLine::from_tag(rest).ok_or_else(err)?;
            return Ok(MarketType::AsianHandicap(Side::Home, line));
        }
        if let Some(rest) = label.strip_prefix("AH_AWAY_") {
            let line = AhLine::from_tag(rest).ok_or_else(err)?;
            return Ok(MarketType::AsianHandicap(Side::Away, line));
        }
        if let Some(rest) = label.strip_prefix("CS_") {
            let (home, away) = rest.split_once(':').ok_or_else(err)?;
            let home = home.parse::<u8>().map_err(|_| err())?;
            let away = away.parse::<u8>().map_err(|_| err())?;
            return Ok(MarketType::CorrectScore(Score::new(home, away)));
        }
        if let Some(rest) = label.strip_prefix("HTFT_") {
            let (ht, ft) = rest.split_once('_').ok_or_else(err)?;
            let ht = MatchResult::from_tag(ht).ok_or_else(err)?;
            let ft = MatchResult::from_tag(ft).ok_or_else(err)?;
            return Ok(MarketType::DoubleResult(ht, ft));
        }
        if let Some(rest) = label.strip_prefix("EXACT_") {
            let goals = rest.parse::<u8>().map_err(|_| err())?;
            return Ok(MarketType::ExactGoals(goals));
        }
        if let Some(rest) = label.strip_prefix("RANGE_") {
            let range = GoalRange::from_tag(rest).ok_or_else(err)?;
            return Ok(MarketType::GoalRange(range));
        }
        Err(err())
    }
}

fn parse_half_line(tag: &str) -> Option<u8> {
    let (whole, frac) = tag.split_once('.')?;
    if frac != "5" {
        return None;
    }
    whole.parse::<u8>().ok()
}

impl Serialize for MarketType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for MarketType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(D::Error::custom)
    }
}

/// Team class tier, best to worst.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
    D,
}
impl Tier {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_uppercase().as_str() {
            "A" => Some(Tier::A),
            "B" => Some(Tier::B),
            "C" => Some(Tier::C),
            "D" => Some(Tier::D),
            _ => None,
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Tier::A => 0,
            Tier::B => 1,
            Tier::C => 2,
            Tier::D => 3,
        }
    }
}

/// Closed set of playing-style labels keyed into the tactical matrix.
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
    EnumCount,
)]
pub enum PlayingStyle {
    Possession,
    Direct,
    Counter,
    HighPress,
    Defensive,
    Chaotic,
    Balanced,
}
impl PlayingStyle {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "possession" => Some(PlayingStyle::Possession),
            "direct" => Some(PlayingStyle::Direct),
            "counter" => Some(PlayingStyle::Counter),
            "high_press" | "high-press" | "press" => Some(PlayingStyle::HighPress),
            "defensive" => Some(PlayingStyle::Defensive),
            "chaotic" => Some(PlayingStyle::Chaotic),
            "balanced" => Some(PlayingStyle::Balanced),
            _ => None,
        }
    }
}

/// The evaluators, in their fixed evaluation order.
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
    EnumCount,
)]
pub enum LayerKey {
    Tactical,
    TeamClass,
    ExpectedGoals,
    Momentum,
    HeadToHead,
    Referee,
    MarketProfile,
    Steam,
    RealityCheck,
}
impl Display for LayerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LayerKey::Tactical => "tactical",
            LayerKey::TeamClass => "team_class",
            LayerKey::ExpectedGoals => "xg",
            LayerKey::Momentum => "momentum",
            LayerKey::HeadToHead => "h2h",
            LayerKey::Referee => "referee",
            LayerKey::MarketProfile => "market_profile",
            LayerKey::Steam => "steam",
            LayerKey::RealityCheck => "reality_check",
        };
        write!(f, "{name}")
    }
}

/// One evaluator's verdict on a pick. The contribution is clamped to the
/// layer's configured weight; `consulted` is false when the layer's data was
/// absent, in which case the contribution is 0 and coverage is not inflated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerSignal {
    pub key: LayerKey,
    pub contribution: f64,
    pub reason: String,
    pub consulted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
impl LayerSignal {
    pub fn silent(key: LayerKey) -> Self {
        Self {
            key,
            contribution: 0.0,
            reason: "no data".into(),
            consulted: false,
            warnings: vec![],
        }
    }
}

#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    StrongBet,
    Bet,
    Watch,
    Skip,
    Veto,
}
impl Action {
    /// Higher is better; used by the orchestrator's shortlist filter.
    pub fn rank(&self) -> u8 {
        match self {
            Action::StrongBet => 4,
            Action::Bet => 3,
            Action::Watch => 2,
            Action::Skip => 1,
            Action::Veto => 0,
        }
    }

    pub fn is_backable(&self) -> bool {
        matches!(self, Action::Bet | Action::StrongBet)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettledResult {
    Win,
    Loss,
    Push,
    Void,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PickState {
    Trapped,
    Evaluated(Action),
}

/// The per-market decision object, assembled by the orchestrator and
/// persisted verbatim inside the snapshot blob.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub match_id: String,
    pub home: String,
    pub away: String,
    pub market: MarketType,
    pub quoted_price: f64,
    pub implied_prob: f64,
    pub model_prob: f64,
    pub edge: f64,
    pub signals: Vec<LayerSignal>,
    pub base_score: f64,
    pub variance_factor: f64,
    pub risk_factor: f64,
    pub trend_factor: f64,
    pub ml_factor: f64,
    pub ml_bonus: f64,
    pub final_score: f64,
    pub data_coverage: f64,
    pub low_data: bool,
    pub sweet_spot: bool,
    pub trapped: bool,
    pub action: Action,
    pub stake: f64,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
impl Pick {
    pub fn state(&self) -> PickState {
        if self.trapped {
            PickState::Trapped
        } else {
            PickState::Evaluated(self.action)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_markets() -> Vec<MarketType> {
        vec![
            MarketType::Result(MatchResult::Home),
            MarketType::Result(MatchResult::Draw),
            MarketType::DoubleChance(DoubleChance::DrawOrAway),
            MarketType::Over(2),
            MarketType::Under(3),
            MarketType::BttsYes,
            MarketType::BttsNo,
            MarketType::AsianHandicap(Side::Home, AhLine::OneAndHalf),
            MarketType::AsianHandicap(Side::Away, AhLine::Half),
            MarketType::CorrectScore(Score::new(2, 1)),
            MarketType::HalfTimeResult(MatchResult::Away),
            MarketType::HalfTimeOver(0),
            MarketType::HalfTimeBtts,
            MarketType::DoubleResult(MatchResult::Draw, MatchResult::Home),
            MarketType::WinToNil(Side::Home),
            MarketType::OddGoals,
            MarketType::EvenGoals,
            MarketType::ExactGoals(3),
            MarketType::FivePlusGoals,
            MarketType::GoalRange(GoalRange::TwoToThree),
            MarketType::BttsBothHalves,
        ]
    }

    #[test]
    fn label_parse_round_trip() {
        for market in sample_markets() {
            let label = market.label();
            let parsed: MarketType = label.parse().unwrap_or_else(|_| {
                panic!("label {label} failed to parse");
            });
            assert_eq!(market, parsed, "round trip via {label}");
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            MarketType::Over(2),
            "over_2.5".parse::<MarketType>().unwrap()
        );
        assert_eq!(MarketType::BttsYes, "btts_yes".parse::<MarketType>().unwrap());
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!("OVER_2.6".parse::<MarketType>().is_err());
        assert!("AH_HOME_-0.75".parse::<MarketType>().is_err());
        assert!("CS_21".parse::<MarketType>().is_err());
        assert!("LAY_THE_DRAW".parse::<MarketType>().is_err());
    }

    #[test]
    fn serde_uses_labels() {
        let market = MarketType::AsianHandicap(Side::Home, AhLine::One);
        let json = serde_json::to_string(&market).unwrap();
        assert_eq!("\"AH_HOME_-1.0\"", json);
        let back: MarketType = serde_json::from_str(&json).unwrap();
        assert_eq!(market, back);
    }

    #[test]
    fn defensive_and_goal_markets_disjoint() {
        for market in sample_markets() {
            assert!(
                !(market.is_defensive() && market.favours_goals()),
                "{market:?} cannot be both defensive and goal-favouring"
            );
        }
    }

    #[test]
    fn action_ranks() {
        assert!(Action::StrongBet.rank() > Action::Bet.rank());
        assert!(Action::Bet.rank() > Action::Watch.rank());
        assert!(Action::Watch.rank() > Action::Skip.rank());
        assert!(Action::Skip.rank() > Action::Veto.rank());
        assert!(Action::Bet.is_backable());
        assert!(!Action::Watch.is_backable());
    }

    #[test]
    fn pick_state_follows_trap_flag() {
        let mut pick = crate::testing::pick_fixture(MarketType::BttsYes);
        assert_eq!(PickState::Evaluated(pick.action), pick.state());
        pick.trapped = true;
        assert_eq!(PickState::Trapped, pick.state());
    }
}
