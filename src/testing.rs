//! Shared fixtures: an in-memory store stub and pre-built contexts, rows and
//! picks used across the crate's tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

use crate::consensus::ConsensusReport;
use crate::context::MatchContext;
use crate::domain::{Action, MarketType, Pick, Side};
use crate::layers::PickInput;
use crate::snapshot::{SnapshotRecord, VoteRecord};
use crate::store::{
    H2hRecord, MarketProfile, NameMapping, RealityCheck, RefereeProfile, SharpMoney, Store,
    StoreError, TacticalCell, TeamClass, TeamIntelligence, TeamMomentum, TrapEntry,
};

pub fn intelligence_fixture(team: &str) -> TeamIntelligence {
    TeamIntelligence {
        team_name: team.into(),
        current_style: Some("possession".into()),
        home_over25: 0.61,
        home_btts: 0.58,
        home_goals_scored_avg: 1.9,
        home_goals_conceded_avg: 1.1,
        home_clean_sheet_rate: 0.32,
        away_over25: 0.57,
        away_btts: 0.56,
        away_goals_scored_avg: 1.6,
        away_goals_conceded_avg: 1.3,
        away_clean_sheet_rate: 0.25,
        btts_tendency: 0.57,
        goals_tendency: 0.6,
        xg_for_per_match: 1.8,
        xg_against_per_match: 1.2,
        overperformance_goals: 0.1,
    }
}

pub fn class_fixture(team: &str) -> TeamClass {
    TeamClass {
        team_name: team.into(),
        tier: "A".into(),
        power_index: 80.0,
        attack_rating: 76.0,
        defense_rating: 68.0,
        playing_style: Some("possession".into()),
        big_game_factor: 1.15,
        star_players: Some(vec!["number nine".into(), "playmaker".into()]),
    }
}

pub fn momentum_fixture(team: &str) -> TeamMomentum {
    TeamMomentum {
        team_name: team.into(),
        momentum_score: 68.0,
        goals_scored_last_5: 10,
        goals_conceded_last_5: 6,
        form_last_5: Some("WWDWL".into()),
        key_player_absent: false,
        coach_under_pressure: false,
        new_coach_bounce: false,
    }
}

pub fn tactical_cell_fixture() -> TacticalCell {
    TacticalCell {
        style_a: "possession".into(),
        style_b: "possession".into(),
        btts_prob: 0.58,
        over25_prob: 0.58,
        under25_prob: 0.42,
        clean_sheet_prob: 0.24,
        avg_total_goals: 2.9,
        sample_size: 25,
        confidence_level: "high".into(),
    }
}

pub fn referee_fixture() -> RefereeProfile {
    RefereeProfile {
        referee_name: "m oliver".into(),
        league: "premier-league".into(),
        avg_goals_per_game: 2.8,
        under_over_tendency: "over".into(),
        home_bias_factor: 1.05,
    }
}

pub fn h2h_fixture() -> H2hRecord {
    H2hRecord {
        team_a: "arsenal".into(),
        team_b: "chelsea".into(),
        total_matches: 8,
        btts_pct: 62.0,
        over25_pct: 58.0,
        avg_total_goals: 3.1,
        last3_btts: Some(vec![true, true, true]),
    }
}

pub fn market_profile_fixture(team: &str, location: &str, best: &str) -> MarketProfile {
    MarketProfile {
        team_name: team.into(),
        location: location.into(),
        best_market: best.into(),
        confidence_score: 72.0,
        historical_success_rate: 61.0,
        avoid_markets: None,
    }
}

pub fn sharp_money_fixture() -> SharpMoney {
    SharpMoney {
        match_id: "m-1".into(),
        market_type: "OVER_2.5".into(),
        opening_odds: 1.95,
        current_odds: 1.81,
        closing_odds: None,
        movement_pct: 7.0,
        movement_direction: "shortening".into(),
        is_sharp_move: true,
    }
}

pub fn reality_fixture() -> RealityCheck {
    RealityCheck {
        match_id: "m-1".into(),
        convergence_status: "CONVERGED".into(),
        reality_score: 78.0,
    }
}

pub fn trap_fixture(team: &str, market: &str, level: &str) -> TrapEntry {
    TrapEntry {
        team_name: team.into(),
        market_type: market.into(),
        alert_level: level.into(),
        alert_reason: "public money piling onto a false price".into(),
        alternative_market: Some("UNDER_2.5".into()),
        is_active: true,
    }
}

/// A fully-populated context for arsenal vs chelsea.
pub fn context_fixture() -> MatchContext {
    MatchContext {
        home: "arsenal".into(),
        away: "chelsea".into(),
        match_id: "m-1".into(),
        league: "premier-league".into(),
        referee: Some("m oliver".into()),
        home_intelligence: Some(intelligence_fixture("arsenal")),
        away_intelligence: Some(intelligence_fixture("chelsea")),
        home_class: Some(class_fixture("arsenal")),
        away_class: Some(class_fixture("chelsea")),
        home_momentum: Some(momentum_fixture("arsenal")),
        away_momentum: Some(momentum_fixture("chelsea")),
        tactical_cell: Some(tactical_cell_fixture()),
        referee_profile: Some(referee_fixture()),
        head_to_head: Some(h2h_fixture()),
        reality: Some(reality_fixture()),
        sharp_money: vec![sharp_money_fixture()],
        home_market_profile: Some(market_profile_fixture("arsenal", "home", "BTTS_YES")),
        away_market_profile: Some(market_profile_fixture("chelsea", "away", "OVER_2.5")),
        home_traps: vec![],
        away_traps: vec![],
        traps_unreadable: false,
    }
}

/// Momentum only; everything else absent.
pub fn sparse_context_fixture() -> MatchContext {
    MatchContext {
        home: "grimsby".into(),
        away: "harrogate".into(),
        match_id: "m-7".into(),
        league: "league-two".into(),
        referee: None,
        home_intelligence: None,
        away_intelligence: None,
        home_class: None,
        away_class: None,
        home_momentum: Some(momentum_fixture("grimsby")),
        away_momentum: Some(momentum_fixture("harrogate")),
        tactical_cell: None,
        referee_profile: None,
        head_to_head: None,
        reality: None,
        sharp_money: vec![],
        home_market_profile: None,
        away_market_profile: None,
        home_traps: vec![],
        away_traps: vec![],
        traps_unreadable: false,
    }
}

pub fn pick_input_fixture(market: &MarketType) -> PickInput<'_> {
    PickInput {
        market,
        model_prob: 0.58,
        quoted_price: 1.65,
        edge: 0.58 - 1.0 / 1.65,
        lambda_home: 1.9,
        lambda_away: 1.9,
    }
}

pub fn pick_fixture(market: MarketType) -> Pick {
    Pick {
        match_id: "m-1".into(),
        home: "arsenal".into(),
        away: "chelsea".into(),
        market,
        quoted_price: 1.65,
        implied_prob: 0.606060606060606,
        model_prob: 0.64,
        edge: 0.033939393939394,
        signals: vec![],
        base_score: 42.0,
        variance_factor: 1.0,
        risk_factor: 1.0,
        trend_factor: 1.05,
        ml_factor: 1.0,
        ml_bonus: 0.0,
        final_score: 63.0,
        data_coverage: 0.89,
        low_data: false,
        sweet_spot: true,
        trapped: false,
        action: Action::Bet,
        stake: 0.0125,
        reasons: vec!["fixture pick".into()],
        warnings: vec![],
    }
}

/// Consensus report fixture with the given strength.
pub fn consensus_fixture(strength: crate::consensus::Strength) -> ConsensusReport {
    ConsensusReport {
        positive: 4,
        total: 5,
        score: 62.0,
        mean_confidence: 61.0,
        std_dev: 4.0,
        divergence: crate::consensus::Divergence::Consensus { bonus: 1.0 },
        strength,
    }
}

/// In-memory `Store` with per-key read counters and optional failure
/// injection for the trap table.
#[derive(Default)]
pub struct StubStore {
    pub mappings: Vec<NameMapping>,
    pub intelligence: FxHashMap<String, TeamIntelligence>,
    pub classes: FxHashMap<String, TeamClass>,
    pub momentum: FxHashMap<String, TeamMomentum>,
    pub cells: Vec<TacticalCell>,
    pub referees: Vec<RefereeProfile>,
    pub h2h: Vec<H2hRecord>,
    pub profiles: Vec<MarketProfile>,
    pub traps: FxHashMap<String, Vec<TrapEntry>>,
    pub reality: FxHashMap<String, RealityCheck>,
    pub steam: FxHashMap<String, Vec<SharpMoney>>,
    pub fail_traps: bool,
    pub fail_intelligence: bool,
    pub written: Mutex<Vec<(SnapshotRecord, Vec<VoteRecord>)>>,
    pub settled: Mutex<Vec<(String, String, f64)>>,
    reads: Mutex<FxHashMap<String, usize>>,
}

impl StubStore {
    pub fn fully_loaded() -> Self {
        let mut store = Self::default();
        for team in ["arsenal", "chelsea", "liverpool", "everton"] {
            store
                .intelligence
                .insert(team.into(), intelligence_fixture(team));
            store.classes.insert(team.into(), class_fixture(team));
            store.momentum.insert(team.into(), momentum_fixture(team));
        }
        store.mappings = vec![
            NameMapping {
                source_name: "Arsenal FC".into(),
                canonical_name: "arsenal".into(),
                normalized_name: "arsenal".into(),
                is_verified: true,
            },
            NameMapping {
                source_name: "Chelsea FC".into(),
                canonical_name: "chelsea".into(),
                normalized_name: "chelsea".into(),
                is_verified: true,
            },
        ];
        store.cells = vec![tactical_cell_fixture()];
        store.referees = vec![referee_fixture()];
        store.h2h = vec![h2h_fixture()];
        store.profiles = vec![
            market_profile_fixture("arsenal", "home", "BTTS_YES"),
            market_profile_fixture("chelsea", "away", "OVER_2.5"),
        ];
        store.reality.insert("m-1".into(), reality_fixture());
        store.steam.insert("m-1".into(), vec![sharp_money_fixture()]);
        store
    }

    pub fn reads_of(&self, key: &str) -> usize {
        self.reads
            .lock()
            .expect("read counter poisoned")
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    fn bump(&self, key: String) {
        *self
            .reads
            .lock()
            .expect("read counter poisoned")
            .entry(key)
            .or_insert(0) += 1;
    }
}

#[async_trait]
impl Store for StubStore {
    async fn name_mappings(&self) -> Result<Vec<NameMapping>, StoreError> {
        Ok(self.mappings.clone())
    }

    async fn team_intelligence(&self, team: &str) -> Result<Option<TeamIntelligence>, StoreError> {
        self.bump(format!("team_intelligence:{team}"));
        if self.fail_intelligence {
            return Err(StoreError::Schema("team_intelligence unreadable".into()));
        }
        Ok(self.intelligence.get(team).cloned())
    }

    async fn team_class(&self, team: &str) -> Result<Option<TeamClass>, StoreError> {
        Ok(self.classes.get(team).cloned())
    }

    async fn team_momentum(&self, team: &str) -> Result<Option<TeamMomentum>, StoreError> {
        Ok(self.momentum.get(team).cloned())
    }

    async fn tactical_cell(
        &self,
        style_a: &str,
        style_b: &str,
    ) -> Result<Option<TacticalCell>, StoreError> {
        Ok(self
            .cells
            .iter()
            .find(|cell| {
                (cell.style_a == style_a && cell.style_b == style_b)
                    || (cell.style_a == style_b && cell.style_b == style_a)
            })
            .cloned())
    }

    async fn referee_profile(
        &self,
        referee: &str,
        league: &str,
    ) -> Result<Option<RefereeProfile>, StoreError> {
        Ok(self
            .referees
            .iter()
            .find(|profile| profile.referee_name == referee && profile.league == league)
            .cloned())
    }

    async fn league_referee_average(
        &self,
        league: &str,
    ) -> Result<Option<RefereeProfile>, StoreError> {
        let in_league: Vec<&RefereeProfile> = self
            .referees
            .iter()
            .filter(|profile| profile.league == league)
            .collect();
        if in_league.is_empty() {
            return Ok(None);
        }
        let avg_goals = in_league
            .iter()
            .map(|profile| profile.avg_goals_per_game)
            .sum::<f64>()
            / in_league.len() as f64;
        let avg_bias = in_league
            .iter()
            .map(|profile| profile.home_bias_factor)
            .sum::<f64>()
            / in_league.len() as f64;
        Ok(Some(RefereeProfile {
            referee_name: "league-average".into(),
            league: league.into(),
            avg_goals_per_game: avg_goals,
            under_over_tendency: "neutral".into(),
            home_bias_factor: avg_bias,
        }))
    }

    async fn head_to_head(
        &self,
        team_a: &str,
        team_b: &str,
    ) -> Result<Option<H2hRecord>, StoreError> {
        Ok(self
            .h2h
            .iter()
            .find(|record| {
                (record.team_a == team_a && record.team_b == team_b)
                    || (record.team_a == team_b && record.team_b == team_a)
            })
            .cloned())
    }

    async fn market_profile(
        &self,
        team: &str,
        venue: Side,
    ) -> Result<Option<MarketProfile>, StoreError> {
        let location = match venue {
            Side::Home => "home",
            Side::Away => "away",
        };
        Ok(self
            .profiles
            .iter()
            .find(|profile| profile.team_name == team && profile.location == location)
            .cloned())
    }

    async fn active_traps(&self, team: &str) -> Result<Vec<TrapEntry>, StoreError> {
        if self.fail_traps {
            return Err(StoreError::Schema("market_traps unreadable".into()));
        }
        Ok(self.traps.get(team).cloned().unwrap_or_default())
    }

    async fn reality_check(&self, match_id: &str) -> Result<Option<RealityCheck>, StoreError> {
        Ok(self.reality.get(match_id).cloned())
    }

    async fn sharp_money(&self, match_id: &str) -> Result<Vec<SharpMoney>, StoreError> {
        Ok(self.steam.get(match_id).cloned().unwrap_or_default())
    }

    async fn write_snapshot(
        &self,
        snapshot: &SnapshotRecord,
        votes: &[VoteRecord],
    ) -> Result<(), StoreError> {
        self.written
            .lock()
            .expect("written log poisoned")
            .push((snapshot.clone(), votes.to_vec()));
        Ok(())
    }

    async fn settle_snapshot(
        &self,
        bet_id: &str,
        result: &str,
        profit_loss: f64,
        _vote_correctness: &[(String, bool)],
    ) -> Result<(), StoreError> {
        self.settled
            .lock()
            .expect("settled log poisoned")
            .push((bet_id.into(), result.into(), profit_loss));
        Ok(())
    }

    async fn prune_snapshots(&self, _older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(0)
    }
}
