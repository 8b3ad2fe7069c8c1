//! One-pass prefetch of everything a match's evaluations could need. Layer
//! evaluators never touch the store; they read this bag of optional records.
//! Absent entries stay absent; evaluators distinguish "no data" from a
//! neutral reading.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::domain::{MarketType, Side};
use crate::store::{
    H2hRecord, MarketProfile, RealityCheck, RefereeProfile, SharpMoney, Store, StoreError,
    TacticalCell, TeamClass, TeamIntelligence, TeamMomentum, TrapEntry,
};

#[derive(Debug, Clone)]
pub struct MatchContext {
    pub home: String,
    pub away: String,
    pub match_id: String,
    pub league: String,
    pub referee: Option<String>,
    pub home_intelligence: Option<TeamIntelligence>,
    pub away_intelligence: Option<TeamIntelligence>,
    pub home_class: Option<TeamClass>,
    pub away_class: Option<TeamClass>,
    pub home_momentum: Option<TeamMomentum>,
    pub away_momentum: Option<TeamMomentum>,
    pub tactical_cell: Option<TacticalCell>,
    pub referee_profile: Option<RefereeProfile>,
    pub head_to_head: Option<H2hRecord>,
    pub reality: Option<RealityCheck>,
    pub sharp_money: Vec<SharpMoney>,
    pub home_market_profile: Option<MarketProfile>,
    pub away_market_profile: Option<MarketProfile>,
    pub home_traps: Vec<TrapEntry>,
    pub away_traps: Vec<TrapEntry>,
    /// Set when the trap table could not be read; every pick of the match is
    /// then held to at most a skip.
    pub traps_unreadable: bool,
}

impl MatchContext {
    pub fn intelligence(&self, side: Side) -> Option<&TeamIntelligence> {
        match side {
            Side::Home => self.home_intelligence.as_ref(),
            Side::Away => self.away_intelligence.as_ref(),
        }
    }

    pub fn class(&self, side: Side) -> Option<&TeamClass> {
        match side {
            Side::Home => self.home_class.as_ref(),
            Side::Away => self.away_class.as_ref(),
        }
    }

    pub fn momentum(&self, side: Side) -> Option<&TeamMomentum> {
        match side {
            Side::Home => self.home_momentum.as_ref(),
            Side::Away => self.away_momentum.as_ref(),
        }
    }

    pub fn market_profile(&self, side: Side) -> Option<&MarketProfile> {
        match side {
            Side::Home => self.home_market_profile.as_ref(),
            Side::Away => self.away_market_profile.as_ref(),
        }
    }

    pub fn traps(&self, side: Side) -> &[TrapEntry] {
        match side {
            Side::Home => &self.home_traps,
            Side::Away => &self.away_traps,
        }
    }

    /// Steam observation for a market: an exact label match when the feed
    /// carries one, otherwise the over-2.5 row stands in for any
    /// goals-favouring market (the liquid line sharps actually hit).
    pub fn steam_for(&self, market: &MarketType) -> Option<&SharpMoney> {
        let label = market.label();
        let exact = self
            .sharp_money
            .iter()
            .find(|row| row.market_type.eq_ignore_ascii_case(&label));
        if exact.is_some() {
            return exact;
        }
        if market.favours_goals() {
            return self
                .sharp_money
                .iter()
                .find(|row| row.market_type.eq_ignore_ascii_case("OVER_2.5"));
        }
        None
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct ContextKey {
    home: String,
    away: String,
    match_id: String,
}

struct LruCache {
    capacity: usize,
    order: VecDeque<ContextKey>,
    entries: FxHashMap<ContextKey, Arc<MatchContext>>,
}

impl LruCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            entries: FxHashMap::default(),
        }
    }

    fn get(&mut self, key: &ContextKey) -> Option<Arc<MatchContext>> {
        let hit = self.entries.get(key).cloned();
        if hit.is_some() {
            self.touch(key);
        }
        hit
    }

    fn put(&mut self, key: ContextKey, value: Arc<MatchContext>) {
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
            while self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.entries.remove(&evicted);
                }
            }
        } else {
            self.touch(&key);
        }
    }

    fn touch(&mut self, key: &ContextKey) {
        if let Some(position) = self.order.iter().position(|entry| entry == key) {
            self.order.remove(position);
            self.order.push_back(key.clone());
        }
    }
}

pub struct Prefetcher<'a> {
    store: &'a dyn Store,
    cache: Mutex<LruCache>,
}

impl<'a> Prefetcher<'a> {
    pub fn new(store: &'a dyn Store, cache_capacity: usize) -> Self {
        Self {
            store,
            cache: Mutex::new(LruCache::new(cache_capacity)),
        }
    }

    /// Loads every row the evaluators could need, in one pass. Idempotent and
    /// cached by (home, away, match id). A failed trap read is conservative,
    /// not fatal; any other store failure abandons the match.
    pub async fn prefetch(
        &self,
        home: &str,
        away: &str,
        match_id: &str,
        league: &str,
        referee: Option<&str>,
    ) -> Result<Arc<MatchContext>, StoreError> {
        let key = ContextKey {
            home: home.into(),
            away: away.into(),
            match_id: match_id.into(),
        };
        if let Some(hit) = self.cache.lock().expect("context cache poisoned").get(&key) {
            debug!("context cache hit for {match_id}");
            return Ok(hit);
        }

        let home_intelligence = self.store.team_intelligence(home).await?;
        let away_intelligence = self.store.team_intelligence(away).await?;
        let home_class = self.store.team_class(home).await?;
        let away_class = self.store.team_class(away).await?;
        let home_momentum = self.store.team_momentum(home).await?;
        let away_momentum = self.store.team_momentum(away).await?;

        let tactical_cell = match (
            home_intelligence.as_ref().and_then(|row| row.current_style.as_deref()),
            away_intelligence.as_ref().and_then(|row| row.current_style.as_deref()),
        ) {
            (Some(home_style), Some(away_style)) => {
                self.store.tactical_cell(home_style, away_style).await?
            }
            _ => None,
        };

        let referee_profile = match referee {
            Some(name) => match self.store.referee_profile(name, league).await? {
                Some(profile) => Some(profile),
                None => self.store.league_referee_average(league).await?,
            },
            None => self.store.league_referee_average(league).await?,
        };

        let head_to_head = self.store.head_to_head(home, away).await?;
        let reality = self.store.reality_check(match_id).await?;
        let sharp_money = self.store.sharp_money(match_id).await?;
        let home_market_profile = self.store.market_profile(home, Side::Home).await?;
        let away_market_profile = self.store.market_profile(away, Side::Away).await?;

        let (home_traps, away_traps, traps_unreadable) =
            match (self.store.active_traps(home).await, self.store.active_traps(away).await) {
                (Ok(home_traps), Ok(away_traps)) => (home_traps, away_traps, false),
                (home_result, away_result) => {
                    warn!(
                        "trap table unreadable for {match_id}; holding every pick to a skip \
                         (home: {}, away: {})",
                        describe(&home_result),
                        describe(&away_result)
                    );
                    (vec![], vec![], true)
                }
            };

        let context = Arc::new(MatchContext {
            home: home.into(),
            away: away.into(),
            match_id: match_id.into(),
            league: league.into(),
            referee: referee.map(Into::into),
            home_intelligence,
            away_intelligence,
            home_class,
            away_class,
            home_momentum,
            away_momentum,
            tactical_cell,
            referee_profile,
            head_to_head,
            reality,
            sharp_money,
            home_market_profile,
            away_market_profile,
            home_traps,
            away_traps,
            traps_unreadable,
        });
        self.cache
            .lock()
            .expect("context cache poisoned")
            .put(key, Arc::clone(&context));
        Ok(context)
    }
}

fn describe<T>(result: &Result<T, StoreError>) -> String {
    match result {
        Ok(_) => "ok".into(),
        Err(err) => err.to_string(),
    }
}
