//! Per-match orchestration: resolve names, prefetch the context, derive the
//! scoring rates and grids once, then evaluate every quoted market through
//! the trap filter, the layers, the composer, the voting heads and the gate,
//! recording one snapshot per decision and returning a ranked shortlist.

use std::cmp::Ordering;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compose::{self, MatchFlags, MlAssessment};
use crate::config::{Config, ValidationError};
use crate::consensus::{self, ConsensusConfig, ConsensusReport, ModelVote, VoteSignal};
use crate::context::{MatchContext, Prefetcher};
use crate::domain::{Action, MarketType, Pick, Side};
use crate::gate::{self, GateInput};
use crate::layers::{self, PickInput};
use crate::periods::PeriodModel;
use crate::probs;
use crate::resolve::NameResolver;
use crate::scoregrid;
use crate::snapshot;
use crate::store::{Store, StoreError};
use crate::trap;

/// Baseline scoring rates used when team intelligence is missing entirely.
const FALLBACK_HOME_RATE: f64 = 1.40;
const FALLBACK_AWAY_RATE: f64 = 1.15;
const MIN_RATE: f64 = 0.20;
const MAX_RATE: f64 = 3.50;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Store(#[from] StoreError),
}

/// The request boundary: a fixture, its quoted prices, and any out-of-band
/// assessments the caller carries.
#[derive(Debug, Clone)]
pub struct MatchInput {
    pub home_team: String,
    pub away_team: String,
    pub match_id: String,
    pub league: String,
    pub referee: Option<String>,
    pub quoted_prices: Vec<(MarketType, f64)>,
    pub ml: Option<MlAssessment>,
    pub flags: MatchFlags,
}

#[derive(Debug)]
pub struct MatchAnalysis {
    /// Picks better than a skip, ranked by (sweet spot, coverage, score),
    /// truncated to the configured shortlist size.
    pub shortlist: Vec<Pick>,
    /// The most probable scorelines, ranked, with their probabilities.
    pub scorelines: Vec<(crate::domain::Score, f64)>,
    /// How many markets were evaluated (and snapshotted).
    pub considered: usize,
    /// Set when the match was abandoned; the shortlist is then empty.
    pub abandoned: Option<String>,
}

impl MatchAnalysis {
    fn abandoned(reason: String) -> Self {
        Self {
            shortlist: vec![],
            scorelines: vec![],
            considered: 0,
            abandoned: Some(reason),
        }
    }
}

pub struct Engine<'a> {
    config: Config,
    store: &'a dyn Store,
    resolver: NameResolver,
    prefetcher: Prefetcher<'a>,
}

impl<'a> Engine<'a> {
    pub async fn new(config: Config, store: &'a dyn Store) -> Result<Engine<'a>, EngineError> {
        config.validate()?;
        let resolver = NameResolver::load(store).await?;
        let prefetcher = Prefetcher::new(store, config.context_cache_capacity);
        Ok(Self {
            config,
            store,
            resolver,
            prefetcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn analyze(&self, input: &MatchInput) -> MatchAnalysis {
        let home = self.resolver.best(&input.home_team);
        let away = self.resolver.best(&input.away_team);
        let referee = input.referee.as_deref().map(|name| self.resolver.best(name));
        debug!(
            "analyzing {home} vs {away} ({}) across {} markets",
            input.match_id,
            input.quoted_prices.len()
        );

        let ctx = match self
            .prefetcher
            .prefetch(&home, &away, &input.match_id, &input.league, referee.as_deref())
            .await
        {
            Ok(ctx) => ctx,
            Err(err) => {
                warn!("abandoning {}: {err}", input.match_id);
                return MatchAnalysis::abandoned(format!("context unavailable: {err}"));
            }
        };

        let (lambda_home, lambda_away, rate_warnings) = derive_rates(&ctx);
        let common = self
            .config
            .common_rate
            .min(lambda_home.min(lambda_away) * 0.3);
        let mut ft_grid = scoregrid::build(
            lambda_home - common,
            lambda_away - common,
            common,
            self.config.max_goals_per_side,
        );
        scoregrid::apply_correlation(
            self.config.zero_inflation,
            self.config.high_total_damp,
            self.config.high_total_from,
            &mut ft_grid,
        );
        let share = self.config.first_half_share_for(
            ctx.intelligence(Side::Home).and_then(|row| row.style()),
            ctx.intelligence(Side::Away).and_then(|row| row.style()),
        );
        let period_model = PeriodModel::build(lambda_home, lambda_away, share, &ft_grid);

        let mut offered = input.quoted_prices.clone();
        offered.sort_by(|(market_a, _), (market_b, _)| market_a.cmp(market_b));
        offered.dedup_by(|(market_a, _), (market_b, _)| market_a == market_b);

        let mut picks = Vec::with_capacity(offered.len());
        for (market, price) in &offered {
            let model_prob = scoregrid::market_prob(market, &ft_grid)
                .or_else(|| period_model.market_prob(market))
                .unwrap_or_default();
            let (pick, votes, report) = self.evaluate_market(
                market,
                *price,
                model_prob,
                &ctx,
                lambda_home,
                lambda_away,
                &rate_warnings,
                input,
            );
            let built = snapshot::build(&pick, &votes, &report, &ctx, &offered);
            match built {
                Ok((record, vote_rows)) => {
                    if let Err(err) = self.store.write_snapshot(&record, &vote_rows).await {
                        warn!("abandoning {}: snapshot write failed: {err}", input.match_id);
                        return MatchAnalysis::abandoned(format!("snapshot write failed: {err}"));
                    }
                }
                Err(err) => {
                    warn!("abandoning {}: snapshot serialization failed: {err}", input.match_id);
                    return MatchAnalysis::abandoned(format!("snapshot serialization failed: {err}"));
                }
            }
            picks.push(pick);
        }

        let considered = picks.len();
        let mut shortlist: Vec<Pick> = picks
            .into_iter()
            .filter(|pick| pick.action.rank() > Action::Skip.rank())
            .collect();
        shortlist.sort_by(|pick_a, pick_b| {
            pick_b
                .sweet_spot
                .cmp(&pick_a.sweet_spot)
                .then_with(|| {
                    pick_b
                        .data_coverage
                        .partial_cmp(&pick_a.data_coverage)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| {
                    pick_b
                        .final_score
                        .partial_cmp(&pick_a.final_score)
                        .unwrap_or(Ordering::Equal)
                })
        });
        shortlist.truncate(self.config.top_k);
        info!(
            "{}: {considered} markets considered, {} shortlisted",
            input.match_id,
            shortlist.len()
        );
        MatchAnalysis {
            shortlist,
            scorelines: scoregrid::top_scores(&ft_grid, self.config.correct_score_top_n),
            considered,
            abandoned: None,
        }
    }

    fn evaluate_market(
        &self,
        market: &MarketType,
        price: f64,
        model_prob: f64,
        ctx: &MatchContext,
        lambda_home: f64,
        lambda_away: f64,
        rate_warnings: &[String],
        input: &MatchInput,
    ) -> (Pick, Vec<ModelVote>, ConsensusReport) {
        let implied_prob = probs::implied(price);
        let edge = model_prob - implied_prob;

        if let Some(hit) = trap::check(market, ctx) {
            let mut reasons = vec![hit.reason];
            if let Some(alternative) = hit.alternative_market {
                reasons.push(format!("consider {alternative} instead"));
            }
            let pick = Pick {
                match_id: input.match_id.clone(),
                home: ctx.home.clone(),
                away: ctx.away.clone(),
                market: market.clone(),
                quoted_price: price,
                implied_prob,
                model_prob,
                edge,
                signals: vec![],
                base_score: 0.0,
                variance_factor: 1.0,
                risk_factor: 0.0,
                trend_factor: 1.0,
                ml_factor: 1.0,
                ml_bonus: 0.0,
                final_score: 0.0,
                data_coverage: 0.0,
                low_data: true,
                sweet_spot: false,
                trapped: true,
                action: Action::Veto,
                stake: 0.0,
                reasons,
                warnings: rate_warnings.to_vec(),
            };
            return (pick, vec![], ConsensusReport::empty());
        }

        let pick_input = PickInput {
            market,
            model_prob,
            quoted_price: price,
            edge,
            lambda_home,
            lambda_away,
        };
        let signals = layers::evaluate_all(&pick_input, ctx, &self.config);
        let data_coverage = layers::data_coverage(&signals);
        let risk = compose::risk_condition(ctx, &input.flags, data_coverage);
        let trend = compose::trend_factor(ctx.steam_for(market));
        let composition = compose::compose(
            &signals,
            risk,
            trend,
            input.ml.as_ref(),
            &self.config,
        );

        let votes = self.collect_votes(market, model_prob, implied_prob, edge, ctx, input.ml.as_ref());
        let report = consensus::evaluate(
            &votes,
            &ConsensusConfig {
                outlier_threshold: self.config.consensus_outlier_threshold,
                sigma_threshold: self.config.consensus_sigma_threshold,
                damping: self.config.consensus_damping,
            },
        );

        let decision = gate::decide(
            &GateInput {
                market,
                final_score: composition.final_score,
                edge,
                model_prob,
                quoted_price: price,
                data_coverage,
                consensus: &report,
                trapped: false,
                traps_unreadable: ctx.traps_unreadable,
                risk_factor: composition.risk_factor,
            },
            &self.config,
        );

        let mut reasons = decision.reasons.clone();
        if composition.risk_factor != 1.0 {
            reasons.push(format!(
                "risk: {} (x{:.2})",
                composition.risk_condition.describe(),
                composition.risk_factor
            ));
        }
        let mut warnings = rate_warnings.to_vec();
        for signal in &signals {
            warnings.extend(signal.warnings.iter().cloned());
        }

        let pick = Pick {
            match_id: input.match_id.clone(),
            home: ctx.home.clone(),
            away: ctx.away.clone(),
            market: market.clone(),
            quoted_price: price,
            implied_prob,
            model_prob,
            edge,
            signals,
            base_score: composition.base,
            variance_factor: composition.variance_factor,
            risk_factor: composition.risk_factor,
            trend_factor: composition.trend_factor,
            ml_factor: composition.ml_factor,
            ml_bonus: composition.ml_bonus,
            final_score: composition.final_score,
            data_coverage,
            low_data: decision.low_data,
            sweet_spot: decision.sweet_spot,
            trapped: false,
            action: decision.action,
            stake: decision.stake,
            reasons,
            warnings,
        };
        (pick, votes, report)
    }

    /// Wires the model heads whose inputs are present: the probability
    /// engine, the price-calibration read, the team-market fit, the style
    /// matchup, and the classifier.
    fn collect_votes(
        &self,
        market: &MarketType,
        model_prob: f64,
        implied_prob: f64,
        edge: f64,
        ctx: &MatchContext,
        ml: Option<&MlAssessment>,
    ) -> Vec<ModelVote> {
        let mut votes = vec![];
        let min_edge = self.config.min_edge(market);

        let (signal, confidence) = if edge >= 2.0 * min_edge {
            (VoteSignal::StrongBuy, 55.0 + (edge * 400.0).min(35.0))
        } else if edge >= min_edge {
            (VoteSignal::Buy, 50.0 + (edge * 300.0).min(25.0))
        } else if edge >= 0.0 {
            (VoteSignal::Hold, 45.0)
        } else {
            (VoteSignal::Sell, 50.0 + (-edge * 300.0).min(35.0))
        };
        votes.push(ModelVote {
            model: "probability_engine".into(),
            signal,
            confidence,
            market: market.clone(),
            probability: Some(model_prob),
            reason: format!("model {model_prob:.3} against implied {implied_prob:.3}"),
            weight: 1.5,
        });

        if implied_prob > 0.0 {
            let ratio = model_prob / implied_prob;
            let (signal, confidence) = if ratio >= 1.12 {
                (VoteSignal::Buy, 50.0 + ((ratio - 1.12) * 150.0).min(30.0))
            } else if ratio <= 0.92 {
                (VoteSignal::Sell, 50.0 + ((0.92 - ratio) * 150.0).min(30.0))
            } else {
                (VoteSignal::Hold, 42.0)
            };
            votes.push(ModelVote {
                model: "price_calibration".into(),
                signal,
                confidence,
                market: market.clone(),
                probability: None,
                reason: format!("fair-to-quoted ratio {ratio:.2}"),
                weight: 1.0,
            });
        }

        let label = market.label();
        let fit = [Side::Home, Side::Away]
            .iter()
            .filter_map(|&side| ctx.market_profile(side))
            .find(|profile| profile.best_market.eq_ignore_ascii_case(&label));
        let avoided = [Side::Home, Side::Away].iter().any(|&side| {
            ctx.market_profile(side).is_some_and(|profile| {
                profile
                    .avoid_markets
                    .as_ref()
                    .is_some_and(|avoid| avoid.iter().any(|m| m.eq_ignore_ascii_case(&label)))
            })
        });
        if let Some(profile) = fit {
            votes.push(ModelVote {
                model: "team_market_fit".into(),
                signal: VoteSignal::Buy,
                confidence: profile.confidence_score.clamp(0.0, 100.0),
                market: market.clone(),
                probability: None,
                reason: format!(
                    "{}'s best market, {:.0}% historically",
                    profile.team_name, profile.historical_success_rate
                ),
                weight: 1.2,
            });
        } else if avoided {
            votes.push(ModelVote {
                model: "team_market_fit".into(),
                signal: VoteSignal::Sell,
                confidence: 70.0,
                market: market.clone(),
                probability: None,
                reason: "market sits on an avoid list".into(),
                weight: 1.2,
            });
        }

        if let Some(cell) = ctx.tactical_cell.as_ref().filter(|cell| cell.is_reliable()) {
            let favoured = match market {
                MarketType::BttsYes => Some(cell.btts_prob),
                MarketType::BttsNo => Some(1.0 - cell.btts_prob),
                MarketType::Over(2) => Some(cell.over25_prob),
                MarketType::Under(2) => Some(cell.under25_prob),
                _ => None,
            };
            if let Some(rate) = favoured {
                let (signal, confidence) = if rate >= 0.55 {
                    (VoteSignal::Buy, 40.0 + rate * 40.0)
                } else if rate <= 0.42 {
                    (VoteSignal::Sell, 40.0 + (1.0 - rate) * 30.0)
                } else {
                    (VoteSignal::Hold, 40.0)
                };
                votes.push(ModelVote {
                    model: "style_matchup".into(),
                    signal,
                    confidence,
                    market: market.clone(),
                    probability: Some(rate),
                    reason: format!(
                        "{}/{} pairing rates this at {:.0}%",
                        cell.style_a,
                        cell.style_b,
                        rate * 100.0
                    ),
                    weight: 1.0,
                });
            }
        }

        if let Some(assessment) = ml {
            let signal = if assessment.confidence >= 60.0 {
                VoteSignal::Buy
            } else if assessment.confidence <= 40.0 {
                VoteSignal::Sell
            } else {
                VoteSignal::Hold
            };
            votes.push(ModelVote {
                model: "gradient_boost".into(),
                signal,
                confidence: assessment.confidence.clamp(0.0, 100.0),
                market: market.clone(),
                probability: assessment.probability,
                reason: "classifier head".into(),
                weight: 2.0,
            });
        }

        votes
    }
}

/// Scoring rates from team intelligence: the goals-based read and the
/// xG-based read averaged, tilted by the class gap, clamped to a sane band.
fn derive_rates(ctx: &MatchContext) -> (f64, f64, Vec<String>) {
    let (home, away) = match (ctx.intelligence(Side::Home), ctx.intelligence(Side::Away)) {
        (Some(home), Some(away)) => (home, away),
        _ => {
            return (
                FALLBACK_HOME_RATE,
                FALLBACK_AWAY_RATE,
                vec!["missing team intelligence; using baseline scoring rates".into()],
            )
        }
    };

    let goals_home = (home.goals_scored_avg(Side::Home) + away.goals_conceded_avg(Side::Away)) / 2.0;
    let goals_away = (away.goals_scored_avg(Side::Away) + home.goals_conceded_avg(Side::Home)) / 2.0;
    let xg_home = (home.xg_for_per_match + away.xg_against_per_match) / 2.0;
    let xg_away = (away.xg_for_per_match + home.xg_against_per_match) / 2.0;

    let mut lambda_home = (goals_home + xg_home) / 2.0;
    let mut lambda_away = (goals_away + xg_away) / 2.0;

    if let (Some(home_class), Some(away_class)) = (ctx.class(Side::Home), ctx.class(Side::Away)) {
        let tilt = ((home_class.power_index - away_class.power_index) / 200.0).clamp(-0.15, 0.15);
        lambda_home *= 1.0 + tilt;
        lambda_away *= 1.0 - tilt;
    }

    (
        lambda_home.clamp(MIN_RATE, MAX_RATE),
        lambda_away.clamp(MIN_RATE, MAX_RATE),
        vec![],
    )
}
