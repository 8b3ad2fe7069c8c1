use std::env;
use std::error::Error;
use std::path::PathBuf;

use anyhow::bail;
use chrono::{Duration, Utc};
use clap::Parser;
use rustc_hash::FxHashMap;
use stanza::renderer::console::Console;
use stanza::renderer::Renderer;
use tracing::{debug, info, warn};

use tifo::compose::{MatchFlags, MlAssessment};
use tifo::config::Config;
use tifo::domain::MarketType;
use tifo::engine::{Engine, MatchInput};
use tifo::print;
use tifo::store::{DbConfig, PgStore, Store};

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// home team, as the feed names it
    #[clap(long)]
    home: String,

    /// away team, as the feed names it
    #[clap(long)]
    away: String,

    /// fixture identifier shared with the data tables
    #[clap(long = "match-id")]
    match_id: String,

    /// league key, e.g. premier-league
    #[clap(long)]
    league: String,

    /// referee, when known
    #[clap(long)]
    referee: Option<String>,

    /// JSON file mapping market labels to quoted decimal prices
    #[clap(short = 'p', long)]
    prices: PathBuf,

    /// classifier confidence in [0, 100], when a model run is available
    #[clap(long = "ml-confidence")]
    ml_confidence: Option<f64>,

    /// print the ranked scoreline table as well
    #[clap(long)]
    scorelines: bool,

    /// delete settled snapshots older than the retention window before exiting
    #[clap(long)]
    prune: bool,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if let Some(confidence) = self.ml_confidence {
            if !(0.0..=100.0).contains(&confidence) {
                bail!("--ml-confidence must lie in [0, 100]");
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if env::var("RUST_BACKTRACE").is_err() {
        env::set_var("RUST_BACKTRACE", "full")
    }
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info")
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    args.validate()?;
    debug!("args: {args:?}");

    let raw = std::fs::read_to_string(&args.prices)?;
    let quoted: FxHashMap<MarketType, f64> = serde_json::from_str(&raw)?;
    let quoted_prices: Vec<(MarketType, f64)> = quoted.into_iter().collect();
    info!("loaded {} quoted markets", quoted_prices.len());

    let db_config = DbConfig::from_env()?;
    let store = PgStore::connect(&db_config).await?;
    let engine = Engine::new(Config::default(), &store).await?;

    let input = MatchInput {
        home_team: args.home.clone(),
        away_team: args.away.clone(),
        match_id: args.match_id.clone(),
        league: args.league.clone(),
        referee: args.referee.clone(),
        quoted_prices,
        ml: args.ml_confidence.map(|confidence| MlAssessment {
            confidence,
            probability: None,
        }),
        flags: MatchFlags::default(),
    };
    let analysis = engine.analyze(&input).await;

    if let Some(reason) = &analysis.abandoned {
        warn!("no recommendations for {}: {reason}", args.match_id);
        return Ok(());
    }
    info!(
        "{} vs {}: {} markets considered, {} shortlisted",
        args.home,
        args.away,
        analysis.considered,
        analysis.shortlist.len()
    );
    if analysis.shortlist.is_empty() {
        info!("nothing cleared the gate");
    } else {
        info!(
            "Shortlist:\n{}",
            Console::default().render(&print::tabulate_picks(&analysis.shortlist))
        );
    }
    if args.scorelines {
        info!(
            "Most probable scorelines:\n{}",
            Console::default().render(&print::tabulate_scorelines(&analysis.scorelines))
        );
    }
    if args.prune {
        let retention_days = engine.config().snapshot_retention_days;
        let horizon = Utc::now() - Duration::days(retention_days as i64);
        let removed = store.prune_snapshots(horizon).await?;
        info!("pruned {removed} settled snapshots older than {retention_days} days");
    }

    Ok(())
}
