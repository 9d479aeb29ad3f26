use anyhow::{Context, Result};
use serde::Serialize;

use pl_predictions::cli::{self, Command, Invocation};
use pl_predictions::config::{Config, ROSTER};
use pl_predictions::football_data::{
    FixtureSource, FootballDataClient, ensure_week_loaded, sync_week,
};
use pl_predictions::model::GameWeek;
use pl_predictions::render::{self, MatchView};
use pl_predictions::scoring::{RecomputeReport, ScoringEngine};
use pl_predictions::store::{Store, StoreTarget, open_store};
use pl_predictions::submission::{Submission, submit_predictions};
use pl_predictions::telemetry::init_telemetry;

fn main() -> Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let invocation = match cli::parse_args(&args) {
        Ok(Some(invocation)) => invocation,
        Ok(None) => {
            println!("{}", cli::USAGE);
            return Ok(());
        }
        Err(err) => {
            eprintln!("error: {err:#}\n\n{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    let mut config = Config::from_env()?;
    init_telemetry();
    if let Some(db) = invocation.db.as_deref() {
        config.database = StoreTarget::parse(db).context("invalid --db")?;
    }

    let store = open_store(&config.database)?;
    store.ensure_players(ROSTER).context("seed roster")?;
    let client = FootballDataClient::from_config(&config.football)?;
    let source = client.as_ref().map(|c| c as &dyn FixtureSource);

    run(store.as_ref(), source, invocation)
}

fn run(store: &dyn Store, source: Option<&dyn FixtureSource>, invocation: Invocation) -> Result<()> {
    let engine = ScoringEngine::new(store);
    let json = invocation.json;

    match invocation.command {
        Command::Players => {
            let players = store.all_players()?;
            emit(json, &players, || render::players_table(&players))?;
        }
        Command::Fixtures(week) => {
            ensure_week_loaded(store, source, week)?;
            let matches = store.matches_in_week(week)?;
            let views = matches.iter().map(MatchView::from).collect::<Vec<_>>();
            emit(json, &views, || render::fixtures_table(week, &matches))?;
        }
        Command::Sync(week) => {
            let source = source.context("FOOTBALL_API_KEY is not set; cannot fetch fixtures")?;
            let report = sync_week(store, source, week)?;
            emit(json, &report, || {
                let mut text = format!(
                    "game week {}: fetched {}, upserted {}, rejected {}\n",
                    report.week, report.fetched, report.upserted, report.rejected
                );
                for err in report.errors.iter().take(8) {
                    text.push_str(&format!(" - {err}\n"));
                }
                text
            })?;
        }
        Command::Submit {
            player_id,
            week,
            picks,
        } => {
            let submission = Submission {
                player_id,
                game_week: week,
                picks,
            };
            let outcome = submit_predictions(store, &submission)?;
            emit(json, &outcome, || {
                let mut text = format!("saved {} prediction(s)\n", outcome.saved);
                if !outcome.locked.is_empty() {
                    text.push_str(&format!(
                        "not saved, already started: {:?}\n",
                        outcome.locked
                    ));
                }
                text
            })?;
        }
        Command::Summary { player_id, week } => {
            let summary = engine.player_summary(player_id, week)?;
            emit(json, &summary, || render::summary_table(&summary))?;
        }
        Command::Recompute(week) => {
            let report = RecomputeReport {
                game_week: week,
                evaluated: engine.recompute_points(week)?,
            };
            emit(json, &report, || {
                format!("game week {week}: evaluated {} prediction(s)\n", report.evaluated)
            })?;
        }
        Command::Weekly(week) => {
            ensure_week_loaded(store, source, week)?;
            let results = engine.week_results(week)?;
            emit(json, &results, || {
                format!(
                    "{}\n{}",
                    render::standings_table(&format!("Game week {week}"), &results.weekly),
                    render::standings_table(
                        &format!("Cumulative through week {week}"),
                        &results.cumulative
                    )
                )
            })?;
        }
        Command::Cumulative(week) => {
            let rows = engine.cumulative_standings(week)?;
            emit(json, &rows, || {
                render::standings_table(&format!("Cumulative through week {week}"), &rows)
            })?;
        }
        Command::Leaderboard => {
            let rows = engine.overall_leaderboard()?;
            let title = format!("Season leaderboard (weeks {}-{})", GameWeek::FIRST, GameWeek::LAST);
            emit(json, &rows, || render::standings_table(&title, &rows))?;
        }
    }
    Ok(())
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("serialize output")?
        );
    } else {
        print!("{}", text());
    }
    Ok(())
}
