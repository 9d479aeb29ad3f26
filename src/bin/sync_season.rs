use anyhow::{Context, Result, anyhow};

use pl_predictions::config::{Config, ROSTER};
use pl_predictions::football_data::{FootballDataClient, sync_week};
use pl_predictions::model::GameWeek;
use pl_predictions::scoring::ScoringEngine;
use pl_predictions::store::{StoreTarget, open_store};
use pl_predictions::telemetry::init_telemetry;

fn main() -> Result<()> {
    let mut config = Config::from_env()?;
    init_telemetry();
    if let Some(db) = parse_flag_arg("db") {
        config.database = StoreTarget::parse(&db).context("invalid --db")?;
    }
    let from = parse_week_arg("from")?.unwrap_or(GameWeek::FIRST);
    let to = parse_week_arg("to")?.unwrap_or(GameWeek::LAST);
    if from > to {
        return Err(anyhow!("--from {from} is after --to {to}"));
    }

    let client = FootballDataClient::from_config(&config.football)?
        .context("FOOTBALL_API_KEY is not set")?;
    let store = open_store(&config.database)?;
    store.ensure_players(ROSTER).context("seed roster")?;

    let mut weeks_ok = 0usize;
    let mut upserted = 0usize;
    let mut errors: Vec<String> = Vec::new();
    for week in to.through().filter(|w| *w >= from) {
        match sync_week(store.as_ref(), &client, week) {
            Ok(report) => {
                weeks_ok += 1;
                upserted += report.upserted;
                errors.extend(report.errors.into_iter().map(|e| format!("week {week}: {e}")));
            }
            Err(err) => errors.push(format!("week {week}: {err:#}")),
        }
    }

    let evaluated = ScoringEngine::new(store.as_ref())
        .overall_leaderboard()
        .map(|rows| rows.len())
        .context("recompute season points")?;

    println!("Season sync complete");
    println!("Weeks: {}/{}", weeks_ok, to.number() - from.number() + 1);
    println!("Matches upserted: {upserted}");
    println!("Players ranked: {evaluated}");
    if !errors.is_empty() {
        println!("Errors: {}", errors.len());
        for err in errors.iter().take(8) {
            println!(" - {err}");
        }
    }

    Ok(())
}

fn parse_week_arg(name: &str) -> Result<Option<GameWeek>> {
    let Some(raw) = parse_flag_arg(name) else {
        return Ok(None);
    };
    Ok(Some(raw.parse::<GameWeek>()?))
}

fn parse_flag_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let long = format!("--{name}");
    let prefixed = format!("--{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefixed) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == long {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}
