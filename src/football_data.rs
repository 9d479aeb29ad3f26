use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::FootballDataConfig;
use crate::http_cache::ResponseCache;
use crate::http_client::http_client;
use crate::model::{FixtureUpdate, GameWeek, GameWeekMeta, MatchStatus};
use crate::store::Store;

const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureBatch {
    pub fixtures: Vec<FixtureUpdate>,
    pub rejected: usize,
}

pub trait FixtureSource {
    fn fixtures_for_week(&self, week: GameWeek) -> Result<FixtureBatch>;
}

pub struct FootballDataClient {
    client: &'static Client,
    cache: ResponseCache,
    api_key: String,
    base_url: String,
    competition_id: u32,
    season: String,
}

impl FootballDataClient {
    pub fn from_config(config: &FootballDataConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let cache = if config.use_cache {
            ResponseCache::default_location()
        } else {
            ResponseCache::disabled()
        };
        Ok(Some(Self {
            client: http_client()?,
            cache,
            api_key,
            base_url: config.base_url.clone(),
            competition_id: config.competition_id,
            season: config.season.clone(),
        }))
    }

    pub fn matchday_url(&self, week: GameWeek) -> String {
        format!(
            "{}/competitions/{}/matches?matchday={}&season={}",
            self.base_url, self.competition_id, week, self.season
        )
    }
}

impl FixtureSource for FootballDataClient {
    fn fixtures_for_week(&self, week: GameWeek) -> Result<FixtureBatch> {
        let url = self.matchday_url(week);
        debug!(%url, "fetching matchday");
        let body = self
            .cache
            .fetch_json(self.client, &url, &[(AUTH_HEADER, self.api_key.as_str())])
            .with_context(|| format!("fetch matchday {week}"))?;
        parse_matches_json(&body)
    }
}

#[derive(Debug, Deserialize)]
struct MatchesResponse {
    #[serde(default)]
    matches: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiMatch {
    id: i64,
    #[serde(rename = "utcDate")]
    utc_date: String,
    status: String,
    #[serde(rename = "homeTeam")]
    home_team: ApiTeam,
    #[serde(rename = "awayTeam")]
    away_team: ApiTeam,
    #[serde(default)]
    score: ApiScore,
}

#[derive(Debug, Deserialize)]
struct ApiTeam {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiScore {
    #[serde(rename = "fullTime", default)]
    full_time: ApiScoreLine,
}

#[derive(Debug, Default, Deserialize)]
struct ApiScoreLine {
    home: Option<i32>,
    away: Option<i32>,
}

pub fn parse_matches_json(raw: &str) -> Result<FixtureBatch> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(FixtureBatch::default());
    }
    let response: MatchesResponse =
        serde_json::from_str(trimmed).context("invalid football-data matches json")?;

    let mut batch = FixtureBatch::default();
    for item in response.matches {
        match parse_fixture(item) {
            Ok(fixture) => batch.fixtures.push(fixture),
            Err(err) => {
                warn!(error = %err, "skipping malformed fixture");
                batch.rejected += 1;
            }
        }
    }
    Ok(batch)
}

fn parse_fixture(item: Value) -> Result<FixtureUpdate> {
    let m: ApiMatch = serde_json::from_value(item).context("unexpected fixture shape")?;
    let kickoff_time = DateTime::parse_from_rfc3339(&m.utc_date)
        .with_context(|| format!("fixture {}: bad utcDate {:?}", m.id, m.utc_date))?
        .with_timezone(&Utc);
    let status = map_status(&m.status)
        .ok_or_else(|| anyhow!("fixture {}: unknown status {:?}", m.id, m.status))?;
    let home_team = team_name(m.home_team)
        .ok_or_else(|| anyhow!("fixture {}: home team has no name", m.id))?;
    let away_team = team_name(m.away_team)
        .ok_or_else(|| anyhow!("fixture {}: away team has no name", m.id))?;

    let ApiScoreLine { home, away } = m.score.full_time;
    if home.is_some() != away.is_some() {
        return Err(anyhow!("fixture {}: only one side has a score", m.id));
    }

    Ok(FixtureUpdate {
        external_id: m.id,
        home_team,
        away_team,
        kickoff_time,
        status,
        home_score: home,
        away_score: away,
    })
}

fn team_name(team: ApiTeam) -> Option<String> {
    team.name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

pub fn map_status(raw: &str) -> Option<MatchStatus> {
    match raw {
        "SCHEDULED" | "TIMED" | "POSTPONED" | "SUSPENDED" | "CANCELLED" => {
            Some(MatchStatus::Scheduled)
        }
        "IN_PLAY" | "PAUSED" | "LIVE" => Some(MatchStatus::Live),
        "FINISHED" | "AWARDED" => Some(MatchStatus::Finished),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub week: GameWeek,
    pub fetched: usize,
    pub rejected: usize,
    pub upserted: usize,
    pub errors: Vec<String>,
}

/// Fetch one week and upsert each fixture by external id. A failed fetch is an
/// error and writes nothing; individual upsert failures are collected in the
/// report while the other fixtures are still written.
pub fn sync_week(
    store: &dyn Store,
    source: &dyn FixtureSource,
    week: GameWeek,
) -> Result<IngestReport> {
    let batch = source
        .fixtures_for_week(week)
        .with_context(|| format!("no fixture data for game week {week}"))?;

    let mut report = IngestReport {
        week,
        fetched: batch.fixtures.len(),
        rejected: batch.rejected,
        upserted: 0,
        errors: Vec::new(),
    };
    for fixture in &batch.fixtures {
        match store.upsert_match(week, fixture) {
            Ok(_) => report.upserted += 1,
            Err(err) => {
                warn!(external_id = fixture.external_id, error = %err, "upsert failed");
                report
                    .errors
                    .push(format!("match {}: {err:#}", fixture.external_id));
            }
        }
    }

    if let Some(meta) = week_meta(week, &batch.fixtures, Utc::now())
        && let Err(err) = store.record_game_week(&meta)
    {
        report.errors.push(format!("game week metadata: {err:#}"));
    }

    info!(
        week = week.number(),
        fetched = report.fetched,
        upserted = report.upserted,
        rejected = report.rejected,
        "synced game week"
    );
    Ok(report)
}

pub fn refresh_week(store: &dyn Store, source: &dyn FixtureSource, week: GameWeek) -> bool {
    match sync_week(store, source, week) {
        Ok(report) => report.upserted > 0,
        Err(err) => {
            let message = format!("{err:#}");
            warn!(week = week.number(), error = %message, "fixture refresh failed");
            false
        }
    }
}

pub fn ensure_week_loaded(
    store: &dyn Store,
    source: Option<&dyn FixtureSource>,
    week: GameWeek,
) -> Result<bool> {
    if !store.matches_in_week(week)?.is_empty() {
        return Ok(true);
    }
    let Some(source) = source else {
        return Ok(false);
    };
    Ok(refresh_week(store, source, week))
}

fn week_meta(week: GameWeek, fixtures: &[FixtureUpdate], now: DateTime<Utc>) -> Option<GameWeekMeta> {
    let start = fixtures.iter().map(|f| f.kickoff_time).min()?;
    let end = fixtures.iter().map(|f| f.kickoff_time).max()?;
    let start_date = start.date_naive();
    let end_date = end.date_naive();
    let today = now.date_naive();
    Some(GameWeekMeta {
        week,
        start_date: Some(start_date),
        end_date: Some(end_date),
        is_active: start_date <= today && today <= end_date,
    })
}
