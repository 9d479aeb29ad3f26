use std::cell::Cell;
use std::fs;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

use pl_predictions::football_data::{
    FixtureBatch, FixtureSource, ensure_week_loaded, parse_matches_json, refresh_week, sync_week,
};
use pl_predictions::memory_store::MemoryStore;
use pl_predictions::model::{GameWeek, MatchStatus, Outcome};
use pl_predictions::sqlite_store::SqliteStore;
use pl_predictions::store::Store;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

struct FileSource {
    body: String,
    calls: Cell<usize>,
}

impl FileSource {
    fn matchday() -> Self {
        Self {
            body: read_fixture("football_data_matchday.json"),
            calls: Cell::new(0),
        }
    }
}

impl FixtureSource for FileSource {
    fn fixtures_for_week(&self, _week: GameWeek) -> Result<FixtureBatch> {
        self.calls.set(self.calls.get() + 1);
        parse_matches_json(&self.body)
    }
}

struct DownSource;

impl FixtureSource for DownSource {
    fn fixtures_for_week(&self, _week: GameWeek) -> Result<FixtureBatch> {
        Err(anyhow!("http 429 Too Many Requests"))
    }
}

fn stores() -> Vec<(&'static str, Box<dyn Store>)> {
    vec![
        (
            "sqlite",
            Box::new(SqliteStore::open_in_memory().expect("in-memory sqlite")),
        ),
        ("memory", Box::new(MemoryStore::new())),
    ]
}

#[test]
fn parses_football_data_matchday_fixture() {
    let batch = parse_matches_json(&read_fixture("football_data_matchday.json"))
        .expect("fixture should parse");
    assert_eq!(batch.fixtures.len(), 4);
    assert_eq!(batch.rejected, 2);

    let liverpool = &batch.fixtures[0];
    assert_eq!(liverpool.external_id, 537785);
    assert_eq!(liverpool.home_team, "Liverpool FC");
    assert_eq!(liverpool.away_team, "AFC Bournemouth");
    assert_eq!(liverpool.status, MatchStatus::Finished);
    assert_eq!(liverpool.result(), Some(Outcome::Home));
    assert_eq!(
        liverpool.kickoff_time.to_rfc3339(),
        "2025-08-15T19:00:00+00:00"
    );

    assert_eq!(batch.fixtures[1].result(), Some(Outcome::Draw));
    assert_eq!(batch.fixtures[2].status, MatchStatus::Live);
    assert_eq!(batch.fixtures[3].status, MatchStatus::Scheduled);
    assert_eq!(batch.fixtures[3].result(), None);
}

#[test]
fn sync_week_upserts_every_valid_fixture() {
    for (name, store) in stores() {
        let week = GameWeek::FIRST;
        let source = FileSource::matchday();

        let report = sync_week(store.as_ref(), &source, week).expect("sync should succeed");
        assert_eq!(report.fetched, 4, "{name}");
        assert_eq!(report.upserted, 4, "{name}");
        assert_eq!(report.rejected, 2, "{name}");
        assert!(report.errors.is_empty(), "{name}");

        let matches = store.matches_in_week(week).unwrap();
        assert_eq!(matches.len(), 4, "{name}");
        assert_eq!(matches[0].external_id, 537785, "{name}");
        assert_eq!(matches[3].external_id, 537788, "{name}");

        let meta = store.game_week(week).unwrap().expect("metadata recorded");
        assert_eq!(meta.start_date.unwrap().to_string(), "2025-08-15", "{name}");
        assert_eq!(meta.end_date.unwrap().to_string(), "2025-08-18", "{name}");
    }
}

#[test]
fn repeated_sync_keeps_match_ids() {
    for (name, store) in stores() {
        let week = GameWeek::FIRST;
        let source = FileSource::matchday();
        sync_week(store.as_ref(), &source, week).unwrap();
        let before = store
            .matches_in_week(week)
            .unwrap()
            .into_iter()
            .map(|m| (m.external_id, m.id))
            .collect::<Vec<_>>();

        sync_week(store.as_ref(), &source, week).unwrap();
        let after = store
            .matches_in_week(week)
            .unwrap()
            .into_iter()
            .map(|m| (m.external_id, m.id))
            .collect::<Vec<_>>();
        assert_eq!(before, after, "{name}");
    }
}

#[test]
fn failed_fetch_writes_nothing() {
    for (name, store) in stores() {
        let week = GameWeek::new(7).unwrap();
        assert!(sync_week(store.as_ref(), &DownSource, week).is_err(), "{name}");
        assert!(!refresh_week(store.as_ref(), &DownSource, week), "{name}");
        assert!(store.matches_in_week(week).unwrap().is_empty(), "{name}");
        assert!(store.game_week(week).unwrap().is_none(), "{name}");
    }
}

#[test]
fn ensure_week_loaded_fetches_only_when_empty() {
    for (name, store) in stores() {
        let week = GameWeek::new(2).unwrap();
        let source = FileSource::matchday();

        assert!(!ensure_week_loaded(store.as_ref(), None, week).unwrap(), "{name}");
        assert!(
            ensure_week_loaded(store.as_ref(), Some(&source), week).unwrap(),
            "{name}"
        );
        assert!(
            ensure_week_loaded(store.as_ref(), Some(&source), week).unwrap(),
            "{name}"
        );
        assert_eq!(source.calls.get(), 1, "{name}");
    }
}
