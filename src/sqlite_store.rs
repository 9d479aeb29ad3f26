use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::http_cache::app_cache_dir;
use crate::model::{
    FixtureUpdate, GameWeek, GameWeekMeta, Match, MatchId, MatchStatus, Outcome, Player, PlayerId,
    Prediction, PredictionId, ScoredPrediction,
};
use crate::store::Store;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DATE_FORMAT: &str = "%Y-%m-%d";

const MATCH_COLUMNS: &str = "id, external_id, game_week, home_team, away_team, kickoff_time,
    home_score, away_score, status";

const SCORED_PREDICTION_SELECT: &str = r#"
    SELECT p.id, p.player_id, p.match_id, p.choice, p.points, p.updated_at,
           m.game_week, m.result
    FROM predictions p
    JOIN matches m ON p.match_id = m.id
"#;

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("premier_league_predictions.sqlite"))
}

// File targets open a connection per operation; in-memory keeps its one connection.
pub struct SqliteStore {
    target: Target,
}

enum Target {
    File(PathBuf),
    Memory(Mutex<Connection>),
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db directory {}", parent.display()))?;
        }
        let conn = connect(path)?;
        init_schema(&conn)?;
        Ok(Self {
            target: Target::File(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("enable foreign keys")?;
        init_schema(&conn)?;
        Ok(Self {
            target: Target::Memory(Mutex::new(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        match &self.target {
            Target::File(path) => {
                let mut conn = connect(path)?;
                f(&mut conn)
            }
            Target::Memory(conn) => {
                let mut guard = conn
                    .lock()
                    .map_err(|_| anyhow!("sqlite connection lock poisoned"))?;
                f(&mut guard)
            }
        }
    }
}

fn connect(path: &Path) -> Result<Connection> {
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("set sqlite busy timeout")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .context("enable foreign keys")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS players (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS game_weeks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            week_number INTEGER NOT NULL UNIQUE,
            start_date TEXT NULL,
            end_date TEXT NULL,
            is_active INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL UNIQUE,
            game_week INTEGER NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            kickoff_time TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            result TEXT NULL,
            status TEXT NOT NULL DEFAULT 'SCHEDULED',
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_game_week ON matches(game_week);

        CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id INTEGER NOT NULL REFERENCES players(id),
            match_id INTEGER NOT NULL REFERENCES matches(id),
            choice TEXT NOT NULL,
            points INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(player_id, match_id)
        );
        CREATE INDEX IF NOT EXISTS idx_predictions_match ON predictions(match_id);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

impl Store for SqliteStore {
    fn ensure_players(&self, names: &[&str]) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.transaction().context("begin players transaction")?;
            let now = timestamp(Utc::now());
            let mut inserted = 0usize;
            {
                let mut stmt = tx
                    .prepare("INSERT OR IGNORE INTO players (name, created_at) VALUES (?1, ?2)")
                    .context("prepare insert player")?;
                for name in names {
                    inserted += stmt
                        .execute(params![name, now])
                        .with_context(|| format!("insert player {name}"))?;
                }
            }
            tx.commit().context("commit players transaction")?;
            Ok(inserted)
        })
    }

    fn all_players(&self) -> Result<Vec<Player>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name FROM players ORDER BY name")
                .context("prepare players query")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Player {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })
                .context("query players")?;
            collect_rows(rows, "decode player row")
        })
    }

    fn player(&self, id: PlayerId) -> Result<Option<Player>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name FROM players WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Player {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("query player")
        })
    }

    fn match_by_id(&self, id: MatchId) -> Result<Option<Match>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1"),
                params![id],
                read_match,
            )
            .optional()
            .context("query match")
        })
    }

    fn matches_in_week(&self, week: GameWeek) -> Result<Vec<Match>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {MATCH_COLUMNS} FROM matches
                     WHERE game_week = ?1
                     ORDER BY kickoff_time ASC, id ASC"
                ))
                .context("prepare week matches query")?;
            let rows = stmt
                .query_map(params![i64::from(week)], read_match)
                .context("query week matches")?;
            collect_rows(rows, "decode match row")
        })
    }

    fn predictions_for_week(&self, week: GameWeek) -> Result<Vec<ScoredPrediction>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "{SCORED_PREDICTION_SELECT} WHERE m.game_week = ?1 ORDER BY p.id"
                ))
                .context("prepare week predictions query")?;
            let rows = stmt
                .query_map(params![i64::from(week)], read_scored_prediction)
                .context("query week predictions")?;
            collect_rows(rows, "decode prediction row")
        })
    }

    fn predictions_up_to(&self, upto: Option<GameWeek>) -> Result<Vec<ScoredPrediction>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "{SCORED_PREDICTION_SELECT}
                     WHERE ?1 IS NULL OR m.game_week <= ?1
                     ORDER BY p.id"
                ))
                .context("prepare cumulative predictions query")?;
            let rows = stmt
                .query_map(params![upto.map(i64::from)], read_scored_prediction)
                .context("query cumulative predictions")?;
            collect_rows(rows, "decode prediction row")
        })
    }

    fn player_predictions(&self, player_id: PlayerId, week: GameWeek) -> Result<Vec<Prediction>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT p.id, p.player_id, p.match_id, p.choice, p.points, p.updated_at
                    FROM predictions p
                    JOIN matches m ON p.match_id = m.id
                    WHERE p.player_id = ?1 AND m.game_week = ?2
                    ORDER BY m.kickoff_time ASC, m.id ASC
                    "#,
                )
                .context("prepare player predictions query")?;
            let rows = stmt
                .query_map(params![player_id, i64::from(week)], read_prediction)
                .context("query player predictions")?;
            collect_rows(rows, "decode prediction row")
        })
    }

    fn update_points(&self, id: PredictionId, points: u8) -> Result<()> {
        self.update_points_many(&[(id, points)])
    }

    fn update_points_many(&self, updates: &[(PredictionId, u8)]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.transaction().context("begin points transaction")?;
            {
                let mut stmt = tx
                    .prepare("UPDATE predictions SET points = ?1 WHERE id = ?2")
                    .context("prepare points update")?;
                for (id, points) in updates {
                    stmt.execute(params![i64::from(*points), id])
                        .with_context(|| format!("update points for prediction {id}"))?;
                }
            }
            tx.commit().context("commit points transaction")?;
            Ok(())
        })
    }

    fn upsert_match(&self, week: GameWeek, fixture: &FixtureUpdate) -> Result<MatchId> {
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                INSERT INTO matches (
                    external_id, game_week, home_team, away_team, kickoff_time,
                    home_score, away_score, result, status, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(external_id) DO UPDATE SET
                    game_week = excluded.game_week,
                    home_team = excluded.home_team,
                    away_team = excluded.away_team,
                    kickoff_time = excluded.kickoff_time,
                    home_score = excluded.home_score,
                    away_score = excluded.away_score,
                    result = excluded.result,
                    status = excluded.status,
                    updated_at = excluded.updated_at
                RETURNING id
                "#,
                params![
                    fixture.external_id,
                    i64::from(week),
                    fixture.home_team,
                    fixture.away_team,
                    timestamp(fixture.kickoff_time),
                    fixture.home_score,
                    fixture.away_score,
                    fixture.result().map(Outcome::as_str),
                    fixture.status.as_str(),
                    timestamp(Utc::now()),
                ],
                |row| row.get::<_, MatchId>(0),
            )
            .with_context(|| format!("upsert match {}", fixture.external_id))
        })
    }

    fn replace_prediction(
        &self,
        player_id: PlayerId,
        match_id: MatchId,
        choice: Outcome,
    ) -> Result<PredictionId> {
        self.with_conn(|conn| {
            let now = timestamp(Utc::now());
            conn.query_row(
                r#"
                INSERT INTO predictions (player_id, match_id, choice, points, created_at, updated_at)
                VALUES (?1, ?2, ?3, 0, ?4, ?4)
                ON CONFLICT(player_id, match_id) DO UPDATE SET
                    choice = excluded.choice,
                    points = 0,
                    updated_at = excluded.updated_at
                RETURNING id
                "#,
                params![player_id, match_id, choice.as_str(), now],
                |row| row.get::<_, PredictionId>(0),
            )
            .with_context(|| format!("store prediction of player {player_id} on match {match_id}"))
        })
    }

    fn record_game_week(&self, meta: &GameWeekMeta) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO game_weeks (week_number, start_date, end_date, is_active)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(week_number) DO UPDATE SET
                    start_date = excluded.start_date,
                    end_date = excluded.end_date,
                    is_active = excluded.is_active
                "#,
                params![
                    i64::from(meta.week),
                    meta.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    meta.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    meta.is_active,
                ],
            )
            .with_context(|| format!("record game week {}", meta.week))?;
            Ok(())
        })
    }

    fn game_week(&self, week: GameWeek) -> Result<Option<GameWeekMeta>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT start_date, end_date, is_active FROM game_weeks WHERE week_number = ?1",
                params![i64::from(week)],
                |row| {
                    Ok(GameWeekMeta {
                        week,
                        start_date: optional_date(row, 0)?,
                        end_date: optional_date(row, 1)?,
                        is_active: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("query game week")
        })
    }
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
    what: &'static str,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context(what)?);
    }
    Ok(out)
}

fn read_match(row: &Row<'_>) -> rusqlite::Result<Match> {
    Ok(Match {
        id: row.get(0)?,
        external_id: row.get(1)?,
        game_week: game_week_column(row, 2)?,
        home_team: row.get(3)?,
        away_team: row.get(4)?,
        kickoff_time: text_column(row, 5, parse_timestamp)?,
        home_score: row.get(6)?,
        away_score: row.get(7)?,
        status: text_column(row, 8, MatchStatus::parse)?,
    })
}

fn read_prediction(row: &Row<'_>) -> rusqlite::Result<Prediction> {
    Ok(Prediction {
        id: row.get(0)?,
        player_id: row.get(1)?,
        match_id: row.get(2)?,
        choice: text_column(row, 3, |s| s.parse::<Outcome>().ok())?,
        points: row.get(4)?,
        updated_at: text_column(row, 5, parse_timestamp)?,
    })
}

fn read_scored_prediction(row: &Row<'_>) -> rusqlite::Result<ScoredPrediction> {
    let result = match row.get::<_, Option<String>>(7)? {
        Some(raw) => Some(raw.parse::<Outcome>().map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(err))
        })?),
        None => None,
    };
    Ok(ScoredPrediction {
        prediction: read_prediction(row)?,
        game_week: game_week_column(row, 6)?,
        result,
    })
}

fn game_week_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<GameWeek> {
    let raw: i64 = row.get(idx)?;
    GameWeek::new(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err)))
}

fn text_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected value {raw:?}").into(),
        )
    })
}

fn optional_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let Some(raw) = row.get::<_, Option<String>>(idx)? else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map(Some)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixture(external_id: i64, scores: Option<(i32, i32)>) -> FixtureUpdate {
        FixtureUpdate {
            external_id,
            home_team: "Arsenal FC".to_string(),
            away_team: "Chelsea FC".to_string(),
            kickoff_time: Utc.with_ymd_and_hms(2025, 8, 16, 14, 0, 0).unwrap(),
            status: if scores.is_some() {
                MatchStatus::Finished
            } else {
                MatchStatus::Scheduled
            },
            home_score: scores.map(|s| s.0),
            away_score: scores.map(|s| s.1),
        }
    }

    #[test]
    fn upsert_keeps_internal_id_and_refreshes_scores() {
        let store = SqliteStore::open_in_memory().unwrap();
        let week = GameWeek::new(1).unwrap();
        let first = store.upsert_match(week, &fixture(900, None)).unwrap();
        let second = store.upsert_match(week, &fixture(900, Some((0, 2)))).unwrap();
        assert_eq!(first, second);

        let stored = store.match_by_id(first).unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Finished);
        assert_eq!(stored.result(), Some(Outcome::Away));
        assert_eq!(store.matches_in_week(week).unwrap().len(), 1);
    }

    #[test]
    fn replace_prediction_overwrites_choice_and_resets_points() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_players(&["Abel"]).unwrap();
        let abel = store.all_players().unwrap().remove(0);
        let week = GameWeek::new(2).unwrap();
        let match_id = store.upsert_match(week, &fixture(1, None)).unwrap();

        let id = store
            .replace_prediction(abel.id, match_id, Outcome::Home)
            .unwrap();
        store.update_points(id, 1).unwrap();
        let again = store
            .replace_prediction(abel.id, match_id, Outcome::Draw)
            .unwrap();
        assert_eq!(id, again);

        let rows = store.player_predictions(abel.id, week).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].choice, Outcome::Draw);
        assert_eq!(rows[0].points, 0);
    }

    #[test]
    fn prediction_for_unknown_match_is_rejected_by_foreign_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_players(&["Siem"]).unwrap();
        let siem = store.all_players().unwrap().remove(0);
        assert!(store.replace_prediction(siem.id, 4242, Outcome::Home).is_err());
    }

    #[test]
    fn game_week_metadata_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let week = GameWeek::new(3).unwrap();
        assert!(store.game_week(week).unwrap().is_none());
        let meta = GameWeekMeta {
            week,
            start_date: NaiveDate::from_ymd_opt(2025, 8, 30),
            end_date: NaiveDate::from_ymd_opt(2025, 8, 31),
            is_active: false,
        };
        store.record_game_week(&meta).unwrap();
        assert_eq!(store.game_week(week).unwrap(), Some(meta));
    }

    #[test]
    fn ensure_players_is_insert_if_absent() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.ensure_players(&["Kubrom", "Abel"]).unwrap(), 2);
        assert_eq!(store.ensure_players(&["Abel", "Siem"]).unwrap(), 1);
        let names = store
            .all_players()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Abel", "Kubrom", "Siem"]);
    }
}
