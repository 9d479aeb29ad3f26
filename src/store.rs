use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::memory_store::MemoryStore;
use crate::model::{
    FixtureUpdate, GameWeek, GameWeekMeta, Match, MatchId, Outcome, Player, PlayerId, Prediction,
    PredictionId, ScoredPrediction,
};
use crate::sqlite_store::SqliteStore;

pub trait Store: Send + Sync {
    fn ensure_players(&self, names: &[&str]) -> Result<usize>;

    fn all_players(&self) -> Result<Vec<Player>>;

    fn player(&self, id: PlayerId) -> Result<Option<Player>>;

    fn match_by_id(&self, id: MatchId) -> Result<Option<Match>>;

    fn matches_in_week(&self, week: GameWeek) -> Result<Vec<Match>>;

    fn predictions_for_week(&self, week: GameWeek) -> Result<Vec<ScoredPrediction>>;

    fn predictions_up_to(&self, upto: Option<GameWeek>) -> Result<Vec<ScoredPrediction>>;

    fn player_predictions(&self, player_id: PlayerId, week: GameWeek) -> Result<Vec<Prediction>>;

    fn update_points(&self, id: PredictionId, points: u8) -> Result<()>;

    fn update_points_many(&self, updates: &[(PredictionId, u8)]) -> Result<()> {
        for (id, points) in updates {
            self.update_points(*id, *points)?;
        }
        Ok(())
    }

    fn upsert_match(&self, week: GameWeek, fixture: &FixtureUpdate) -> Result<MatchId>;

    fn replace_prediction(
        &self,
        player_id: PlayerId,
        match_id: MatchId,
        choice: Outcome,
    ) -> Result<PredictionId>;

    fn record_game_week(&self, meta: &GameWeekMeta) -> Result<()>;

    fn game_week(&self, week: GameWeek) -> Result<Option<GameWeekMeta>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Memory,
    Sqlite(PathBuf),
}

impl StoreTarget {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("empty database target"));
        }
        if matches!(trimmed, "memory" | ":memory:" | "memory://") {
            return Ok(StoreTarget::Memory);
        }
        if let Some(path) = trimmed.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(anyhow!("sqlite target is missing a path"));
            }
            if path == ":memory:" {
                return Ok(StoreTarget::Memory);
            }
            return Ok(StoreTarget::Sqlite(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(anyhow!("unsupported database scheme {scheme:?}"));
        }
        Ok(StoreTarget::Sqlite(PathBuf::from(trimmed)))
    }
}

pub fn open_store(target: &StoreTarget) -> Result<Box<dyn Store>> {
    match target {
        StoreTarget::Memory => {
            tracing::info!("using in-memory store");
            Ok(Box::new(MemoryStore::new()))
        }
        StoreTarget::Sqlite(path) => {
            tracing::info!(path = %path.display(), "using sqlite store");
            Ok(Box::new(SqliteStore::open(path)?))
        }
    }
}
