use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use chrono::Utc;

use crate::model::{
    FixtureUpdate, GameWeek, GameWeekMeta, Match, MatchId, Outcome, Player, PlayerId, Prediction,
    PredictionId, ScoredPrediction,
};
use crate::store::Store;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    players: BTreeMap<PlayerId, Player>,
    matches: BTreeMap<MatchId, Match>,
    predictions: BTreeMap<PredictionId, Prediction>,
    game_weeks: BTreeMap<GameWeek, GameWeekMeta>,
    next_player_id: i64,
    next_match_id: i64,
    next_prediction_id: i64,
}

impl Tables {
    fn scored(&self, prediction: &Prediction) -> Option<ScoredPrediction> {
        let m = self.matches.get(&prediction.match_id)?;
        Some(ScoredPrediction {
            prediction: prediction.clone(),
            game_week: m.game_week,
            result: m.result(),
        })
    }

    fn scored_where(&self, keep: impl Fn(GameWeek) -> bool) -> Vec<ScoredPrediction> {
        self.predictions
            .values()
            .filter_map(|p| self.scored(p))
            .filter(|row| keep(row.game_week))
            .collect()
    }
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

impl Store for MemoryStore {
    fn ensure_players(&self, names: &[&str]) -> Result<usize> {
        let mut tables = self.lock()?;
        let mut inserted = 0usize;
        for name in names {
            if tables.players.values().any(|p| p.name == *name) {
                continue;
            }
            let id = next_id(&mut tables.next_player_id);
            tables.players.insert(
                id,
                Player {
                    id,
                    name: (*name).to_string(),
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    fn all_players(&self) -> Result<Vec<Player>> {
        let tables = self.lock()?;
        let mut players = tables.players.values().cloned().collect::<Vec<_>>();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(players)
    }

    fn player(&self, id: PlayerId) -> Result<Option<Player>> {
        Ok(self.lock()?.players.get(&id).cloned())
    }

    fn match_by_id(&self, id: MatchId) -> Result<Option<Match>> {
        Ok(self.lock()?.matches.get(&id).cloned())
    }

    fn matches_in_week(&self, week: GameWeek) -> Result<Vec<Match>> {
        let tables = self.lock()?;
        let mut out = tables
            .matches
            .values()
            .filter(|m| m.game_week == week)
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by(|a, b| a.kickoff_time.cmp(&b.kickoff_time).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    fn predictions_for_week(&self, week: GameWeek) -> Result<Vec<ScoredPrediction>> {
        Ok(self.lock()?.scored_where(|w| w == week))
    }

    fn predictions_up_to(&self, upto: Option<GameWeek>) -> Result<Vec<ScoredPrediction>> {
        let tables = self.lock()?;
        Ok(match upto {
            Some(limit) => tables.scored_where(|w| w <= limit),
            None => tables.scored_where(|_| true),
        })
    }

    fn player_predictions(&self, player_id: PlayerId, week: GameWeek) -> Result<Vec<Prediction>> {
        let tables = self.lock()?;
        let mut rows = tables
            .predictions
            .values()
            .filter(|p| p.player_id == player_id)
            .filter_map(|p| {
                let m = tables.matches.get(&p.match_id)?;
                (m.game_week == week).then(|| (m.kickoff_time, m.id, p.clone()))
            })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(rows.into_iter().map(|(_, _, p)| p).collect())
    }

    fn update_points(&self, id: PredictionId, points: u8) -> Result<()> {
        let mut tables = self.lock()?;
        if let Some(p) = tables.predictions.get_mut(&id) {
            p.points = points;
        }
        Ok(())
    }

    fn upsert_match(&self, week: GameWeek, fixture: &FixtureUpdate) -> Result<MatchId> {
        let mut tables = self.lock()?;
        let existing = tables
            .matches
            .values()
            .find(|m| m.external_id == fixture.external_id)
            .map(|m| m.id);
        let id = match existing {
            Some(id) => id,
            None => next_id(&mut tables.next_match_id),
        };
        tables.matches.insert(
            id,
            Match {
                id,
                external_id: fixture.external_id,
                game_week: week,
                home_team: fixture.home_team.clone(),
                away_team: fixture.away_team.clone(),
                kickoff_time: fixture.kickoff_time,
                home_score: fixture.home_score,
                away_score: fixture.away_score,
                status: fixture.status,
            },
        );
        Ok(id)
    }

    fn replace_prediction(
        &self,
        player_id: PlayerId,
        match_id: MatchId,
        choice: Outcome,
    ) -> Result<PredictionId> {
        let mut tables = self.lock()?;
        if !tables.players.contains_key(&player_id) {
            return Err(anyhow!("no player with id {player_id}"));
        }
        if !tables.matches.contains_key(&match_id) {
            return Err(anyhow!("no match with id {match_id}"));
        }
        let existing = tables
            .predictions
            .values()
            .find(|p| p.player_id == player_id && p.match_id == match_id)
            .map(|p| p.id);
        let id = match existing {
            Some(id) => id,
            None => next_id(&mut tables.next_prediction_id),
        };
        tables.predictions.insert(
            id,
            Prediction {
                id,
                player_id,
                match_id,
                choice,
                points: 0,
                updated_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn record_game_week(&self, meta: &GameWeekMeta) -> Result<()> {
        self.lock()?.game_weeks.insert(meta.week, meta.clone());
        Ok(())
    }

    fn game_week(&self, week: GameWeek) -> Result<Option<GameWeekMeta>> {
        Ok(self.lock()?.game_weeks.get(&week).cloned())
    }
}
