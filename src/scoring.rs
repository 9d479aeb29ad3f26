use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::GameError;
use crate::model::{
    GameWeek, Match, Outcome, Player, PlayerId, PredictionId, ScoredPrediction, StandingRow,
};
use crate::store::Store;

pub fn points_for(choice: Outcome, result: Option<Outcome>) -> u8 {
    match result {
        Some(result) if result == choice => 1,
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekResults {
    pub game_week: GameWeek,
    pub weekly: Vec<StandingRow>,
    pub cumulative: Vec<StandingRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecomputeReport {
    pub game_week: GameWeek,
    pub evaluated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickSummary {
    pub match_id: i64,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: String,
    pub choice: Outcome,
    pub result: Option<Outcome>,
    pub points: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerWeekSummary {
    pub player: Player,
    pub game_week: GameWeek,
    pub picks: Vec<PickSummary>,
    pub points: u32,
}

/// Points are recomputed from stored choices and results on every read.
pub struct ScoringEngine<'a> {
    store: &'a dyn Store,
}

impl<'a> ScoringEngine<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Refresh points for every prediction on a match of `week` that has a result.
    /// Returns how many predictions were evaluated.
    pub fn recompute_points(&self, week: GameWeek) -> Result<usize, GameError> {
        let rows = self.store.predictions_for_week(week)?;
        let mut evaluated = 0usize;
        let mut changed: Vec<(PredictionId, u8)> = Vec::new();
        for row in &rows {
            let Some(result) = row.result else {
                continue;
            };
            evaluated += 1;
            let points = points_for(row.prediction.choice, Some(result));
            if points != row.prediction.points {
                changed.push((row.prediction.id, points));
            }
        }
        self.store.update_points_many(&changed)?;
        debug!(
            week = week.number(),
            evaluated,
            changed = changed.len(),
            "recomputed points"
        );
        Ok(evaluated)
    }

    fn recompute_weeks(&self, weeks: impl Iterator<Item = GameWeek>) -> Result<usize, GameError> {
        let mut total = 0usize;
        for week in weeks {
            total += self.recompute_points(week)?;
        }
        Ok(total)
    }

    pub fn weekly_standings(&self, week: GameWeek) -> Result<Vec<StandingRow>, GameError> {
        self.recompute_points(week)?;
        let rows = self.store.predictions_for_week(week)?;
        self.rank(&rows)
    }

    pub fn cumulative_standings(&self, upto: GameWeek) -> Result<Vec<StandingRow>, GameError> {
        self.recompute_weeks(upto.through())?;
        let rows = self.store.predictions_up_to(Some(upto))?;
        self.rank(&rows)
    }

    pub fn overall_leaderboard(&self) -> Result<Vec<StandingRow>, GameError> {
        let evaluated = self.recompute_weeks(GameWeek::all())?;
        info!(evaluated, "recomputed points for the whole season");
        let rows = self.store.predictions_up_to(None)?;
        self.rank(&rows)
    }

    pub fn week_results(&self, week: GameWeek) -> Result<WeekResults, GameError> {
        let weekly = self.weekly_standings(week)?;
        let cumulative = self.cumulative_standings(week)?;
        Ok(WeekResults {
            game_week: week,
            weekly,
            cumulative,
        })
    }

    pub fn player_standing(
        &self,
        player_id: PlayerId,
        upto: Option<GameWeek>,
    ) -> Result<StandingRow, GameError> {
        self.require_player(player_id)?;
        let table = match upto {
            Some(week) => self.cumulative_standings(week)?,
            None => self.overall_leaderboard()?,
        };
        table
            .into_iter()
            .find(|row| row.player_id == player_id)
            .ok_or_else(|| GameError::player_not_found(player_id))
    }

    pub fn player_summary(
        &self,
        player_id: PlayerId,
        week: GameWeek,
    ) -> Result<PlayerWeekSummary, GameError> {
        let player = self.require_player(player_id)?;
        self.recompute_points(week)?;

        let matches: HashMap<i64, Match> = self
            .store
            .matches_in_week(week)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();
        let mut picks = Vec::new();
        for prediction in self.store.player_predictions(player_id, week)? {
            let Some(m) = matches.get(&prediction.match_id) else {
                continue;
            };
            picks.push(PickSummary {
                match_id: m.id,
                home_team: m.home_team.clone(),
                away_team: m.away_team.clone(),
                kickoff: m.kickoff_time.format("%Y-%m-%d %H:%M").to_string(),
                choice: prediction.choice,
                result: m.result(),
                points: prediction.points,
            });
        }
        let points = picks.iter().map(|p| u32::from(p.points)).sum();
        Ok(PlayerWeekSummary {
            player,
            game_week: week,
            picks,
            points,
        })
    }

    fn require_player(&self, player_id: PlayerId) -> Result<Player, GameError> {
        self.store
            .player(player_id)?
            .ok_or_else(|| GameError::player_not_found(player_id))
    }

    fn rank(&self, rows: &[ScoredPrediction]) -> Result<Vec<StandingRow>, GameError> {
        let players = self.store.all_players()?;
        Ok(rank_players(&players, rows))
    }
}

pub fn rank_players(players: &[Player], rows: &[ScoredPrediction]) -> Vec<StandingRow> {
    let mut totals: HashMap<PlayerId, u32> = players.iter().map(|p| (p.id, 0)).collect();
    for row in rows {
        if let Some(total) = totals.get_mut(&row.prediction.player_id) {
            *total += u32::from(row.prediction.points);
        }
    }

    let mut table = players
        .iter()
        .map(|p| StandingRow {
            rank: 0,
            player_id: p.id,
            player_name: p.name.clone(),
            points: totals.get(&p.id).copied().unwrap_or(0),
        })
        .collect::<Vec<_>>();
    table.sort_by(compare_standing);

    let mut previous: Option<u32> = None;
    for idx in 0..table.len() {
        let rank = match previous {
            Some(points) if points == table[idx].points => table[idx - 1].rank,
            _ => idx as u32 + 1,
        };
        previous = Some(table[idx].points);
        table[idx].rank = rank;
    }
    table
}

fn compare_standing(a: &StandingRow, b: &StandingRow) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| a.player_name.cmp(&b.player_name))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::Prediction;

    fn player(id: i64, name: &str) -> Player {
        Player {
            id,
            name: name.to_string(),
        }
    }

    fn scored(id: i64, player_id: i64, points: u8) -> ScoredPrediction {
        ScoredPrediction {
            prediction: Prediction {
                id,
                player_id,
                match_id: id,
                choice: Outcome::Home,
                points,
                updated_at: Utc::now(),
            },
            game_week: GameWeek::FIRST,
            result: Some(Outcome::Home),
        }
    }

    #[test]
    fn points_rule() {
        assert_eq!(points_for(Outcome::Home, Some(Outcome::Home)), 1);
        assert_eq!(points_for(Outcome::Draw, Some(Outcome::Home)), 0);
        assert_eq!(points_for(Outcome::Away, None), 0);
    }

    #[test]
    fn ties_share_rank_and_order_by_name() {
        let players = vec![
            player(1, "Siem"),
            player(2, "Abel"),
            player(3, "Kubrom"),
            player(4, "abel"),
        ];
        let rows = vec![scored(1, 1, 1), scored(2, 2, 1), scored(3, 3, 1), scored(4, 3, 1)];
        let table = rank_players(&players, &rows);

        let order = table
            .iter()
            .map(|r| (r.rank, r.player_name.as_str(), r.points))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![(1, "Kubrom", 2), (2, "Abel", 1), (2, "Siem", 1), (4, "abel", 0)]
        );
    }

    #[test]
    fn recompute_report_serializes_week_number() {
        let report = RecomputeReport {
            game_week: GameWeek::new(12).unwrap(),
            evaluated: 30,
        };
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"game_week":12,"evaluated":30}"#
        );
    }

    #[test]
    fn rows_for_unknown_players_are_ignored() {
        let players = vec![player(1, "Abel")];
        let table = rank_players(&players, &[scored(1, 99, 1)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].points, 0);
    }
}
