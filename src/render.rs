use std::fmt::Write as _;

use serde::Serialize;

use crate::model::{GameWeek, Match, MatchStatus, Outcome, Player, StandingRow};
use crate::scoring::PlayerWeekSummary;

#[derive(Debug, Clone, Serialize)]
pub struct MatchView {
    pub id: i64,
    pub external_id: i64,
    pub game_week: GameWeek,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: String,
    pub status: MatchStatus,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub result: Option<Outcome>,
}

impl From<&Match> for MatchView {
    fn from(m: &Match) -> Self {
        Self {
            id: m.id,
            external_id: m.external_id,
            game_week: m.game_week,
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            kickoff: m.kickoff_time.to_rfc3339(),
            status: m.status,
            home_score: m.home_score,
            away_score: m.away_score,
            result: m.result(),
        }
    }
}

pub fn standings_table(title: &str, rows: &[StandingRow]) -> String {
    let width = rows
        .iter()
        .map(|r| r.player_name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Player".len());
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{:>4}  {:<width$}  {:>6}", "#", "Player", "Points");
    for row in rows {
        let _ = writeln!(
            out,
            "{:>4}  {:<width$}  {:>6}",
            row.rank, row.player_name, row.points
        );
    }
    out
}

pub fn fixtures_table(week: GameWeek, matches: &[Match]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Game week {week}");
    if matches.is_empty() {
        let _ = writeln!(out, "  no matches available");
        return out;
    }
    for m in matches {
        let score = match (m.home_score, m.away_score) {
            (Some(h), Some(a)) => format!("{h}-{a}"),
            _ => "vs".to_string(),
        };
        let _ = writeln!(
            out,
            "{:>6}  {}  {} {} {}  [{}]",
            m.id,
            m.kickoff_time.format("%Y-%m-%d %H:%M"),
            m.home_team,
            score,
            m.away_team,
            m.status
        );
    }
    out
}

pub fn summary_table(summary: &PlayerWeekSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} - game week {} ({} pts)",
        summary.player.name, summary.game_week, summary.points
    );
    if summary.picks.is_empty() {
        let _ = writeln!(out, "  no predictions");
        return out;
    }
    for pick in &summary.picks {
        let result = pick.result.map(Outcome::as_str).unwrap_or("-");
        let _ = writeln!(
            out,
            "  {}  {} vs {}  pick {:<4}  result {:<4}  {}",
            pick.kickoff, pick.home_team, pick.away_team, pick.choice, result, pick.points
        );
    }
    out
}

pub fn players_table(players: &[Player]) -> String {
    let mut out = String::new();
    for p in players {
        let _ = writeln!(out, "{:>4}  {}", p.id, p.name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standings_table_aligns_columns() {
        let rows = vec![
            StandingRow {
                rank: 1,
                player_id: 1,
                player_name: "Biniam A".to_string(),
                points: 12,
            },
            StandingRow {
                rank: 2,
                player_id: 2,
                player_name: "Abel".to_string(),
                points: 9,
            },
        ];
        let text = standings_table("Overall", &rows);
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Overall");
        assert_eq!(lines[1], "   #  Player    Points");
        assert_eq!(lines[2], "   1  Biniam A      12");
        assert_eq!(lines[3], "   2  Abel           9");
    }

    #[test]
    fn summary_table_pads_pick_columns() {
        let summary = PlayerWeekSummary {
            player: Player {
                id: 4,
                name: "Abel".to_string(),
            },
            game_week: GameWeek::FIRST,
            picks: vec![crate::scoring::PickSummary {
                match_id: 9,
                home_team: "Liverpool FC".to_string(),
                away_team: "AFC Bournemouth".to_string(),
                kickoff: "2025-08-15 19:00".to_string(),
                choice: Outcome::Draw,
                result: None,
                points: 0,
            }],
            points: 0,
        };
        let text = summary_table(&summary);
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Abel - game week 1 (0 pts)");
        assert_eq!(
            lines[1],
            "  2025-08-15 19:00  Liverpool FC vs AFC Bournemouth  pick DRAW  result -     0"
        );
    }
}
