use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GameError;

pub type PlayerId = i64;
pub type MatchId = i64;
pub type PredictionId = i64;

/// One round of fixtures in the season, always within `1..=38`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct GameWeek(u8);

impl GameWeek {
    pub const FIRST: GameWeek = GameWeek(1);
    pub const LAST: GameWeek = GameWeek(38);

    pub fn new(week: i64) -> Result<Self, GameError> {
        if week < i64::from(Self::FIRST.0) || week > i64::from(Self::LAST.0) {
            return Err(GameError::InvalidArgument(format!(
                "game week {week} is outside {}..={}",
                Self::FIRST.0,
                Self::LAST.0
            )));
        }
        Ok(GameWeek(week as u8))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = GameWeek> {
        (Self::FIRST.0..=Self::LAST.0).map(GameWeek)
    }

    pub fn through(self) -> impl Iterator<Item = GameWeek> {
        (Self::FIRST.0..=self.0).map(GameWeek)
    }
}

impl TryFrom<i64> for GameWeek {
    type Error = GameError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        GameWeek::new(value)
    }
}

impl From<GameWeek> for i64 {
    fn from(week: GameWeek) -> Self {
        i64::from(week.0)
    }
}

impl FromStr for GameWeek {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = s
            .trim()
            .parse::<i64>()
            .map_err(|_| GameError::InvalidArgument(format!("not a game week: {s:?}")))?;
        GameWeek::new(n)
    }
}

impl fmt::Display for GameWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Outcome {
    Home,
    Away,
    Draw,
}

impl Outcome {
    pub fn from_scores(home: i32, away: i32) -> Self {
        if home > away {
            Outcome::Home
        } else if home < away {
            Outcome::Away
        } else {
            Outcome::Draw
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Home => "HOME",
            Outcome::Away => "AWAY",
            Outcome::Draw => "DRAW",
        }
    }
}

impl FromStr for Outcome {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOME" | "H" => Ok(Outcome::Home),
            "AWAY" | "A" => Ok(Outcome::Away),
            "DRAW" | "D" => Ok(Outcome::Draw),
            _ => Err(GameError::InvalidArgument(format!(
                "unknown choice {s:?}, expected HOME, AWAY or DRAW"
            ))),
        }
    }
}

impl TryFrom<String> for Outcome {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Live => "LIVE",
            MatchStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SCHEDULED" => Some(MatchStatus::Scheduled),
            "LIVE" => Some(MatchStatus::Live),
            "FINISHED" => Some(MatchStatus::Finished),
            _ => None,
        }
    }

    pub fn accepts_picks(self) -> bool {
        self == MatchStatus::Scheduled
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: MatchId,
    pub external_id: i64,
    pub game_week: GameWeek,
    pub home_team: String,
    pub away_team: String,
    pub kickoff_time: DateTime<Utc>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub status: MatchStatus,
}

impl Match {
    pub fn result(&self) -> Option<Outcome> {
        derive_result(self.home_score, self.away_score)
    }
}

pub fn derive_result(home_score: Option<i32>, away_score: Option<i32>) -> Option<Outcome> {
    let (Some(home), Some(away)) = (home_score, away_score) else {
        return None;
    };
    Some(Outcome::from_scores(home, away))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub id: PredictionId,
    pub player_id: PlayerId,
    pub match_id: MatchId,
    pub choice: Outcome,
    pub points: u8,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredPrediction {
    pub prediction: Prediction,
    pub game_week: GameWeek,
    pub result: Option<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureUpdate {
    pub external_id: i64,
    pub home_team: String,
    pub away_team: String,
    pub kickoff_time: DateTime<Utc>,
    pub status: MatchStatus,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
}

impl FixtureUpdate {
    pub fn result(&self) -> Option<Outcome> {
        derive_result(self.home_score, self.away_score)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameWeekMeta {
    pub week: GameWeek,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandingRow {
    pub rank: u32,
    pub player_id: PlayerId,
    pub player_name: String,
    pub points: u32,
}
