use std::env;

use anyhow::{Context, Result};

use crate::sqlite_store::default_db_path;
use crate::store::StoreTarget;

pub const DEFAULT_API_BASE: &str = "https://api.football-data.org/v4";
pub const PREMIER_LEAGUE_COMPETITION_ID: u32 = 2021;
pub const DEFAULT_SEASON: &str = "2025";

pub const ROSTER: &[&str] = &["Biniam A", "Biniam G", "Biniam E", "Abel", "Siem", "Kubrom"];

#[derive(Debug, Clone)]
pub struct Config {
    pub database: StoreTarget,
    pub football: FootballDataConfig,
}

#[derive(Debug, Clone)]
pub struct FootballDataConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub competition_id: u32,
    pub season: String,
    pub use_cache: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = match var("DATABASE_URL") {
            Some(raw) => StoreTarget::parse(&raw).context("invalid DATABASE_URL")?,
            None => StoreTarget::Sqlite(
                default_db_path().unwrap_or_else(|| "premier_league_predictions.sqlite".into()),
            ),
        };

        let competition_id = match var("FOOTBALL_COMPETITION_ID") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .context("invalid FOOTBALL_COMPETITION_ID")?,
            None => PREMIER_LEAGUE_COMPETITION_ID,
        };

        let football = FootballDataConfig {
            api_key: var("FOOTBALL_API_KEY").map(|v| v.trim().to_string()),
            base_url: var("FOOTBALL_API_BASE")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            competition_id,
            season: var("FOOTBALL_SEASON")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| DEFAULT_SEASON.to_string()),
            use_cache: var("HTTP_CACHE").is_none_or(|v| v.trim() != "0"),
        };

        Ok(Config { database, football })
    }
}
