use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};

use crate::model::{GameWeek, MatchId, Outcome, PlayerId};
use crate::submission::parse_picks;

pub const USAGE: &str = "\
usage: pl_predictions [--db <target>] [--json] <command>

commands:
  players                                   list players
  fixtures <week>                           show a week's matches (fetched if missing)
  sync <week>                               refetch a week from football-data.org
  submit <player_id> <week> <match>=<pick>  store picks (HOME, AWAY or DRAW)
  summary <player_id> <week>                a player's picks and points for a week
  recompute <week>                          refresh points for a week
  weekly <week>                             weekly and cumulative standings
  cumulative <week>                         standings through a week
  leaderboard                               standings for the whole season

--db accepts a file path, sqlite://<path>, or memory.
--json prints the result of any command as JSON instead of a table.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Players,
    Fixtures(GameWeek),
    Sync(GameWeek),
    Submit {
        player_id: PlayerId,
        week: GameWeek,
        picks: BTreeMap<MatchId, Outcome>,
    },
    Summary {
        player_id: PlayerId,
        week: GameWeek,
    },
    Recompute(GameWeek),
    Weekly(GameWeek),
    Cumulative(GameWeek),
    Leaderboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub db: Option<String>,
    pub json: bool,
}

pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<Option<Invocation>> {
    let mut db = None;
    let mut json = false;
    let mut positional: Vec<&str> = Vec::new();

    let mut iter = args.iter().map(|a| a.as_ref());
    while let Some(arg) = iter.next() {
        if let Some(target) = arg.strip_prefix("--db=") {
            db = Some(non_empty(target, "--db")?);
        } else if arg == "--db" {
            let next = iter.next().ok_or_else(|| anyhow!("--db needs a value"))?;
            db = Some(non_empty(next, "--db")?);
        } else if arg == "--json" {
            json = true;
        } else if arg == "-h" || arg == "--help" {
            return Ok(None);
        } else {
            positional.push(arg);
        }
    }

    let Some((name, rest)) = positional.split_first() else {
        return Ok(None);
    };
    if *name == "help" {
        return Ok(None);
    }
    let command = parse_command(name, rest)?;
    Ok(Some(Invocation { command, db, json }))
}

fn parse_command(name: &str, rest: &[&str]) -> Result<Command> {
    let command = match name {
        "players" => {
            expect_arity(name, rest, 0)?;
            Command::Players
        }
        "leaderboard" => {
            expect_arity(name, rest, 0)?;
            Command::Leaderboard
        }
        "fixtures" => Command::Fixtures(single_week(name, rest)?),
        "sync" => Command::Sync(single_week(name, rest)?),
        "recompute" => Command::Recompute(single_week(name, rest)?),
        "weekly" => Command::Weekly(single_week(name, rest)?),
        "cumulative" => Command::Cumulative(single_week(name, rest)?),
        "summary" => {
            expect_arity(name, rest, 2)?;
            Command::Summary {
                player_id: parse_player_id(rest[0])?,
                week: parse_week(rest[1])?,
            }
        }
        "submit" => {
            if rest.len() < 3 {
                return Err(anyhow!(
                    "submit needs <player_id> <week> and at least one <match_id>=<choice>"
                ));
            }
            Command::Submit {
                player_id: parse_player_id(rest[0])?,
                week: parse_week(rest[1])?,
                picks: parse_picks(&rest[2..])?,
            }
        }
        other => return Err(anyhow!("unknown command {other:?}")),
    };
    Ok(command)
}

fn single_week(name: &str, rest: &[&str]) -> Result<GameWeek> {
    expect_arity(name, rest, 1)?;
    parse_week(rest[0])
}

fn expect_arity(name: &str, rest: &[&str], n: usize) -> Result<()> {
    if rest.len() != n {
        return Err(anyhow!(
            "{name} takes {n} argument(s), got {}",
            rest.len()
        ));
    }
    Ok(())
}

fn parse_week(raw: &str) -> Result<GameWeek> {
    Ok(raw.parse::<GameWeek>()?)
}

fn parse_player_id(raw: &str) -> Result<PlayerId> {
    raw.trim()
        .parse::<PlayerId>()
        .with_context(|| format!("not a player id: {raw:?}"))
}

fn non_empty(raw: &str, flag: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("{flag} needs a value"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_anywhere() {
        let inv = parse_args(&["weekly", "--json", "4", "--db", "memory"])
            .unwrap()
            .unwrap();
        assert_eq!(inv.command, Command::Weekly(GameWeek::new(4).unwrap()));
        assert!(inv.json);
        assert_eq!(inv.db.as_deref(), Some("memory"));

        let inv = parse_args(&["--db=picks.db", "leaderboard"]).unwrap().unwrap();
        assert_eq!(inv.command, Command::Leaderboard);
        assert_eq!(inv.db.as_deref(), Some("picks.db"));
    }

    #[test]
    fn parses_submit() {
        let inv = parse_args(&["submit", "2", "5", "10=HOME", "11=draw"])
            .unwrap()
            .unwrap();
        let Command::Submit {
            player_id,
            week,
            picks,
        } = inv.command
        else {
            panic!("expected submit");
        };
        assert_eq!(player_id, 2);
        assert_eq!(week.number(), 5);
        assert_eq!(picks.get(&11), Some(&Outcome::Draw));
    }

    #[test]
    fn empty_or_help_prints_usage() {
        let empty: [&str; 0] = [];
        assert_eq!(parse_args(&empty).unwrap(), None);
        assert_eq!(parse_args(&["players", "-h"]).unwrap(), None);
        assert_eq!(parse_args(&["--json", "help"]).unwrap(), None);
        assert_eq!(parse_args(&["--help", "dance"]).unwrap(), None);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&["weekly", "39"]).is_err());
        assert!(parse_args(&["weekly"]).is_err());
        assert!(parse_args(&["summary", "abc", "1"]).is_err());
        assert!(parse_args(&["submit", "1", "1"]).is_err());
        assert!(parse_args(&["players", "extra"]).is_err());
        assert!(parse_args(&["dance"]).is_err());
        assert!(parse_args(&["leaderboard", "--db"]).is_err());
    }
}
