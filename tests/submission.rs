use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};

use pl_predictions::memory_store::MemoryStore;
use pl_predictions::model::{FixtureUpdate, GameWeek, MatchId, MatchStatus, Outcome, PlayerId};
use pl_predictions::sqlite_store::SqliteStore;
use pl_predictions::store::Store;
use pl_predictions::submission::{Submission, parse_picks, submit_predictions};

fn stores() -> Vec<(&'static str, Box<dyn Store>)> {
    vec![
        (
            "sqlite",
            Box::new(SqliteStore::open_in_memory().expect("in-memory sqlite")),
        ),
        ("memory", Box::new(MemoryStore::new())),
    ]
}

fn week(n: i64) -> GameWeek {
    GameWeek::new(n).expect("valid game week")
}

fn add_match(store: &dyn Store, w: i64, external_id: i64, status: MatchStatus) -> MatchId {
    let score = match status {
        MatchStatus::Scheduled => None,
        _ => Some(1),
    };
    let fixture = FixtureUpdate {
        external_id,
        home_team: "Arsenal FC".to_string(),
        away_team: "Chelsea FC".to_string(),
        kickoff_time: Utc
            .with_ymd_and_hms(2025, 10, 4, 12, external_id as u32 % 60, 0)
            .unwrap(),
        status,
        home_score: score,
        away_score: score,
    };
    store.upsert_match(week(w), &fixture).expect("upsert match")
}

fn seed_player(store: &dyn Store) -> PlayerId {
    store.ensure_players(&["Biniam A"]).unwrap();
    store.all_players().unwrap()[0].id
}

fn submission(player_id: PlayerId, w: i64, picks: &[(MatchId, Outcome)]) -> Submission {
    Submission {
        player_id,
        game_week: week(w),
        picks: picks.iter().copied().collect::<BTreeMap<_, _>>(),
    }
}

#[test]
fn saves_open_picks_and_reports_locked_ones() {
    for (name, store) in stores() {
        let store = store.as_ref();
        let player = seed_player(store);
        let open = add_match(store, 8, 1, MatchStatus::Scheduled);
        let live = add_match(store, 8, 2, MatchStatus::Live);
        let done = add_match(store, 8, 3, MatchStatus::Finished);

        let outcome = submit_predictions(
            store,
            &submission(
                player,
                8,
                &[(open, Outcome::Home), (live, Outcome::Draw), (done, Outcome::Away)],
            ),
        )
        .unwrap();
        assert_eq!(outcome.saved, 1, "{name}");
        let mut locked = outcome.locked.clone();
        locked.sort();
        let mut expected = vec![live, done];
        expected.sort();
        assert_eq!(locked, expected, "{name}");

        let stored = store.player_predictions(player, week(8)).unwrap();
        assert_eq!(stored.len(), 1, "{name}");
        assert_eq!(stored[0].match_id, open, "{name}");
        assert_eq!(stored[0].choice, Outcome::Home, "{name}");
    }
}

#[test]
fn resubmitting_replaces_the_earlier_pick() {
    for (name, store) in stores() {
        let store = store.as_ref();
        let player = seed_player(store);
        let m = add_match(store, 9, 10, MatchStatus::Scheduled);

        submit_predictions(store, &submission(player, 9, &[(m, Outcome::Home)])).unwrap();
        let first = store.player_predictions(player, week(9)).unwrap();
        submit_predictions(store, &submission(player, 9, &[(m, Outcome::Away)])).unwrap();
        let second = store.player_predictions(player, week(9)).unwrap();

        assert_eq!(second.len(), 1, "{name}");
        assert_eq!(second[0].id, first[0].id, "{name}");
        assert_eq!(second[0].choice, Outcome::Away, "{name}");
        assert_eq!(second[0].points, 0, "{name}");
    }
}

#[test]
fn rejects_match_from_another_week_without_writing() {
    for (name, store) in stores() {
        let store = store.as_ref();
        let player = seed_player(store);
        let this_week = add_match(store, 10, 20, MatchStatus::Scheduled);
        let next_week = add_match(store, 11, 21, MatchStatus::Scheduled);

        let err = submit_predictions(
            store,
            &submission(
                player,
                10,
                &[(this_week, Outcome::Home), (next_week, Outcome::Draw)],
            ),
        )
        .unwrap_err();
        assert!(err.is_invalid_argument(), "{name}: {err}");
        assert!(store.player_predictions(player, week(10)).unwrap().is_empty(), "{name}");
    }
}

#[test]
fn unknown_player_or_match_is_not_found() {
    for (name, store) in stores() {
        let store = store.as_ref();
        let player = seed_player(store);
        let m = add_match(store, 12, 30, MatchStatus::Scheduled);

        let err = submit_predictions(store, &submission(player + 99, 12, &[(m, Outcome::Home)]))
            .unwrap_err();
        assert!(err.is_not_found(), "{name}: {err}");

        let err = submit_predictions(
            store,
            &submission(player, 12, &[(m, Outcome::Home), (m + 99, Outcome::Draw)]),
        )
        .unwrap_err();
        assert!(err.is_not_found(), "{name}: {err}");
        assert!(store.player_predictions(player, week(12)).unwrap().is_empty(), "{name}");
    }
}

#[test]
fn command_line_picks_feed_a_submission() {
    let picks = parse_picks(&["4=home", "7=D", "9=away"]).unwrap();
    assert_eq!(picks.len(), 3);
    assert_eq!(picks[&7], Outcome::Draw);
    assert!(parse_picks(&["4=maybe"]).unwrap_err().is_invalid_argument());
}
