use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::GameError;
use crate::model::{GameWeek, MatchId, Outcome, PlayerId};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Submission {
    pub player_id: PlayerId,
    pub game_week: GameWeek,
    pub picks: BTreeMap<MatchId, Outcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub saved: usize,
    pub locked: Vec<MatchId>,
}

// Everything is validated before the first write.
pub fn submit_predictions(
    store: &dyn Store,
    submission: &Submission,
) -> Result<SubmissionOutcome, GameError> {
    let player = store
        .player(submission.player_id)?
        .ok_or_else(|| GameError::player_not_found(submission.player_id))?;

    let mut open = Vec::new();
    let mut locked = Vec::new();
    for (match_id, choice) in &submission.picks {
        let m = store
            .match_by_id(*match_id)?
            .ok_or_else(|| GameError::match_not_found(*match_id))?;
        if m.game_week != submission.game_week {
            return Err(GameError::InvalidArgument(format!(
                "match {match_id} belongs to game week {}, not {}",
                m.game_week, submission.game_week
            )));
        }
        if m.status.accepts_picks() {
            open.push((*match_id, *choice));
        } else {
            locked.push(*match_id);
        }
    }

    for (match_id, choice) in &open {
        store.replace_prediction(player.id, *match_id, *choice)?;
    }
    if !locked.is_empty() {
        warn!(
            player = %player.name,
            week = submission.game_week.number(),
            ?locked,
            "ignored picks on matches that already started"
        );
    }
    info!(
        player = %player.name,
        week = submission.game_week.number(),
        saved = open.len(),
        "stored predictions"
    );
    Ok(SubmissionOutcome {
        saved: open.len(),
        locked,
    })
}

pub fn parse_picks<S: AsRef<str>>(raw: &[S]) -> Result<BTreeMap<MatchId, Outcome>, GameError> {
    let mut picks = BTreeMap::new();
    for item in raw {
        let item = item.as_ref();
        let Some((id, choice)) = item.split_once('=') else {
            return Err(GameError::InvalidArgument(format!(
                "expected <match_id>=<choice>, got {item:?}"
            )));
        };
        let id = id
            .trim()
            .parse::<MatchId>()
            .map_err(|_| GameError::InvalidArgument(format!("not a match id: {id:?}")))?;
        picks.insert(id, choice.parse::<Outcome>()?);
    }
    Ok(picks)
}
