use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl GameError {
    pub fn player_not_found(id: i64) -> Self {
        GameError::NotFound {
            entity: "player",
            id,
        }
    }

    pub fn match_not_found(id: i64) -> Self {
        GameError::NotFound { entity: "match", id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GameError::NotFound { .. })
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, GameError::InvalidArgument(_))
    }
}
