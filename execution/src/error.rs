use slurk_types::{GameId, RoundPhase, TeamInvariantError};
use thiserror::Error;

/// Coarse error taxonomy used by callers to decide how to surface a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A game, challenge, team or row is missing.
    NotFound,
    /// The request was well-formed but breaks a game rule.
    Validation,
    /// The caller lacks the host credential.
    Unauthorized,
    /// The backing store failed.
    Backend,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("game not found: {0}")]
    GameNotFound(GameId),
    #[error("no game with code {0}")]
    CodeNotFound(String),
    #[error("challenge {index} not found")]
    ChallengeNotFound { index: u32 },
    #[error("team not found: {0}")]
    TeamNotFound(String),
    #[error("team {team} already placed a bet on challenge {index}")]
    DuplicateBet { team: String, index: u32 },
    #[error("insufficient balance for {team}: balance {balance}, wagered {amount}")]
    InsufficientBalance {
        team: String,
        balance: u64,
        amount: u64,
    },
    #[error("bet amount must be positive")]
    InvalidAmount,
    #[error("prediction must not be empty")]
    EmptyPrediction,
    #[error("invalid outcome {outcome} (expected one of {expected:?})")]
    InvalidOutcome {
        outcome: String,
        expected: Vec<String>,
    },
    #[error("invalid teams: {0}")]
    Teams(#[from] TeamInvariantError),
    #[error("illegal phase transition from {from} to {to}")]
    IllegalTransition { from: RoundPhase, to: RoundPhase },
    #[error("betting is closed (phase {phase})")]
    BettingClosed { phase: RoundPhase },
    #[error("bet targets challenge {got} but the current challenge is {current}")]
    StaleChallenge { current: u32, got: u32 },
    #[error("no winner recorded for challenge {index}")]
    WinnerMissing { index: u32 },
    #[error("winner for challenge {index} cannot be declared during {phase}")]
    WinnerTooEarly { index: u32, phase: RoundPhase },
    #[error("challenge {index} already settled")]
    AlreadySettled { index: u32 },
    #[error("all challenges have been played")]
    ChallengesExhausted,
    #[error("payouts are disabled")]
    PayoutsDisabled,
    #[error("host token missing or invalid")]
    Unauthorized,
    #[error("could not allocate a unique join code")]
    CodeSpaceExhausted,
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::GameNotFound(_)
            | Error::CodeNotFound(_)
            | Error::ChallengeNotFound { .. }
            | Error::TeamNotFound(_) => ErrorKind::NotFound,
            Error::Unauthorized => ErrorKind::Unauthorized,
            Error::Store(_) | Error::CodeSpaceExhausted => ErrorKind::Backend,
            _ => ErrorKind::Validation,
        }
    }

    /// Stable machine-readable code for wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::GameNotFound(_) => "GAME_NOT_FOUND",
            Error::CodeNotFound(_) => "CODE_NOT_FOUND",
            Error::ChallengeNotFound { .. } => "CHALLENGE_NOT_FOUND",
            Error::TeamNotFound(_) => "TEAM_NOT_FOUND",
            Error::DuplicateBet { .. } => "DUPLICATE_BET",
            Error::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Error::InvalidAmount => "INVALID_AMOUNT",
            Error::EmptyPrediction => "EMPTY_PREDICTION",
            Error::InvalidOutcome { .. } => "INVALID_OUTCOME",
            Error::Teams(_) => "INVALID_TEAMS",
            Error::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            Error::BettingClosed { .. } => "BETTING_CLOSED",
            Error::StaleChallenge { .. } => "STALE_CHALLENGE",
            Error::WinnerMissing { .. } => "WINNER_MISSING",
            Error::WinnerTooEarly { .. } => "WINNER_TOO_EARLY",
            Error::AlreadySettled { .. } => "ALREADY_SETTLED",
            Error::ChallengesExhausted => "CHALLENGES_EXHAUSTED",
            Error::PayoutsDisabled => "PAYOUTS_DISABLED",
            Error::Unauthorized => "UNAUTHORIZED",
            Error::CodeSpaceExhausted => "CODE_SPACE_EXHAUSTED",
            Error::Store(_) => "STORE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_kinds_follow_taxonomy() {
        assert_eq!(Error::GameNotFound(Uuid::nil()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::InvalidAmount.kind(), ErrorKind::Validation);
        assert_eq!(Error::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            Error::Store(anyhow::anyhow!("boom")).kind(),
            ErrorKind::Backend
        );
    }

    #[test]
    fn test_codes_are_screaming_snake() {
        let err = Error::DuplicateBet {
            team: "A".into(),
            index: 0,
        };
        assert_eq!(err.code(), "DUPLICATE_BET");
        assert_eq!(err.to_string(), "team A already placed a bet on challenge 0");
    }
}
