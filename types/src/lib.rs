//! Common types shared by the slurk execution layer, server and client.
//!
//! Everything in this crate is plain data: rows of the backing store
//! ([`Game`], [`RoundRecord`], [`Bet`]), the [`Round`] projection clients
//! render from, minigame outcomes, and the JSON wire messages in [`api`].

pub mod api;
pub mod game;
pub mod minigame;

pub use game::{
    normalize_code, Bet, BettingResult, Challenge, Game, GameId, MatchupType, Player, Round,
    RoundPhase, RoundRecord, Team, TeamInvariantError, CODE_ALPHABET, CODE_LENGTH, OUTCOME_FAILURE,
    OUTCOME_SUCCESS,
};
pub use minigame::{MinigameKind, MinigameResult};
