//! Round phase controller.
//!
//! A game walks one challenge index at a time through a fixed cycle:
//!
//! ```text
//! waiting -> betting -> playing -> finished -> betting (index + 1) -> ... -> exhausted
//! ```
//!
//! The raw operations ([`update_phase`], [`advance_round`]) write whatever they
//! are given. [`PhaseController`] holds the legality rules that the server checks
//! before calling them, so a stray or duplicated host command is rejected
//! instead of silently overwriting the phase.

use futures::try_join;
use slurk_types::{Game, GameId, Round, RoundPhase, RoundRecord, Team};
use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ledger::results_for;
use crate::state::Store;

/// Pure transition rules for [`RoundPhase`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PhaseController;

impl PhaseController {
    /// Phase that follows `phase` within one challenge index.
    ///
    /// Returns `None` for `Finished`: leaving it requires [`advance_round`].
    pub fn next_phase(phase: RoundPhase) -> Option<RoundPhase> {
        match phase {
            RoundPhase::Waiting => Some(RoundPhase::Betting),
            RoundPhase::Betting => Some(RoundPhase::Playing),
            RoundPhase::Playing => Some(RoundPhase::Finished),
            RoundPhase::Finished => None,
        }
    }

    /// Check that moving from `from` to `to` is the next step of the cycle.
    ///
    /// Entering `finished` additionally requires a recorded winner.
    pub fn check_transition(
        from: RoundPhase,
        to: RoundPhase,
        record: Option<&RoundRecord>,
    ) -> Result<()> {
        if Self::next_phase(from) != Some(to) {
            return Err(Error::IllegalTransition { from, to });
        }
        if to == RoundPhase::Finished && record.and_then(|r| r.winner.as_ref()).is_none() {
            let index = record.map(|r| r.challenge_index).unwrap_or_default();
            return Err(Error::WinnerMissing { index });
        }
        Ok(())
    }

    /// Check that the game may move on to the next challenge index.
    pub fn check_advance(game: &Game) -> Result<()> {
        if game.phase != RoundPhase::Finished {
            return Err(Error::IllegalTransition {
                from: game.phase,
                to: RoundPhase::Betting,
            });
        }
        if Self::is_last_challenge(game) {
            return Err(Error::ChallengesExhausted);
        }
        Ok(())
    }

    /// Check that a winner may be recorded for `index`.
    ///
    /// The current challenge takes a winner only once betting has closed.
    /// Earlier challenges stay correctable; later ones have not been played.
    pub fn check_winner(game: &Game, index: u32) -> Result<()> {
        let current = game.current_challenge_index;
        let open = match index.cmp(&current) {
            Ordering::Less => true,
            Ordering::Equal => {
                matches!(game.phase, RoundPhase::Playing | RoundPhase::Finished)
            }
            Ordering::Greater => false,
        };
        if !open {
            let phase = if index == current {
                game.phase
            } else {
                RoundPhase::Waiting
            };
            return Err(Error::WinnerTooEarly { index, phase });
        }
        Ok(())
    }

    /// True when no challenge follows the current one.
    pub fn is_last_challenge(game: &Game) -> bool {
        game.current_challenge_index as usize + 1 >= game.challenges.len()
    }

    /// True once the last challenge has been played out.
    pub fn is_game_over(game: &Game) -> bool {
        game.is_exhausted() || (game.phase == RoundPhase::Finished && Self::is_last_challenge(game))
    }
}

/// Load a game or fail with [`Error::GameNotFound`].
pub async fn load_game<S: Store>(store: &S, game_id: &GameId) -> Result<Game> {
    store
        .game(game_id)
        .await?
        .ok_or(Error::GameNotFound(*game_id))
}

/// Assemble the projection for one challenge index.
///
/// The game row, the round record and the bets are read concurrently.
pub async fn fetch_round<S: Store>(store: &S, game_id: &GameId, index: u32) -> Result<Round> {
    let (game, record, bets) = try_join!(
        store.game(game_id),
        store.round(game_id, index),
        store.bets(game_id, index),
    )?;
    let game = game.ok_or(Error::GameNotFound(*game_id))?;
    let challenge = game
        .challenge(index)
        .cloned()
        .ok_or(Error::ChallengeNotFound { index })?;

    let (selected_names, winner) = match record {
        Some(record) => (record.selected_teams, record.winner),
        None => (Vec::new(), None),
    };
    let selected_teams: Vec<Team> = selected_names
        .iter()
        .filter_map(|name| {
            let team = game.team(name).cloned();
            if team.is_none() {
                warn!(%game_id, index, team = %name, "selected team missing from roster");
            }
            team
        })
        .collect();
    let results = match winner.as_deref() {
        Some(winner) => results_for(&bets, winner),
        None => Vec::new(),
    };

    debug!(%game_id, index, phase = %game.phase, bets = bets.len(), "fetched round");
    Ok(Round {
        phase: game.phase,
        challenge_index: index,
        challenge,
        selected_teams,
        winner,
        results,
        game,
    })
}

/// Overwrite the game's phase. No legality check; see [`PhaseController`].
pub async fn update_phase<S: Store>(
    store: &mut S,
    game_id: &GameId,
    phase: RoundPhase,
) -> Result<Game> {
    let mut game = load_game(store, game_id).await?;
    game.phase = phase;
    store.put_game(game.clone()).await?;
    debug!(%game_id, %phase, "phase updated");
    Ok(game)
}

/// Move to the next challenge index and reopen betting.
///
/// The index bump goes through the store's atomic counter so concurrent
/// advances never lose an increment.
pub async fn advance_round<S: Store>(store: &mut S, game_id: &GameId) -> Result<Game> {
    let index = store.increment_index(game_id).await?;
    let mut game = load_game(store, game_id).await?;
    game.current_challenge_index = index;
    game.phase = RoundPhase::Betting;
    store.put_game(game.clone()).await?;
    debug!(%game_id, index, "advanced round");
    Ok(game)
}

/// Record the winner (a team name or outcome token) for `index`.
pub async fn declare_winner<S: Store>(
    store: &mut S,
    game_id: &GameId,
    index: u32,
    winner: &str,
) -> Result<RoundRecord> {
    let game = load_game(store, game_id).await?;
    if game.challenge(index).is_none() {
        return Err(Error::ChallengeNotFound { index });
    }
    let mut record = store
        .round(game_id, index)
        .await?
        .unwrap_or_else(|| RoundRecord::new(*game_id, index));
    record.winner = Some(winner.to_string());
    store.put_round(record.clone()).await?;
    Ok(record)
}

/// Whether a projection has everything its phase needs to render.
pub fn is_round_ready(round: Option<&Round>, is_transitioning: bool) -> bool {
    let Some(round) = round else {
        return false;
    };
    if is_transitioning || round.game.teams.is_empty() {
        return false;
    }
    match round.phase {
        RoundPhase::Betting | RoundPhase::Playing => !round.selected_teams.is_empty(),
        RoundPhase::Finished => round.winner.is_some(),
        RoundPhase::Waiting => true,
    }
}
