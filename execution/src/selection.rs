//! Per-challenge team selection.
//!
//! The first call for an index draws the participating teams and stores them on
//! the round record. Every later call returns the stored selection unchanged.

use rand::{seq::SliceRandom, Rng};
use slurk_types::{
    Challenge, GameId, MatchupType, RoundRecord, TeamInvariantError, OUTCOME_FAILURE,
    OUTCOME_SUCCESS,
};
use tracing::info;

use crate::error::{Error, Result};
use crate::round::load_game;
use crate::state::Store;

/// Return the teams drawn for `index`, drawing and persisting them first if needed.
pub async fn select_teams<S: Store>(
    store: &mut S,
    rng: &mut impl Rng,
    game_id: &GameId,
    index: u32,
) -> Result<RoundRecord> {
    let game = load_game(store, game_id).await?;
    let challenge = game
        .challenge(index)
        .ok_or(Error::ChallengeNotFound { index })?;

    let mut record = store
        .round(game_id, index)
        .await?
        .unwrap_or_else(|| RoundRecord::new(*game_id, index));
    if !record.selected_teams.is_empty() {
        return Ok(record);
    }

    let needed = challenge.matchup.team_count();
    if game.teams.len() < needed {
        return Err(TeamInvariantError::NotEnoughTeams {
            needed,
            got: game.teams.len(),
        }
        .into());
    }

    let mut names: Vec<String> = game.teams.iter().map(|team| team.name.clone()).collect();
    names.shuffle(rng);
    names.truncate(needed);
    record.selected_teams = names;
    store.put_round(record.clone()).await?;
    info!(%game_id, index, teams = ?record.selected_teams, "selected teams");
    Ok(record)
}

/// Tokens a prediction or declared winner may take for this challenge.
pub fn round_outcomes(challenge: &Challenge, selected_teams: &[String]) -> Vec<String> {
    match challenge.matchup {
        MatchupType::TeamVsItself => vec![OUTCOME_SUCCESS.to_string(), OUTCOME_FAILURE.to_string()],
        MatchupType::OneVsOne | MatchupType::TeamVsTeam => selected_teams.to_vec(),
    }
}

/// Reject `outcome` unless it is one of [`round_outcomes`].
pub fn check_outcome(challenge: &Challenge, selected_teams: &[String], outcome: &str) -> Result<()> {
    let expected = round_outcomes(challenge, selected_teams);
    if expected.iter().any(|token| token == outcome) {
        return Ok(());
    }
    Err(Error::InvalidOutcome {
        outcome: outcome.to_string(),
        expected,
    })
}
