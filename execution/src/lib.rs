//! Slurk execution layer.
//!
//! This crate holds the game rules that the server runs on behalf of every client:
//! the round phase controller, team selection, the betting ledger, game lifecycle
//! and the standalone minigames. All of it is written against the [`Store`] trait so
//! the same logic runs over the in-process [`Memory`] store or any other backend.
//!
//! ## Determinism requirements
//! - Do not read the wall clock here. Callers pass `now_ms` in.
//! - Draws that shape a game (codes, teams, challenges, minigames) take a caller-provided
//!   [`rand::Rng`], so seeded runs replay exactly.
//! - Avoid iteration order of hash-based collections influencing outputs.
//!
//! ## Round lifecycle (example)
//! ```rust,ignore
//! use slurk_execution::{ledger, lifecycle, round, Memory};
//! use slurk_types::{RoundPhase, Team};
//!
//! # async fn example(rng: &mut impl rand::Rng) -> slurk_execution::Result<()> {
//! let mut store = Memory::default();
//! let game = lifecycle::create_game(
//!     &mut store,
//!     rng,
//!     lifecycle::NewGame::new("Ola", vec![Team::new("A"), Team::new("B")]),
//!     0,
//! )
//! .await?;
//! round::update_phase(&mut store, &game.id, RoundPhase::Betting).await?;
//! ledger::submit_bet(&mut store, &game.id, "A", 0, 20, "A", 1).await?;
//! round::declare_winner(&mut store, &game.id, 0, "A").await?;
//! let round = round::fetch_round(&store, &game.id, 0).await?;
//! assert!(round.results[0].is_correct);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod minigames;
pub mod round;
pub mod selection;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod test_helpers;

mod state;

pub use error::{Error, ErrorKind, Result};
pub use round::PhaseController;
pub use state::{Change, Memory, Store};
