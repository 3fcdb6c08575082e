//! Standalone games of chance.
//!
//! Minigames never touch the store. Each one runs locally from a
//! [`MinigameRng`] and reports a [`slurk_types::MinigameResult`] to the caller,
//! which decides what (if anything) to do with the slurks won or lost.

use rand::{rngs::StdRng, seq::SliceRandom, Rng, RngCore, SeedableRng};
use thiserror::Error;

pub mod cards;
pub mod hilo;
pub mod pairs;
pub mod roulette;
pub mod wheel;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MinigameError {
    #[error("the game is already over")]
    GameComplete,
    #[error("invalid move: {0}")]
    InvalidMove(String),
    #[error("invalid bet: {0}")]
    InvalidBet(String),
    #[error("stake must be positive")]
    InvalidStake,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Random source shared by every minigame.
#[derive(Clone, Debug)]
pub struct MinigameRng(StdRng);

impl MinigameRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    /// A freshly shuffled 52-card deck.
    pub fn create_deck(&mut self) -> Vec<u8> {
        let mut deck: Vec<u8> = (0..cards::CARDS_PER_DECK).collect();
        deck.shuffle(&mut self.0);
        deck
    }

    /// One card drawn with replacement.
    pub fn draw_card(&mut self) -> u8 {
        self.0.gen_range(0..cards::CARDS_PER_DECK)
    }

    /// A European wheel result (0..=36).
    pub fn spin_roulette(&mut self) -> u8 {
        self.0.gen_range(0..=roulette::MAX_NUMBER)
    }
}

impl RngCore for MinigameRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}
