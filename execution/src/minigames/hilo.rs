//! High-low card guessing.
//!
//! A card is dealt face up. Guess whether the next one is higher, lower or the
//! same rank (Ace low, King high). Each correct guess multiplies the pot by the
//! fair odds of that guess; a tie on higher/lower is a push. A wrong guess loses
//! the stake; cashing out pays the pot minus the stake.
//!
//! Cards are drawn with replacement.

use slurk_types::{MinigameKind, MinigameResult};

use super::{cards, MinigameError, MinigameRng};

/// Pot multiplier in basis points (1.0 = 10000).
pub const BASE_MULTIPLIER: u64 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Guess {
    Higher,
    Lower,
    Same,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Push,
    Wrong,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Draw {
    pub card: u8,
    pub verdict: Verdict,
    /// Pot multiplier after this draw, in basis points.
    pub multiplier: u64,
}

/// Multiplier for a correct `guess` from `rank`, or `None` if the guess cannot win.
pub fn multiplier_for(rank: u8, guess: Guess) -> Option<u64> {
    let winning_ranks = match guess {
        Guess::Same => 1,
        Guess::Higher => 13u64.checked_sub(u64::from(rank))?,
        Guess::Lower => u64::from(rank).checked_sub(1)?,
    };
    (winning_ranks > 0).then(|| 13 * BASE_MULTIPLIER / winning_ranks)
}

#[derive(Clone, Debug)]
pub struct HiLo {
    stake: u64,
    current: u8,
    multiplier: u64,
    streak: u32,
    result: Option<MinigameResult>,
}

impl HiLo {
    pub fn new(rng: &mut MinigameRng, stake: u64) -> Result<Self, MinigameError> {
        if stake == 0 {
            return Err(MinigameError::InvalidStake);
        }
        Ok(Self {
            stake,
            current: rng.draw_card(),
            multiplier: BASE_MULTIPLIER,
            streak: 0,
            result: None,
        })
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Current pot, stake included.
    pub fn pot(&self) -> u64 {
        let pot = u128::from(self.stake) * u128::from(self.multiplier) / u128::from(BASE_MULTIPLIER);
        u64::try_from(pot).unwrap_or(u64::MAX)
    }

    pub fn result(&self) -> Option<&MinigameResult> {
        self.result.as_ref()
    }

    pub fn guess(&mut self, rng: &mut MinigameRng, guess: Guess) -> Result<Draw, MinigameError> {
        let card = rng.draw_card();
        self.resolve(guess, card)
    }

    fn resolve(&mut self, guess: Guess, card: u8) -> Result<Draw, MinigameError> {
        if self.result.is_some() {
            return Err(MinigameError::GameComplete);
        }
        let rank = cards::rank(self.current);
        let odds = multiplier_for(rank, guess).ok_or_else(|| {
            MinigameError::InvalidMove(format!("{guess:?} cannot win from {}", cards::label(self.current)))
        })?;

        let next = cards::rank(card);
        let verdict = match guess {
            Guess::Same if next == rank => Verdict::Correct,
            Guess::Higher if next > rank => Verdict::Correct,
            Guess::Lower if next < rank => Verdict::Correct,
            Guess::Higher | Guess::Lower if next == rank => Verdict::Push,
            _ => Verdict::Wrong,
        };
        match verdict {
            Verdict::Correct => {
                self.multiplier = self.multiplier.saturating_mul(odds) / BASE_MULTIPLIER;
                self.streak += 1;
            }
            Verdict::Push => {}
            Verdict::Wrong => {
                self.result = Some(MinigameResult::lost(MinigameKind::HiLo, self.stake));
            }
        }
        self.current = card;
        Ok(Draw {
            card,
            verdict,
            multiplier: self.multiplier,
        })
    }

    /// Take the pot and end the game.
    pub fn cash_out(&mut self) -> Result<MinigameResult, MinigameError> {
        if self.result.is_some() {
            return Err(MinigameError::GameComplete);
        }
        let winnings = self.pot().saturating_sub(self.stake);
        let result = if winnings > 0 {
            MinigameResult::won(MinigameKind::HiLo, winnings)
        } else {
            MinigameResult::lost(MinigameKind::HiLo, 0)
        };
        self.result = Some(result.clone());
        Ok(result)
    }
}
