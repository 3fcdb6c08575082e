//! Single-zero roulette.
//!
//! Bets and payouts (winnings exclude the returned stake):
//! - straight (one number, 35:1)
//! - red / black / even / odd / low (1-18) / high (19-36), 1:1
//! - dozen (1-12, 13-24, 25-36) and column, 2:1
//!
//! Zero loses everything except a straight bet on zero.

use slurk_types::{MinigameKind, MinigameResult};
use std::fmt;
use std::str::FromStr;

use super::{MinigameError, MinigameRng};

/// Highest number on the wheel.
pub const MAX_NUMBER: u8 = 36;

const RED_NUMBERS: [u8; 18] = [1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bet {
    Straight(u8),
    Red,
    Black,
    Even,
    Odd,
    Low,
    High,
    /// 0, 1 or 2 for 1-12, 13-24, 25-36.
    Dozen(u8),
    /// 0, 1 or 2 for the column starting at 1, 2 or 3.
    Column(u8),
}

impl Bet {
    fn validate(self) -> Result<Self, MinigameError> {
        match self {
            Bet::Straight(n) if n > MAX_NUMBER => {
                Err(MinigameError::InvalidBet(format!("no number {n} on the wheel")))
            }
            Bet::Dozen(n) | Bet::Column(n) if n > 2 => {
                Err(MinigameError::InvalidBet(format!("{n} is not 0, 1 or 2")))
            }
            bet => Ok(bet),
        }
    }

    /// Winnings per unit staked.
    pub fn payout_multiplier(self) -> u64 {
        match self {
            Bet::Straight(_) => 35,
            Bet::Red | Bet::Black | Bet::Even | Bet::Odd | Bet::Low | Bet::High => 1,
            Bet::Dozen(_) | Bet::Column(_) => 2,
        }
    }

    pub fn wins(self, result: u8) -> bool {
        if result == 0 {
            return self == Bet::Straight(0);
        }
        match self {
            Bet::Straight(n) => n == result,
            Bet::Red => is_red(result),
            Bet::Black => !is_red(result),
            Bet::Even => result % 2 == 0,
            Bet::Odd => result % 2 == 1,
            Bet::Low => (1..=18).contains(&result),
            Bet::High => (19..=36).contains(&result),
            Bet::Dozen(n) => (result - 1) / 12 == n,
            Bet::Column(n) => (result - 1) % 3 == n,
        }
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bet::Straight(n) => write!(f, "{n}"),
            Bet::Red => f.write_str("red"),
            Bet::Black => f.write_str("black"),
            Bet::Even => f.write_str("even"),
            Bet::Odd => f.write_str("odd"),
            Bet::Low => f.write_str("low"),
            Bet::High => f.write_str("high"),
            Bet::Dozen(n) => write!(f, "dozen:{n}"),
            Bet::Column(n) => write!(f, "column:{n}"),
        }
    }
}

impl FromStr for Bet {
    type Err = MinigameError;

    /// Accepts `red`, `17`, `dozen:1`, `column:2` and so on.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        let invalid = || MinigameError::InvalidBet(value.clone());
        let bet = match value.split_once(':') {
            Some(("dozen", n)) => Bet::Dozen(n.parse().map_err(|_| invalid())?),
            Some(("column", n)) => Bet::Column(n.parse().map_err(|_| invalid())?),
            Some(_) => return Err(invalid()),
            None => match value.as_str() {
                "red" => Bet::Red,
                "black" => Bet::Black,
                "even" => Bet::Even,
                "odd" => Bet::Odd,
                "low" => Bet::Low,
                "high" => Bet::High,
                n => Bet::Straight(n.parse().map_err(|_| invalid())?),
            },
        };
        bet.validate()
    }
}

fn is_red(number: u8) -> bool {
    RED_NUMBERS.contains(&number)
}

/// Outcome of one spin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spin {
    pub number: u8,
    pub result: MinigameResult,
}

/// Score `bet` against a known wheel `number`.
pub fn settle(bet: Bet, stake: u64, number: u8) -> Result<Spin, MinigameError> {
    if stake == 0 {
        return Err(MinigameError::InvalidStake);
    }
    let bet = bet.validate()?;
    let result = if bet.wins(number) {
        MinigameResult::won(
            MinigameKind::Roulette,
            stake.saturating_mul(bet.payout_multiplier()),
        )
    } else {
        MinigameResult::lost(MinigameKind::Roulette, stake)
    };
    Ok(Spin { number, result })
}

/// Spin the wheel for `bet`.
pub fn spin(rng: &mut MinigameRng, bet: Bet, stake: u64) -> Result<Spin, MinigameError> {
    settle(bet, stake, rng.spin_roulette())
}
