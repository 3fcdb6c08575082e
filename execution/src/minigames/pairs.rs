//! Memory pair-matching with a life counter.
//!
//! Cards lie face down. Flip two at a time: a match stays face up, a miss costs
//! a life. Matching every pair wins; running out of lives loses.

use rand::seq::SliceRandom;
use slurk_types::{MinigameKind, MinigameResult};

use super::{MinigameError, MinigameRng};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairsConfig {
    pub pairs: usize,
    pub lives: u8,
    /// Slurks handed out for clearing the board.
    pub reward: u64,
    /// Slurks to drink when the lives run out.
    pub penalty: u64,
}

impl Default for PairsConfig {
    fn default() -> Self {
        Self {
            pairs: 6,
            lives: 3,
            reward: 5,
            penalty: 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flip {
    /// First card of a turn.
    First { card: u8 },
    Match { card: u8 },
    Miss { first: u8, second: u8, lives: u8 },
}

#[derive(Clone, Debug)]
pub struct Pairs {
    config: PairsConfig,
    board: Vec<u8>,
    matched: Vec<bool>,
    pending: Option<usize>,
    lives: u8,
}

impl Pairs {
    pub fn new(rng: &mut MinigameRng, config: PairsConfig) -> Result<Self, MinigameError> {
        if config.pairs == 0 || config.pairs > usize::from(super::cards::CARDS_PER_DECK) {
            return Err(MinigameError::InvalidConfig(format!(
                "cannot deal {} pairs",
                config.pairs
            )));
        }
        if config.lives == 0 {
            return Err(MinigameError::InvalidConfig("at least one life is required".into()));
        }

        let faces: Vec<u8> = rng.create_deck().into_iter().take(config.pairs).collect();
        let mut board: Vec<u8> = faces.iter().chain(faces.iter()).copied().collect();
        board.shuffle(rng);
        Ok(Self {
            matched: vec![false; board.len()],
            board,
            pending: None,
            lives: config.lives,
            config,
        })
    }

    pub fn len(&self) -> usize {
        self.board.len()
    }

    pub fn is_empty(&self) -> bool {
        self.board.is_empty()
    }

    pub fn lives(&self) -> u8 {
        self.lives
    }

    pub fn is_matched(&self, index: usize) -> bool {
        self.matched.get(index).copied().unwrap_or(false)
    }

    /// Face of a card that is currently showing.
    pub fn face_up(&self, index: usize) -> Option<u8> {
        (self.is_matched(index) || self.pending == Some(index)).then(|| self.board[index])
    }

    pub fn is_complete(&self) -> bool {
        self.lives == 0 || self.matched.iter().all(|m| *m)
    }

    pub fn flip(&mut self, index: usize) -> Result<Flip, MinigameError> {
        if self.is_complete() {
            return Err(MinigameError::GameComplete);
        }
        if index >= self.board.len() {
            return Err(MinigameError::InvalidMove(format!("no card at {index}")));
        }
        if self.matched[index] || self.pending == Some(index) {
            return Err(MinigameError::InvalidMove(format!("card {index} is already face up")));
        }

        let card = self.board[index];
        let Some(first_index) = self.pending.take() else {
            self.pending = Some(index);
            return Ok(Flip::First { card });
        };
        let first = self.board[first_index];
        if first == card {
            self.matched[first_index] = true;
            self.matched[index] = true;
            Ok(Flip::Match { card })
        } else {
            self.lives -= 1;
            Ok(Flip::Miss {
                first,
                second: card,
                lives: self.lives,
            })
        }
    }

    /// `None` while the game is still running.
    pub fn result(&self) -> Option<MinigameResult> {
        if self.matched.iter().all(|m| *m) {
            Some(MinigameResult::won(MinigameKind::Pairs, self.config.reward))
        } else if self.lives == 0 {
            Some(MinigameResult::lost(MinigameKind::Pairs, self.config.penalty))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partner(game: &Pairs, index: usize) -> usize {
        (0..game.len())
            .find(|&i| i != index && game.board[i] == game.board[index])
            .unwrap()
    }

    fn mismatch(game: &Pairs, index: usize) -> usize {
        (0..game.len())
            .find(|&i| !game.matched[i] && game.board[i] != game.board[index])
            .unwrap()
    }

    #[test]
    fn test_board_holds_each_face_twice() {
        let game = Pairs::new(&mut MinigameRng::seeded(1), PairsConfig::default()).unwrap();
        assert_eq!(game.len(), 12);
        for i in 0..game.len() {
            let count = game.board.iter().filter(|c| **c == game.board[i]).count();
            assert_eq!(count, 2);
        }
    }

    #[test]
    fn test_perfect_game_wins() {
        let mut game = Pairs::new(&mut MinigameRng::seeded(2), PairsConfig::default()).unwrap();
        while game.result().is_none() {
            let first = (0..game.len()).find(|&i| !game.is_matched(i)).unwrap();
            assert!(matches!(game.flip(first), Ok(Flip::First { .. })));
            assert_eq!(game.face_up(first), Some(game.board[first]));
            let second = partner(&game, first);
            assert!(matches!(game.flip(second), Ok(Flip::Match { .. })));
        }
        assert_eq!(game.result(), Some(MinigameResult::won(MinigameKind::Pairs, 5)));
        assert_eq!(game.lives(), 3);
        assert_eq!(game.flip(0), Err(MinigameError::GameComplete));
    }

    #[test]
    fn test_running_out_of_lives_loses() {
        let mut game = Pairs::new(&mut MinigameRng::seeded(3), PairsConfig::default()).unwrap();
        for expected in (0..3).rev() {
            game.flip(0).unwrap();
            let other = mismatch(&game, 0);
            match game.flip(other).unwrap() {
                Flip::Miss { lives, .. } => assert_eq!(lives, expected),
                flip => panic!("unexpected flip {flip:?}"),
            }
        }
        assert!(game.is_complete());
        assert_eq!(game.result(), Some(MinigameResult::lost(MinigameKind::Pairs, 3)));
    }

    #[test]
    fn test_invalid_flips() {
        let mut game = Pairs::new(&mut MinigameRng::seeded(4), PairsConfig::default()).unwrap();
        assert!(matches!(game.flip(99), Err(MinigameError::InvalidMove(_))));
        game.flip(0).unwrap();
        assert!(matches!(game.flip(0), Err(MinigameError::InvalidMove(_))));
        let second = partner(&game, 0);
        game.flip(second).unwrap();
        assert!(matches!(game.flip(second), Err(MinigameError::InvalidMove(_))));
        assert!(game.face_up(second).is_some());
    }

    #[test]
    fn test_invalid_config() {
        let mut rng = MinigameRng::seeded(5);
        let none = PairsConfig {
            pairs: 0,
            ..PairsConfig::default()
        };
        assert!(Pairs::new(&mut rng, none).is_err());
        let no_lives = PairsConfig {
            lives: 0,
            ..PairsConfig::default()
        };
        assert!(Pairs::new(&mut rng, no_lives).is_err());
    }
}
