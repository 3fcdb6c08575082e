//! Fixed challenge dataset and per-game sampling.

use rand::{seq::index, Rng};
use slurk_types::{Challenge, MatchupType};

/// Compile-time challenge definition.
#[derive(Clone, Copy, Debug)]
pub struct Definition {
    pub title: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub matchup: MatchupType,
    pub odds: &'static str,
    pub participants: Option<&'static [&'static str]>,
}

impl Definition {
    pub fn to_challenge(&self) -> Challenge {
        Challenge {
            title: self.title.to_string(),
            description: self.description.to_string(),
            category: self.category.to_string(),
            matchup: self.matchup,
            odds: self.odds.to_string(),
            participants: self
                .participants
                .map(|names| names.iter().map(|name| name.to_string()).collect()),
        }
    }
}

const fn def(
    title: &'static str,
    description: &'static str,
    category: &'static str,
    matchup: MatchupType,
    odds: &'static str,
) -> Definition {
    Definition {
        title,
        description,
        category,
        matchup,
        odds,
        participants: None,
    }
}

const CAPTAINS: &[&str] = &["captain", "captain"];

pub static CHALLENGES: &[Definition] = &[
    def(
        "Coin Tower",
        "Stack as many coins as you can in 30 seconds. Highest stack wins.",
        "skill",
        MatchupType::OneVsOne,
        "1:1",
    ),
    def(
        "Rock Paper Scissors",
        "Best of five. No delays, no take-backs.",
        "luck",
        MatchupType::OneVsOne,
        "1:1",
    ),
    def(
        "Staring Contest",
        "First to blink or laugh loses.",
        "endurance",
        MatchupType::OneVsOne,
        "1:1",
    ),
    def(
        "Arm Wrestling",
        "Elbows on the table. Best of three.",
        "strength",
        MatchupType::OneVsOne,
        "1:1",
    ),
    Definition {
        participants: Some(CAPTAINS),
        ..def(
            "Captain's Duel",
            "The two team captains name songs by the same artist in turn. First to stall loses.",
            "knowledge",
            MatchupType::OneVsOne,
            "1:1",
        )
    },
    def(
        "Tongue Twister",
        "Say the tongue twister three times fast without a slip.",
        "speech",
        MatchupType::OneVsOne,
        "2:1",
    ),
    def(
        "Quiz Sprint",
        "Ten quick general knowledge questions. Most correct answers wins.",
        "knowledge",
        MatchupType::TeamVsTeam,
        "1:1",
    ),
    def(
        "Charades",
        "Act out as many words as possible in one minute.",
        "performance",
        MatchupType::TeamVsTeam,
        "1:1",
    ),
    def(
        "Human Pyramid",
        "Build the tallest stable pyramid and hold it for five seconds.",
        "teamwork",
        MatchupType::TeamVsTeam,
        "3:2",
    ),
    def(
        "Hum That Tune",
        "One player hums, the rest of the team guesses. Most songs in 90 seconds wins.",
        "music",
        MatchupType::TeamVsTeam,
        "1:1",
    ),
    def(
        "Pictionary",
        "Draw and guess. First team to five correct guesses wins.",
        "creativity",
        MatchupType::TeamVsTeam,
        "1:1",
    ),
    def(
        "Tug of War",
        "Any rope will do. First team across the line loses.",
        "strength",
        MatchupType::TeamVsTeam,
        "1:1",
    ),
    def(
        "Alphabet Chain",
        "Name animals from A to Z in order, alternating between teams. A miss ends it.",
        "knowledge",
        MatchupType::TeamVsTeam,
        "1:1",
    ),
    def(
        "Silent Line-Up",
        "Line up by birthday without speaking, within 60 seconds.",
        "teamwork",
        MatchupType::TeamVsItself,
        "2:1",
    ),
    def(
        "Cup Flip Relay",
        "Every player flips a cup onto its rim in turn. Finish within 45 seconds.",
        "skill",
        MatchupType::TeamVsItself,
        "3:1",
    ),
    def(
        "Name the Capitals",
        "Name ten European capitals in 30 seconds.",
        "knowledge",
        MatchupType::TeamVsItself,
        "1:1",
    ),
    def(
        "Balloon Keep-Up",
        "Keep a balloon in the air for a full minute without touching it twice in a row.",
        "teamwork",
        MatchupType::TeamVsItself,
        "2:1",
    ),
    def(
        "Plank Challenge",
        "The whole team holds a plank for 60 seconds.",
        "endurance",
        MatchupType::TeamVsItself,
        "3:2",
    ),
    def(
        "Lyrics Recall",
        "Sing the full chorus of a song picked by the other teams.",
        "music",
        MatchupType::TeamVsItself,
        "2:1",
    ),
    def(
        "Paper Plane",
        "Fold a plane that flies further than five metres.",
        "creativity",
        MatchupType::TeamVsItself,
        "1:1",
    ),
];

/// Sample `count` challenges without replacement. Returns fewer if the
/// dataset is smaller than `count`.
pub fn draw(count: usize, rng: &mut impl Rng) -> Vec<Challenge> {
    let amount = count.min(CHALLENGES.len());
    index::sample(rng, CHALLENGES.len(), amount)
        .into_iter()
        .map(|i| CHALLENGES[i].to_challenge())
        .collect()
}
