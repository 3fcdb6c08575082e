//! Playing-card helpers.
//!
//! Cards are encoded as `0..=51`, where:
//! - suit = card / 13 (0..=3)
//! - rank = card % 13 (0..=12)

/// Total cards in a standard deck.
pub const CARDS_PER_DECK: u8 = 52;

/// Ranks per suit.
pub const RANKS_PER_SUIT: u8 = 13;

const RANK_LABELS: [&str; 13] = [
    "A", "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K",
];

const SUIT_LABELS: [&str; 4] = ["♠", "♥", "♦", "♣"];

pub fn is_valid_card(card: u8) -> bool {
    card < CARDS_PER_DECK
}

/// 1-based rank (1..=13), where 1 is Ace and 13 is King.
pub fn rank(card: u8) -> u8 {
    card % RANKS_PER_SUIT + 1
}

pub fn suit(card: u8) -> u8 {
    card / RANKS_PER_SUIT
}

/// Short label such as `10♥`.
pub fn label(card: u8) -> String {
    if !is_valid_card(card) {
        return "??".to_string();
    }
    format!(
        "{}{}",
        RANK_LABELS[(rank(card) - 1) as usize],
        SUIT_LABELS[suit(card) as usize]
    )
}
