//! Weighted prize wheel.

use rand::distributions::{Distribution, WeightedIndex};
use slurk_types::{MinigameKind, MinigameResult};

use super::{MinigameError, MinigameRng};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub label: &'static str,
    /// Slurks won (positive) or lost (negative) when the wheel stops here.
    pub delta: i64,
    pub weight: u32,
}

const fn segment(label: &'static str, delta: i64, weight: u32) -> Segment {
    Segment {
        label,
        delta,
        weight,
    }
}

pub const DEFAULT_SEGMENTS: &[Segment] = &[
    segment("Jackpot", 10, 1),
    segment("Big win", 5, 3),
    segment("Win", 2, 6),
    segment("Small win", 1, 8),
    segment("Nothing", 0, 6),
    segment("Small loss", -1, 8),
    segment("Loss", -2, 6),
    segment("Big loss", -5, 3),
    segment("Down it", -10, 1),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WheelSpin {
    pub segment: Segment,
    pub index: usize,
    pub result: MinigameResult,
}

/// Turn a landed segment into a result. A zero delta counts as a loss of nothing.
pub fn result_for(segment: &Segment) -> MinigameResult {
    if segment.delta > 0 {
        MinigameResult::won(MinigameKind::Wheel, segment.delta.unsigned_abs())
    } else {
        MinigameResult::lost(MinigameKind::Wheel, segment.delta.unsigned_abs())
    }
}

pub fn spin(rng: &mut MinigameRng, segments: &[Segment]) -> Result<WheelSpin, MinigameError> {
    let weights = WeightedIndex::new(segments.iter().map(|segment| segment.weight))
        .map_err(|err| MinigameError::InvalidConfig(err.to_string()))?;
    let index = weights.sample(rng);
    let segment = segments[index];
    Ok(WheelSpin {
        segment,
        index,
        result: result_for(&segment),
    })
}
