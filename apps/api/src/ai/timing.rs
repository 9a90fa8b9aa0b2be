//! Derived timing policy for interview questions.
//!
//! An interview plan of `total` questions is split into three equal tiers.
//! The tier decides both the difficulty handed to the vendor and the answer
//! time budget shown to the candidate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default interview length when the caller does not supply one.
pub const DEFAULT_PLAN_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Answer time budget in milliseconds. Strictly increasing with difficulty.
    pub const fn duration_ms(self) -> u64 {
        match self {
            Difficulty::Easy => 20_000,
            Difficulty::Medium => 60_000,
            Difficulty::Hard => 120_000,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// Difficulty and time budget for one position in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSlot {
    pub difficulty: Difficulty,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimingError {
    #[error("interview plan must contain at least one question")]
    EmptyPlan,

    #[error("question index {index} is outside a plan of {total} questions")]
    IndexOutOfRange { index: usize, total: usize },
}

/// Maps a zero-based question index to its tier.
///
/// `index * 3 / total` (in `u128`) gives 0, 1 or 2: first third easy, second third medium,
/// final third hard. For plan lengths not divisible by three the earlier tiers
/// are never larger than the later ones.
pub fn plan_slot(index: usize, total: usize) -> Result<QuestionSlot, TimingError> {
    if total == 0 {
        return Err(TimingError::EmptyPlan);
    }
    if index >= total {
        return Err(TimingError::IndexOutOfRange { index, total });
    }

    // widened so caller-sized plans cannot overflow
    let tier = (index as u128 * 3) / total as u128;
    let difficulty = match tier {
        0 => Difficulty::Easy,
        1 => Difficulty::Medium,
        _ => Difficulty::Hard,
    };

    Ok(QuestionSlot {
        difficulty,
        duration_ms: difficulty.duration_ms(),
    })
}
