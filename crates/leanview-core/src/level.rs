#![forbid(unsafe_code)]

//! The discrete perspective position.
//!
//! A [`LeanLevel`] is always one of the five values `-2..=2`. Every external
//! input path (attributes, integers, ordinals) clamps instead of failing, so
//! an out-of-range level can never enter the store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Active lean position, ordered from strongly-left (`-2`) to strongly-right (`2`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i8")]
pub struct LeanLevel(i8);

impl LeanLevel {
    pub const MIN: Self = Self(-2);
    pub const MAX: Self = Self(2);
    pub const NEUTRAL: Self = Self(0);

    /// All levels in ascending order.
    pub const ALL: [Self; 5] = [Self(-2), Self(-1), Self(0), Self(1), Self(2)];

    /// Every CSS state class a level can put on an element.
    pub const STATE_CLASSES: [&'static str; 5] = [
        "lean-strong-left",
        "lean-left",
        "lean-neutral",
        "lean-right",
        "lean-strong-right",
    ];

    /// Build a level, clamping to `-2..=2`.
    #[must_use]
    pub fn new(value: i64) -> Self {
        let clamped = value.clamp(-2, 2);
        if clamped != value {
            tracing::debug!(message = "level.clamped", input = value, level = clamped);
        }
        Self(clamped as i8)
    }

    /// Map the 1..=5 ordinal scale used by content generators (`level = ordinal - 3`).
    #[must_use]
    pub fn from_ordinal(ordinal: i64) -> Self {
        Self::new(ordinal.saturating_sub(3))
    }

    /// Parse a level from attribute text.
    ///
    /// Accepts an optional sign and surrounding whitespace. Out-of-range
    /// numbers clamp; text that is not an integer yields `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        digits.parse::<i64>().ok().map(Self::new)
    }

    /// Like [`parse`](Self::parse), falling back to neutral.
    #[must_use]
    pub fn parse_or_neutral(text: &str) -> Self {
        Self::parse(text).unwrap_or_else(|| {
            tracing::debug!(message = "level.unparsable", input = text);
            Self::NEUTRAL
        })
    }

    #[inline]
    #[must_use]
    pub const fn value(self) -> i8 {
        self.0
    }

    /// Zero-based position among the five levels (`-2` is index 0).
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        (self.0 + 2) as usize
    }

    /// Level at a zero-based position, clamped to the last position.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    /// One step left, or `None` at the lowest level.
    #[must_use]
    pub fn checked_prev(self) -> Option<Self> {
        (self > Self::MIN).then(|| Self(self.0 - 1))
    }

    /// One step right, or `None` at the highest level.
    #[must_use]
    pub fn checked_next(self) -> Option<Self> {
        (self < Self::MAX).then(|| Self(self.0 + 1))
    }

    #[must_use]
    pub const fn is_neutral(self) -> bool {
        self.0 == 0
    }

    /// CSS state class used for theming.
    #[must_use]
    pub const fn state_class(self) -> &'static str {
        Self::STATE_CLASSES[self.index()]
    }

    /// Stable token for ids and attribute values (`n2`, `n1`, `0`, `p1`, `p2`).
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self.0 {
            -2 => "n2",
            -1 => "n1",
            0 => "0",
            1 => "p1",
            _ => "p2",
        }
    }

    /// Signed display form (`-2`, `-1`, `0`, `+1`, `+2`).
    #[must_use]
    pub fn signed(self) -> String {
        if self.0 > 0 {
            format!("+{}", self.0)
        } else {
            self.0.to_string()
        }
    }
}

impl fmt::Display for LeanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<LeanLevel> for i8 {
    fn from(level: LeanLevel) -> Self {
        level.0
    }
}

impl From<LeanLevel> for i64 {
    fn from(level: LeanLevel) -> Self {
        i64::from(level.0)
    }
}

impl TryFrom<i64> for LeanLevel {
    type Error = std::convert::Infallible;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Ok(Self::new(value))
    }
}
