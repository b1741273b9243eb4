use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EngineError;

pub const FULL_WEIGHT: u8 = 100;

/// A de-prioritization factor in `0..=100`.
///
/// Out-of-range values are rejected at construction and never clamped, so a
/// corrupt weight in the store surfaces as [`EngineError::InvalidWeight`]
/// instead of being masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Weight(u8);

impl Weight {
    pub const FULL: Self = Self(FULL_WEIGHT);
    pub const ZERO: Self = Self(0);

    pub fn new(value: i64) -> Result<Self, EngineError> {
        if (0..=i64::from(FULL_WEIGHT)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(EngineError::InvalidWeight { value })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_full(self) -> bool {
        self.0 == FULL_WEIGHT
    }
}

impl Default for Weight {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<i64> for Weight {
    type Error = EngineError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Weight> for i64 {
    fn from(weight: Weight) -> Self {
        i64::from(weight.0)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Weight {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let parsed = trimmed
            .parse::<i64>()
            .map_err(|_| EngineError::MalformedWeight(trimmed.to_owned()))?;
        Self::new(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bounds_and_rejects_out_of_range_without_clamping() {
        assert_eq!(Weight::new(0).expect("zero").get(), 0);
        assert_eq!(Weight::new(100).expect("full").get(), 100);
        assert_eq!(
            Weight::new(101),
            Err(EngineError::InvalidWeight { value: 101 })
        );
        assert_eq!(
            Weight::new(-1),
            Err(EngineError::InvalidWeight { value: -1 })
        );
    }

    #[test]
    fn default_weight_is_full() {
        assert_eq!(Weight::default(), Weight::FULL);
        assert!(Weight::default().is_full());
        assert!(!Weight::new(99).expect("weight").is_full());
    }

    #[test]
    fn parses_from_cli_text() {
        assert_eq!("  50 ".parse::<Weight>().expect("parse"), Weight::new(50).expect("w"));
        assert!(matches!(
            "half".parse::<Weight>(),
            Err(EngineError::MalformedWeight(_))
        ));
        assert_eq!(
            "250".parse::<Weight>(),
            Err(EngineError::InvalidWeight { value: 250 })
        );
    }
}
