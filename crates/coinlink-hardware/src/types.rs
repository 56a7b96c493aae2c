//! Line levels.

use serde::{Deserialize, Serialize};

use crate::error::{HardwareError, Result};

/// Logic level of a digital input.
///
/// The coin line idles `High` (pull-up); each mechanical pulse pulls it
/// `Low` briefly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Low,
}

impl Level {
    /// Parse the textual output of a line read (`"0"` or `"1"`).
    ///
    /// # Errors
    /// Returns `HardwareError::InvalidReading` for anything else.
    pub fn from_reading(reading: &str) -> Result<Self> {
        match reading.trim() {
            "1" => Ok(Level::High),
            "0" => Ok(Level::Low),
            other => Err(HardwareError::invalid_reading(other)),
        }
    }

    #[inline]
    pub fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", Level::High)]
    #[case("0\n", Level::Low)]
    #[case("  1  ", Level::High)]
    fn test_from_reading(#[case] input: &str, #[case] expected: Level) {
        assert_eq!(Level::from_reading(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("2")]
    #[case("high")]
    fn test_from_reading_invalid(#[case] input: &str) {
        assert!(matches!(
            Level::from_reading(input),
            Err(HardwareError::InvalidReading { .. })
        ));
    }
}
