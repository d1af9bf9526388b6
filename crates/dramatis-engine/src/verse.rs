use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A verse number or verse bridge as written in a verse marker ("4" or "4-6").
///
/// `end` always holds the last verse of the range, so a plain verse has
/// `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerseNumber {
    pub start: u32,
    pub end: u32,
}

impl VerseNumber {
    pub fn new(verse: u32) -> Self {
        Self {
            start: verse,
            end: verse,
        }
    }

    pub fn bridge(start: u32, end: u32) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Build from the block-level pair where an end of `0` means "no bridge".
    pub fn from_initial(start: u32, end_or_zero: u32) -> Self {
        if end_or_zero == 0 {
            Self::new(start)
        } else {
            Self::bridge(start, end_or_zero)
        }
    }

    pub fn is_bridge(&self) -> bool {
        self.end > self.start
    }

    /// The block-level representation of the end verse (`0` when not a bridge).
    pub fn end_or_zero(&self) -> u32 {
        if self.is_bridge() { self.end } else { 0 }
    }

    pub fn contains(&self, verse: u32) -> bool {
        (self.start..=self.end).contains(&verse)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid verse number: {0:?}")]
pub struct ParseVerseError(String);

impl FromStr for VerseNumber {
    type Err = ParseVerseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseVerseError(s.to_string());
        let trimmed = s.trim();
        match trimmed.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start.trim().parse().map_err(|_| invalid())?;
                let end: u32 = end.trim().parse().map_err(|_| invalid())?;
                if end < start {
                    return Err(invalid());
                }
                Ok(Self::bridge(start, end))
            }
            None => trimmed.parse().map(Self::new).map_err(|_| invalid()),
        }
    }
}

impl TryFrom<String> for VerseNumber {
    type Error = ParseVerseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VerseNumber> for String {
    fn from(value: VerseNumber) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VerseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bridge() {
            write!(f, "{}-{}", self.start, self.end)
        } else {
            write!(f, "{}", self.start)
        }
    }
}
