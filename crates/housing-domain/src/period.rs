//! CBS period codes (`2015KW01`, `2015MM03`, `2015JJ00`).

use crate::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time resolution of a period code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Month,
    Quarter,
    Year,
}

impl Granularity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }

    /// Two-letter marker between year and index in a period code.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Month => "MM",
            Self::Quarter => "KW",
            Self::Year => "JJ",
        }
    }

    #[must_use]
    pub const fn periods_per_year(self) -> u32 {
        match self {
            Self::Month => 12,
            Self::Quarter => 4,
            Self::Year => 1,
        }
    }

    const fn first_index(self) -> u32 {
        match self {
            Self::Year => 0,
            _ => 1,
        }
    }

    const fn last_index(self) -> u32 {
        match self {
            Self::Year => 0,
            other => other.periods_per_year(),
        }
    }

    /// OData filter selecting every period from the start of `start_year`
    /// through the end of `end_year`.
    #[must_use]
    pub fn range_filter(self, start_year: i32, end_year: i32) -> String {
        let first = PeriodCode::new(start_year, self, self.first_index());
        let last = PeriodCode::new(end_year, self, self.last_index());
        format!("Perioden ge '{first}' and Perioden le '{last}'")
    }

    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "MM" => Some(Self::Month),
            "KW" => Some(Self::Quarter),
            "JJ" => Some(Self::Year),
            _ => None,
        }
    }
}

impl FromStr for Granularity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(Self::Month),
            "quarter" => Ok(Self::Quarter),
            "year" => Ok(Self::Year),
            _ => Err(DomainError::InvalidGranularity(s.to_string())),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed period code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodCode {
    pub year: i32,
    pub granularity: Granularity,
    pub index: u32,
}

impl PeriodCode {
    #[must_use]
    pub const fn new(year: i32, granularity: Granularity, index: u32) -> Self {
        Self {
            year,
            granularity,
            index,
        }
    }

    /// Parse a code such as `2019KW03`. Surrounding whitespace is ignored.
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        let invalid = || DomainError::InvalidPeriod(code.to_string());

        if trimmed.len() != 8 || !trimmed.is_ascii() {
            return Err(invalid());
        }
        let year = trimmed[..4].parse::<i32>().map_err(|_| invalid())?;
        let granularity = Granularity::from_marker(&trimmed[4..6]).ok_or_else(invalid)?;
        let index = trimmed[6..].parse::<u32>().map_err(|_| invalid())?;

        if index < granularity.first_index() || index > granularity.last_index() {
            return Err(invalid());
        }
        Ok(Self::new(year, granularity, index))
    }

    /// Year from the first four characters, without requiring a valid suffix.
    #[must_use]
    pub fn year_of(code: &str) -> Option<i32> {
        code.trim().get(..4).and_then(|y| y.parse().ok())
    }

    #[must_use]
    pub fn quarter(self) -> Option<u32> {
        (self.granularity == Granularity::Quarter).then_some(self.index)
    }

    #[must_use]
    pub fn month(self) -> Option<u32> {
        (self.granularity == Granularity::Month).then_some(self.index)
    }

    /// The following period of the same granularity.
    #[must_use]
    pub const fn next(self) -> Self {
        match self.granularity {
            Granularity::Year => Self::new(self.year + 1, Granularity::Year, 0),
            g => {
                if self.index >= g.periods_per_year() {
                    Self::new(self.year + 1, g, 1)
                } else {
                    Self::new(self.year, g, self.index + 1)
                }
            }
        }
    }
}

impl fmt::Display for PeriodCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:02}", self.year, self.granularity.marker(), self.index)
    }
}
