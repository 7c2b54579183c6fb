// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// This file is ONLY for types that are SHARED BETWEEN FILES, not types that only are used in one file.

use crate::error::BifsgError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The number of race/ethnicity categories carried by every table in the system.
pub const NUM_RACES: usize = 6;

/// The fixed race/ethnicity taxonomy. The discriminant is the column position
/// in every probability table, so the declaration order is the storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceCategory {
    White = 0,
    Black = 1,
    /// Asian or Pacific Islander.
    Api = 2,
    /// American Indian or Alaska Native.
    Native = 3,
    /// Two or more races.
    Multiple = 4,
    Hispanic = 5,
}

impl RaceCategory {
    pub const ALL: [RaceCategory; NUM_RACES] = [
        RaceCategory::White,
        RaceCategory::Black,
        RaceCategory::Api,
        RaceCategory::Native,
        RaceCategory::Multiple,
        RaceCategory::Hispanic,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The column name used in persisted tables and exported results.
    pub fn column_name(self) -> &'static str {
        match self {
            RaceCategory::White => "white",
            RaceCategory::Black => "black",
            RaceCategory::Api => "api",
            RaceCategory::Native => "native",
            RaceCategory::Multiple => "multiple",
            RaceCategory::Hispanic => "hispanic",
        }
    }

    pub fn column_names() -> [&'static str; NUM_RACES] {
        Self::ALL.map(RaceCategory::column_name)
    }
}

impl fmt::Display for RaceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Which way a conditional probability table is normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Every row is a distribution over races: `p(race | proxy)`.
    RaceGivenProxy,
    /// Every race column sums to one across proxy rows: `p(proxy | race)`.
    ProxyGivenRace,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::RaceGivenProxy => f.write_str("race-given-proxy"),
            Direction::ProxyGivenRace => f.write_str("proxy-given-race"),
        }
    }
}

/// The granularity of the geography proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Resolution {
    /// ZIP code tabulation area: 5 digits.
    Zcta,
    /// Census tract: 2-digit state + 3-digit county + 6-digit tract.
    Tract,
    /// Census block: tract key + 4-digit block. Stored partitioned by state.
    Block,
}

impl Resolution {
    /// The fixed, zero-padded width of a geography key at this resolution.
    pub fn code_width(self) -> usize {
        match self {
            Resolution::Zcta => 5,
            Resolution::Tract => 11,
            Resolution::Block => 15,
        }
    }

    /// The lower-case token used in table file names and key column names.
    pub fn token(self) -> &'static str {
        match self {
            Resolution::Zcta => "zcta",
            Resolution::Tract => "tract",
            Resolution::Block => "block",
        }
    }

    pub fn key_column(self) -> &'static str {
        match self {
            Resolution::Zcta => "zcta5",
            Resolution::Tract => "tract",
            Resolution::Block => "block",
        }
    }

    /// Whether the geography table for this resolution is stored as per-state partitions.
    pub fn is_partitioned(self) -> bool {
        matches!(self, Resolution::Block)
    }
}

impl FromStr for Resolution {
    type Err = BifsgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("ZCTA") {
            Ok(Resolution::Zcta)
        } else if trimmed.eq_ignore_ascii_case("TRACT") {
            Ok(Resolution::Tract)
        } else if trimmed.eq_ignore_ascii_case("BLOCK") {
            Ok(Resolution::Block)
        } else {
            Err(BifsgError::UnknownResolution(trimmed.to_string()))
        }
    }
}

impl TryFrom<String> for Resolution {
    type Error = BifsgError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Zcta => f.write_str("ZCTA"),
            Resolution::Tract => f.write_str("TRACT"),
            Resolution::Block => f.write_str("BLOCK"),
        }
    }
}

/// The kind of proxy a table is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proxy {
    Surname,
    FirstName,
    Geography(Resolution),
}

impl Proxy {
    pub fn key_column(self) -> &'static str {
        match self {
            Proxy::Surname | Proxy::FirstName => "name",
            Proxy::Geography(resolution) => resolution.key_column(),
        }
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proxy::Surname => f.write_str("surname"),
            Proxy::FirstName => f.write_str("first name"),
            Proxy::Geography(resolution) => write!(f, "{resolution} geography"),
        }
    }
}

/// A fully-defined probability vector over the six race categories.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaceDistribution([f64; NUM_RACES]);

impl RaceDistribution {
    /// Wraps a row of probabilities. Returns `None` if any cell is undefined.
    pub fn from_row(values: [f64; NUM_RACES]) -> Option<Self> {
        values.iter().all(|v| v.is_finite()).then_some(Self(values))
    }

    #[inline(always)]
    pub fn get(&self, race: RaceCategory) -> f64 {
        self.0[race.index()]
    }

    pub fn as_array(&self) -> &[f64; NUM_RACES] {
        &self.0
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// The category with the highest probability. Ties resolve to the earlier category.
    pub fn most_probable(&self) -> (RaceCategory, f64) {
        let mut best = (RaceCategory::White, self.0[0]);
        for race in RaceCategory::ALL.into_iter().skip(1) {
            let p = self.get(race);
            if p > best.1 {
                best = (race, p);
            }
        }
        best
    }
}
