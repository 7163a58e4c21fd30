use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A league season identified by its start year, written as `"2023-2024"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Season {
    start_year: i32,
}

impl Season {
    pub fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    pub fn start_year(self) -> i32 {
        self.start_year
    }

    pub fn previous(self) -> Self {
        Self::new(self.start_year - 1)
    }

    /// File-name form, `2023_2024`.
    pub fn file_stem(self) -> String {
        format!("{}_{}", self.start_year, self.start_year + 1)
    }

    /// Parses either `2023-2024` or `2023_2024`.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (a, b) = raw.split_once(['-', '_'])?;
        let start = a.trim().parse::<i32>().ok()?;
        let end = b.trim().parse::<i32>().ok()?;
        if end != start + 1 {
            return None;
        }
        Some(Self::new(start))
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.start_year + 1)
    }
}

impl FromStr for Season {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Season::parse_loose(s).ok_or_else(|| anyhow!("invalid season `{s}` (expected YYYY-YYYY)"))
    }
}

impl Serialize for Season {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Season {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Seasons strictly before `target`, most recent first.
pub fn history_seasons(target: Season, available: &[Season]) -> Vec<Season> {
    let mut out: Vec<Season> = available
        .iter()
        .copied()
        .filter(|s| s.start_year() <= target.start_year() - 1)
        .collect();
    out.sort_by(|a, b| b.cmp(a));
    out.dedup();
    out
}
