//! Skill tiers

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A skill bracket. Selects both a corpus partition and an advisor policy.
///
/// Labels are case-insensitive. Anything that is not one of the three
/// built-in brackets is kept as [`Tier::Other`] with its lowercased label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tier {
    Beginner,
    Intermediate,
    Master,
    Other(String),
}

impl Tier {
    pub const BUILT_IN: [Tier; 3] = [Tier::Beginner, Tier::Intermediate, Tier::Master];

    pub fn as_str(&self) -> &str {
        match self {
            Tier::Beginner => "beginner",
            Tier::Intermediate => "intermediate",
            Tier::Master => "master",
            Tier::Other(label) => label,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Tier::Beginner => "Beginner",
            Tier::Intermediate => "Intermediate",
            Tier::Master => "Master",
            Tier::Other(label) => label,
        }
    }

    /// File name of this tier's corpus inside a corpus directory
    pub fn corpus_file_name(&self) -> String {
        format!("{}_games.pgn", self.as_str())
    }
}

impl From<&str> for Tier {
    fn from(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "beginner" => Tier::Beginner,
            "intermediate" => Tier::Intermediate,
            "master" => Tier::Master,
            _ => Tier::Other(label),
        }
    }
}

impl From<String> for Tier {
    fn from(label: String) -> Self {
        Tier::from(label.as_str())
    }
}

impl From<Tier> for String {
    fn from(tier: Tier) -> Self {
        tier.as_str().to_string()
    }
}

impl FromStr for Tier {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Tier::from(s))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
