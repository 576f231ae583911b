//! Engine configuration from defaults and environment variables

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::book::DEFAULT_OPENING_PLIES;
use crate::tier::Tier;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Plies per game that feed the opening book
    pub opening_plies: usize,

    /// Upper bound on a whole corpus refresh
    pub refresh_timeout_secs: u64,

    /// Directory holding `<tier>_games.pgn` files
    pub corpus_dir: PathBuf,

    /// Tiers loaded on refresh
    pub tiers: Vec<Tier>,

    /// Seed for the advisor RNG; fresh entropy when unset
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            opening_plies: DEFAULT_OPENING_PLIES,
            refresh_timeout_secs: 300,
            corpus_dir: PathBuf::from("data"),
            tiers: Tier::BUILT_IN.to_vec(),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `COACH_*` environment variables, falling back
    /// to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let opening_plies = lookup("COACH_OPENING_PLIES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.opening_plies);

        let refresh_timeout_secs = lookup("COACH_REFRESH_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.refresh_timeout_secs);

        let corpus_dir = lookup("COACH_CORPUS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.corpus_dir);

        let tiers = lookup("COACH_TIERS")
            .map(|v| {
                v.split(',')
                    .filter(|label| !label.trim().is_empty())
                    .map(Tier::from)
                    .collect::<Vec<_>>()
            })
            .filter(|tiers| !tiers.is_empty())
            .unwrap_or(defaults.tiers);

        let seed = lookup("COACH_SEED").and_then(|v| v.parse().ok());

        Self {
            opening_plies,
            refresh_timeout_secs,
            corpus_dir,
            tiers,
            seed,
        }
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}
