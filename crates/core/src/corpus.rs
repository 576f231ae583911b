//! Where tier corpora come from

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::tier::Tier;

/// Raw movetext for one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSource {
    pub tier: Tier,
    pub movetext: String,
}

impl TierSource {
    pub fn new(tier: impl Into<Tier>, movetext: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            movetext: movetext.into(),
        }
    }
}

/// Reads `<tier>_games.pgn` for each tier from `dir`.
///
/// A tier whose file is missing or unreadable is logged and left out; the
/// other tiers still load.
pub async fn load_dir(dir: &Path, tiers: &[Tier]) -> Vec<TierSource> {
    let mut sources = Vec::with_capacity(tiers.len());

    for tier in tiers {
        let path = dir.join(tier.corpus_file_name());
        match tokio::fs::read_to_string(&path).await {
            Ok(movetext) => {
                info!(
                    tier = %tier,
                    path = %path.display(),
                    bytes = movetext.len(),
                    "Read tier corpus"
                );
                sources.push(TierSource::new(tier.clone(), movetext));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(tier = %tier, path = %path.display(), "No corpus file for tier, skipping");
            }
            Err(e) => {
                warn!(
                    tier = %tier,
                    path = %path.display(),
                    error = %e,
                    "Could not read tier corpus, skipping"
                );
            }
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("chess-coach-corpus-{}-{}", std::process::id(), nanos))
    }

    #[tokio::test]
    async fn test_load_dir_skips_missing_tiers() {
        let dir = scratch_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("beginner_games.pgn"), "1. e4 e5 *")
            .await
            .unwrap();
        tokio::fs::write(dir.join("club_games.pgn"), "1. d4 d5 *")
            .await
            .unwrap();

        let tiers = vec![Tier::Beginner, Tier::Master, Tier::from("Club")];
        let sources = load_dir(&dir, &tiers).await;
        tokio::fs::remove_dir_all(&dir).await.unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0], TierSource::new(Tier::Beginner, "1. e4 e5 *"));
        assert_eq!(sources[1].tier, Tier::from("club"));
    }

    #[tokio::test]
    async fn test_load_dir_without_directory() {
        let sources = load_dir(&scratch_dir(), &Tier::BUILT_IN).await;
        assert!(sources.is_empty());
    }
}
