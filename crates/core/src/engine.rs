//! Engine snapshots: build, query, swap, refresh

use std::collections::BTreeMap;
use std::future::Future;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use shakmaty::Chess;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::advisor::{Advisor, AdvisorContext};
use crate::book::{build_book, OpeningBook};
use crate::corpus::TierSource;
use crate::error::{Error, Result};
use crate::parser::{load_corpus_cancellable, GameRecord};
use crate::patterns::{mine_patterns, PatternIndex};
use crate::position::legal_notations;
use crate::profile::TierProfile;
use crate::tier::Tier;
use crate::training::{self, Recommendation};

/// Counts from one corpus refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub games: usize,
    /// Games the loader dropped, per tier
    pub skipped: BTreeMap<Tier, usize>,
    /// Games whose book replay stopped at a rejected move
    pub truncated_book_replays: usize,
    /// Games whose pattern replay stopped at a rejected move
    pub truncated_pattern_replays: usize,
}

impl RefreshReport {
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Immutable result of mining a set of tier corpora.
///
/// The book and pattern index are shared by all tiers; profiles are per
/// tier. A tier is known to the engine when a source for it was part of
/// the build, even if that source yielded no games.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engine {
    book: OpeningBook,
    patterns: PatternIndex,
    profiles: BTreeMap<Tier, TierProfile>,
}

struct TierGames {
    tier: Tier,
    range: Range<usize>,
    skipped: usize,
}

impl Engine {
    /// Loads, replays and mines every source.
    ///
    /// Sources sharing a tier are pooled. `cancel` is polled once per game
    /// while loading and during both replays.
    pub fn build(
        sources: &[TierSource],
        opening_plies: usize,
        cancel: &CancellationToken,
    ) -> Result<(Engine, RefreshReport)> {
        let mut pooled: BTreeMap<Tier, (Vec<GameRecord>, usize)> = BTreeMap::new();
        for source in sources {
            let loaded = load_corpus_cancellable(&source.tier, &source.movetext, cancel)?;
            info!(
                tier = %source.tier,
                games = loaded.games.len(),
                skipped = loaded.skipped,
                "Loaded tier corpus"
            );
            if loaded.skipped > 0 {
                warn!(
                    tier = %source.tier,
                    skipped = loaded.skipped,
                    "Some games had no readable moves"
                );
            }

            let (games, skipped) = pooled.entry(source.tier.clone()).or_default();
            games.extend(loaded.games);
            *skipped += loaded.skipped;
        }

        let mut all_games = Vec::new();
        let mut tiers = Vec::with_capacity(pooled.len());
        for (tier, (games, skipped)) in pooled {
            let start = all_games.len();
            all_games.extend(games);
            tiers.push(TierGames {
                tier,
                range: start..all_games.len(),
                skipped,
            });
        }

        let book = build_book(&all_games, opening_plies, cancel)?;
        let mining = mine_patterns(&all_games, cancel)?;

        if book.truncated_games > 0 || mining.truncated_games > 0 {
            warn!(
                book = book.truncated_games,
                patterns = mining.truncated_games,
                "Some replays stopped at a rejected move"
            );
        }

        let mut report = RefreshReport {
            games: all_games.len(),
            truncated_book_replays: book.truncated_games,
            truncated_pattern_replays: mining.truncated_games,
            ..Default::default()
        };

        let mut profiles = BTreeMap::new();
        for TierGames { tier, range, skipped } in tiers {
            report.skipped.insert(tier.clone(), skipped);
            let profile = TierProfile::build(
                tier.clone(),
                &all_games[range.clone()],
                &mining.games[range],
                skipped,
            );
            profiles.insert(tier, profile);
        }

        let engine = Engine {
            book: book.book,
            patterns: mining.index,
            profiles,
        };
        Ok((engine, report))
    }

    pub fn book(&self) -> &OpeningBook {
        &self.book
    }

    pub fn patterns(&self) -> &PatternIndex {
        &self.patterns
    }

    pub fn tiers(&self) -> impl Iterator<Item = &Tier> {
        self.profiles.keys()
    }

    pub fn profile(&self, tier: &Tier) -> Result<&TierProfile> {
        self.profiles
            .get(tier)
            .ok_or_else(|| Error::UnknownTier(tier.to_string()))
    }

    /// Picks one of `legal_moves` for `tier`.
    pub fn suggest_move<R: Rng + ?Sized>(
        &self,
        position: &Chess,
        legal_moves: &[String],
        tier: &Tier,
        rng: &mut R,
    ) -> Result<String> {
        if legal_moves.is_empty() {
            return Err(Error::NoLegalMoves);
        }
        self.profile(tier)?;

        let ctx = AdvisorContext {
            position,
            legal_moves,
            tier,
        };
        Advisor::new(&self.book, &self.patterns).advise(&ctx, rng)
    }

    /// Like [`Engine::suggest_move`] with the legal list taken from the rules engine
    pub fn suggest_for_position<R: Rng + ?Sized>(
        &self,
        position: &Chess,
        tier: &Tier,
        rng: &mut R,
    ) -> Result<String> {
        let legal = legal_notations(position);
        self.suggest_move(position, &legal, tier, rng)
    }

    pub fn recommendations(&self, tier: &Tier) -> Result<Vec<Recommendation>> {
        let profile = self.profile(tier)?;
        Ok(training::generate(tier, profile))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Engine> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the snapshot as JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.to_json()?).await?;
        info!(path = %path.display(), "Snapshot written");
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Engine> {
        let json = tokio::fs::read_to_string(path).await?;
        Engine::from_json(&json)
    }
}

/// Builds a new engine off the async runtime.
///
/// The build runs on a blocking worker. When `timeout` expires first,
/// `cancel` is triggered so the worker stops at its next per-game check,
/// and [`Error::Timeout`] is returned.
pub async fn refresh_corpus(
    sources: Vec<TierSource>,
    opening_plies: usize,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<(Engine, RefreshReport)> {
    let worker_cancel = cancel.clone();
    let build = tokio::task::spawn_blocking(move || {
        Engine::build(&sources, opening_plies, &worker_cancel)
    });
    await_build(build, timeout, &cancel).await
}

async fn await_build<F>(
    build: F,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(Engine, RefreshReport)>
where
    F: Future<Output = std::result::Result<Result<(Engine, RefreshReport)>, JoinError>>,
{
    match tokio::time::timeout(timeout, build).await {
        Ok(joined) => joined.map_err(|e| Error::Task(e.to_string()))?,
        Err(_) => {
            warn!(timeout = ?timeout, "Corpus refresh timed out, cancelling");
            cancel.cancel();
            Err(Error::Timeout(timeout))
        }
    }
}

/// Shared pointer to the current snapshot.
///
/// Readers clone the `Arc` and keep using that snapshot for as long as they
/// hold it; a swap only affects later readers.
#[derive(Debug, Clone, Default)]
pub struct EngineHandle {
    current: Arc<RwLock<Arc<Engine>>>,
}

impl EngineHandle {
    pub fn new(engine: Engine) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(engine))),
        }
    }

    pub fn snapshot(&self) -> Arc<Engine> {
        self.current.read().clone()
    }

    /// Installs `engine` and returns the snapshot it replaced
    pub fn swap(&self, engine: Engine) -> Arc<Engine> {
        let next = Arc::new(engine);
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Rebuilds from `sources` and swaps the result in. On any error the
    /// current snapshot stays in place.
    pub async fn refresh(
        &self,
        sources: Vec<TierSource>,
        opening_plies: usize,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<RefreshReport> {
        let (engine, report) = refresh_corpus(sources, opening_plies, timeout, cancel).await?;
        self.swap(engine);
        info!(games = report.games, skipped = report.total_skipped(), "Engine snapshot swapped");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::DEFAULT_OPENING_PLIES;
    use crate::position::{parse_fen, PositionKey};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const BEGINNER_PGN: &str = r#"[Event "B1"]

1. e4 e5 2. Nf3 Nc6 *

[Event "B2"]

1. e4 c5 2. Nf3 d6 *

[Event "B3"]

1. e4 e6 2. d4 d5 *
"#;

    const MASTER_PGN: &str = r#"[Event "M1"]

1. d4 Nf6 2. c4 e6 *

[Event "M2"]

1. d4 d5 2. c4 c6 *
"#;

    fn build(sources: &[TierSource]) -> (Engine, RefreshReport) {
        Engine::build(sources, DEFAULT_OPENING_PLIES, &CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_three_game_beginner_corpus() {
        let (engine, report) = build(&[TierSource::new(Tier::Beginner, BEGINNER_PGN)]);
        assert_eq!(report.games, 3);
        assert_eq!(report.total_skipped(), 0);

        let start = engine.book().moves(&PositionKey::starting()).unwrap();
        assert_eq!(start.len(), 1);
        assert_eq!(start.get("e4"), Some(&3));

        let mut rng = StdRng::seed_from_u64(0);
        let mv = engine
            .suggest_for_position(&Chess::default(), &Tier::Beginner, &mut rng)
            .unwrap();
        assert_eq!(mv, "e4");
    }

    #[test]
    fn test_book_is_shared_across_tiers() {
        let (engine, _) = build(&[
            TierSource::new(Tier::Beginner, BEGINNER_PGN),
            TierSource::new(Tier::Master, MASTER_PGN),
        ]);

        let mut rng = StdRng::seed_from_u64(9);
        // Three e4 games against two d4 games, whatever tier asks
        let mv = engine
            .suggest_for_position(&Chess::default(), &Tier::Master, &mut rng)
            .unwrap();
        assert_eq!(mv, "e4");
        assert_eq!(engine.tiers().cloned().collect::<Vec<_>>(), vec![Tier::Beginner, Tier::Master]);
        assert_eq!(engine.profile(&Tier::Master).unwrap().games, 2);
    }

    #[test]
    fn test_unknown_tier() {
        let (engine, _) = build(&[TierSource::new(Tier::Beginner, BEGINNER_PGN)]);
        let mut rng = StdRng::seed_from_u64(0);

        let err = engine
            .suggest_for_position(&Chess::default(), &Tier::Master, &mut rng)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTier(ref t) if t == "master"));
        assert!(matches!(engine.recommendations(&Tier::from("club")), Err(Error::UnknownTier(_))));
    }

    #[test]
    fn test_no_legal_moves_comes_before_unknown_tier() {
        let (engine, _) = build(&[TierSource::new(Tier::Beginner, BEGINNER_PGN)]);
        let mut rng = StdRng::seed_from_u64(0);
        // Fool's mate, White to move
        let mated =
            parse_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3").unwrap();

        let err = engine
            .suggest_for_position(&mated, &Tier::from("club"), &mut rng)
            .unwrap_err();
        assert!(matches!(err, Error::NoLegalMoves));
    }

    #[test]
    fn test_sources_for_one_tier_are_pooled() {
        let (engine, report) = build(&[
            TierSource::new(Tier::Master, MASTER_PGN),
            TierSource::new("MASTER", "[Event \"Empty\"]\n\n*\n"),
        ]);
        assert_eq!(report.skipped.get(&Tier::Master), Some(&1));
        assert_eq!(engine.profile(&Tier::Master).unwrap().games, 2);
        assert_eq!(engine.tiers().count(), 1);
    }

    #[test]
    fn test_recommendations_come_from_tier_profile() {
        let (engine, _) = build(&[TierSource::new(Tier::Beginner, BEGINNER_PGN)]);
        let recs = engine.recommendations(&Tier::Beginner).unwrap();
        assert_eq!(recs[0].title, "Study Common Openings");
        assert_eq!(recs[0].supporting_data[0]["opening"], "e4 e5");
    }

    #[test]
    fn test_snapshot_json() {
        let (engine, _) = build(&[TierSource::new(Tier::Beginner, BEGINNER_PGN)]);
        let restored = Engine::from_json(&engine.to_json().unwrap()).unwrap();
        assert_eq!(restored, engine);
    }

    #[tokio::test]
    async fn test_snapshot_file_round_trip() {
        let (engine, _) = build(&[TierSource::new(Tier::Beginner, BEGINNER_PGN)]);
        let path = std::env::temp_dir().join(format!("coach-snapshot-{}.json", std::process::id()));

        engine.save(&path).await.unwrap();
        let restored = Engine::load(&path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;
        assert_eq!(restored, engine);
    }

    #[tokio::test]
    async fn test_missing_snapshot_file() {
        let path = std::env::temp_dir().join("coach-snapshot-that-does-not-exist.json");
        assert!(matches!(Engine::load(&path).await, Err(Error::Io(_))));
    }

    #[test]
    fn test_cancelled_build() {
        let token = CancellationToken::new();
        token.cancel();
        let result = Engine::build(&[TierSource::new(Tier::Beginner, BEGINNER_PGN)], 20, &token);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_refresh_swaps_snapshot() {
        let handle = EngineHandle::default();
        let before = handle.snapshot();
        assert_eq!(before.tiers().count(), 0);

        let report = handle
            .refresh(
                vec![TierSource::new(Tier::Beginner, BEGINNER_PGN)],
                DEFAULT_OPENING_PLIES,
                Duration::from_secs(30),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(report.games, 3);

        // Old readers keep their view
        assert_eq!(before.tiers().count(), 0);
        assert!(handle.snapshot().profile(&Tier::Beginner).is_ok());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_snapshot() {
        let (engine, _) = build(&[TierSource::new(Tier::Beginner, BEGINNER_PGN)]);
        let handle = EngineHandle::new(engine);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = handle
            .refresh(
                vec![TierSource::new(Tier::Master, MASTER_PGN)],
                DEFAULT_OPENING_PLIES,
                Duration::from_secs(30),
                cancel,
            )
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(handle.snapshot().profile(&Tier::Beginner).is_ok());
    }

    #[tokio::test]
    async fn test_timeout_cancels_worker() {
        let cancel = CancellationToken::new();
        type Joined = std::result::Result<Result<(Engine, RefreshReport)>, JoinError>;
        let never = std::future::pending::<Joined>();

        let result = await_build(never, Duration::from_millis(10), &cancel).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(cancel.is_cancelled());
    }
}
