//! Tier-aware move selection

use rand::seq::IndexedRandom;
use rand::Rng;
use shakmaty::Chess;
use tracing::trace;

use crate::book::OpeningBook;
use crate::error::{Error, Result};
use crate::eval::{evaluate, Score};
use crate::patterns::{PatternCategory, PatternIndex};
use crate::position::{self, Ply, PositionKey};
use crate::tier::Tier;

/// One filter of a tier's funnel. Gains are in centipawns from the mover's
/// point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Listed under `fork` for the current position in the pattern index
    Fork,
    /// Captures, optionally only those gaining at least `min_gain`
    Capture { min_gain: Option<i32> },
    /// Checking moves, optionally only those with a positive gain
    Check { positive_gain: bool },
    PositiveGain,
    GainAtLeast(i32),
    /// Moves after which the mover's own king is not attacked
    KingSafe,
}

const BEGINNER: &[Stage] = &[
    Stage::Capture { min_gain: Some(-100) },
    Stage::Check { positive_gain: false },
    Stage::Capture { min_gain: None },
    Stage::KingSafe,
];

const INTERMEDIATE: &[Stage] = &[
    Stage::Fork,
    Stage::Capture { min_gain: Some(-50) },
    Stage::PositiveGain,
    Stage::Check { positive_gain: false },
    Stage::Capture { min_gain: None },
];

const MASTER: &[Stage] = &[
    Stage::Fork,
    Stage::Check { positive_gain: true },
    Stage::PositiveGain,
    Stage::Capture { min_gain: Some(0) },
    Stage::GainAtLeast(-30),
];

/// Funnel stages tried after the book, before the uniform-random fallback.
/// Labels outside the built-in tiers go straight to the fallback.
pub fn stages_for(tier: &Tier) -> &'static [Stage] {
    match tier {
        Tier::Beginner => BEGINNER,
        Tier::Intermediate => INTERMEDIATE,
        Tier::Master => MASTER,
        Tier::Other(_) => &[],
    }
}

/// Everything the advisor looks at for one decision
#[derive(Debug, Clone, Copy)]
pub struct AdvisorContext<'a> {
    pub position: &'a Chess,
    pub legal_moves: &'a [String],
    pub tier: &'a Tier,
}

/// A legal move the rules engine could resolve
struct Candidate<'a> {
    original: &'a str,
    ply: Ply,
    gain: Score,
}

impl Candidate<'_> {
    fn passes(&self, stage: Stage, forks: &[String]) -> bool {
        let gain = self.gain.centipawns();
        match stage {
            Stage::Fork => forks.iter().any(|m| *m == self.ply.notation),
            Stage::Capture { min_gain } => {
                self.ply.is_capture() && min_gain.map_or(true, |min| gain >= min)
            }
            Stage::Check { positive_gain } => self.ply.is_check() && (!positive_gain || gain > 0),
            Stage::PositiveGain => gain > 0,
            Stage::GainAtLeast(min) => gain >= min,
            Stage::KingSafe => !position::king_attacked(&self.ply.after, self.ply.mover()),
        }
    }
}

/// Picks moves from a book and a pattern index. Holds no state of its own.
#[derive(Debug, Clone, Copy)]
pub struct Advisor<'a> {
    book: &'a OpeningBook,
    patterns: &'a PatternIndex,
}

impl<'a> Advisor<'a> {
    pub fn new(book: &'a OpeningBook, patterns: &'a PatternIndex) -> Self {
        Self { book, patterns }
    }

    /// Returns one of `ctx.legal_moves`, exactly as the caller spelled it.
    ///
    /// The book is consulted first and is deterministic. Otherwise the
    /// tier's stages run in order and the first non-empty candidate set
    /// wins, with `rng` picking inside it.
    pub fn advise<R: Rng + ?Sized>(&self, ctx: &AdvisorContext<'_>, rng: &mut R) -> Result<String> {
        let legal = ctx.legal_moves;
        if legal.is_empty() {
            return Err(Error::NoLegalMoves);
        }
        if let [only] = legal {
            return Ok(only.clone());
        }

        let key = PositionKey::from_position(ctx.position);
        let before = evaluate(ctx.position);
        let candidates: Vec<Candidate<'_>> = legal
            .iter()
            .filter_map(|original| {
                let ply = position::resolve(ctx.position, original).ok()?;
                let mover = ply.mover();
                let gain = evaluate(&ply.after).for_side(mover) - before.for_side(mover);
                Some(Candidate {
                    original,
                    ply,
                    gain,
                })
            })
            .collect();

        if let Some(book_move) = self.book_move(&key, &candidates) {
            trace!(tier = %ctx.tier, mv = book_move, "Book move");
            return Ok(book_move.to_string());
        }

        let forks = self.patterns.moves(PatternCategory::Fork, &key);
        for &stage in stages_for(ctx.tier) {
            let matching: Vec<&Candidate<'_>> =
                candidates.iter().filter(|c| c.passes(stage, forks)).collect();
            if let Some(picked) = matching.choose(rng) {
                trace!(tier = %ctx.tier, ?stage, mv = picked.original, "Funnel move");
                return Ok(picked.original.to_string());
            }
        }

        legal.choose(rng).cloned().ok_or(Error::NoLegalMoves)
    }

    /// Most played book move among the candidates, earliest on ties
    fn book_move<'c>(&self, key: &PositionKey, candidates: &'c [Candidate<'c>]) -> Option<&'c str> {
        let entry = self.book.moves(key)?;
        let mut best: Option<(&str, u32)> = None;
        for candidate in candidates {
            let Some(&count) = entry.get(&candidate.ply.notation) else {
                continue;
            };
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((candidate.original, count));
            }
        }
        best.map(|(mv, _)| mv)
    }
}
