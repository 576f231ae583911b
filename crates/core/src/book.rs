//! Opening book: position -> move -> times played

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shakmaty::Chess;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::parser::GameRecord;
use crate::position::{self, PositionKey};

/// Default number of plies per game that feed the book.
pub const DEFAULT_OPENING_PLIES: usize = 20;

/// Move frequencies keyed by the position the move was played from.
///
/// Counts only ever grow, and merging is a plain sum, so the result does not
/// depend on the order games are folded in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningBook {
    entries: HashMap<PositionKey, HashMap<String, u32>>,
}

impl OpeningBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: PositionKey, notation: &str) {
        self.record_many(key, notation, 1);
    }

    pub fn record_many(&mut self, key: PositionKey, notation: &str, count: u32) {
        *self
            .entries
            .entry(key)
            .or_default()
            .entry(notation.to_string())
            .or_default() += count;
    }

    pub fn merge(mut self, other: OpeningBook) -> OpeningBook {
        for (key, moves) in other.entries {
            let entry = self.entries.entry(key).or_default();
            for (notation, count) in moves {
                *entry.entry(notation).or_default() += count;
            }
        }
        self
    }

    pub fn moves(&self, key: &PositionKey) -> Option<&HashMap<String, u32>> {
        self.entries.get(key)
    }

    pub fn count(&self, key: &PositionKey, notation: &str) -> u32 {
        self.entries
            .get(key)
            .and_then(|moves| moves.get(notation))
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct positions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct (position, move) pairs
    pub fn move_count(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }
}

/// Result of folding one game into a book fragment
struct GameBook {
    book: OpeningBook,
    truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookBuild {
    pub book: OpeningBook,
    /// Games whose replay stopped at a move the rules engine rejected
    pub truncated_games: usize,
}

fn book_for_game(game: &GameRecord, max_plies: usize) -> GameBook {
    let mut book = OpeningBook::new();
    let mut board = Chess::default();

    for (ply, token) in game.moves.iter().take(max_plies).enumerate() {
        let key = PositionKey::from_position(&board);
        match position::resolve(&board, token) {
            Ok(played) => {
                book.record(key, &played.notation);
                board = played.after;
            }
            Err(e) => {
                debug!(source = %game.source, ply, error = %e, "Book replay stopped");
                return GameBook { book, truncated: true };
            }
        }
    }

    GameBook { book, truncated: false }
}

/// Builds the shared book from every game of every tier.
///
/// Games are replayed in parallel and their fragments summed. The token is
/// polled once per game; a cancelled build returns [`Error::Cancelled`].
pub fn build_book(
    games: &[GameRecord],
    max_plies: usize,
    cancel: &CancellationToken,
) -> Result<BookBuild> {
    let (book, truncated_games) = games
        .par_iter()
        .map(|game| {
            if cancel.is_cancelled() {
                return (OpeningBook::new(), 0);
            }
            let fragment = book_for_game(game, max_plies);
            (fragment.book, usize::from(fragment.truncated))
        })
        .reduce(
            || (OpeningBook::new(), 0),
            |(a, ta), (b, tb)| (a.merge(b), ta + tb),
        );

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    info!(
        games = games.len(),
        positions = book.len(),
        moves = book.move_count(),
        truncated = truncated_games,
        "Opening book built"
    );

    Ok(BookBuild {
        book,
        truncated_games,
    })
}
