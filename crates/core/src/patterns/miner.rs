//! Tactical pattern mining over whole games

use rayon::prelude::*;
use shakmaty::{Chess, Color, Position, Square};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::types::*;
use crate::error::{Error, Result};
use crate::parser::GameRecord;
use crate::position::{self, Ply, PositionKey};

const CENTER: [Square; 4] = [Square::D4, Square::E4, Square::D5, Square::E5];

/// At or below this many pieces a position counts as an endgame
pub const ENDGAME_PIECES: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct PatternMining {
    pub index: PatternIndex,
    /// One entry per input game, in input order
    pub games: Vec<GameTactics>,
    pub truncated_games: usize,
}

/// Relaxed fork test: after the move, at least two squares holding the
/// opponent's pieces are attacked by any piece of `mover`.
pub fn is_fork(after: &Chess, mover: Color) -> bool {
    let board = after.board();
    let occupied = board.occupied();

    board
        .by_color(!mover)
        .into_iter()
        .filter(|&square| !board.attacks_to(square, mover, occupied).is_empty())
        .take(2)
        .count()
        >= 2
}

/// Categories a played move falls under.
pub fn classify(ply: &Ply) -> Vec<PatternCategory> {
    let mut categories = Vec::new();
    if ply.is_capture() {
        categories.push(PatternCategory::Capture);
    }
    if ply.is_check() {
        categories.push(PatternCategory::Check);
    }
    if is_fork(&ply.after, ply.mover()) {
        categories.push(PatternCategory::Fork);
    }
    categories
}

fn mine_game(game: &GameRecord) -> (PatternIndex, GameTactics) {
    let mut index = PatternIndex::new();
    let mut tactics = GameTactics::default();
    let mut board = Chess::default();

    for (ply_idx, token) in game.moves.iter().enumerate() {
        let key = PositionKey::from_position(&board);

        let played = match position::resolve(&board, token) {
            Ok(p) => p,
            Err(e) => {
                debug!(source = %game.source, ply = ply_idx, error = %e, "Pattern replay stopped");
                tactics.truncated = true;
                break;
            }
        };

        for category in classify(&played) {
            match category {
                PatternCategory::Capture => tactics.tally.captures += 1,
                PatternCategory::Check => tactics.tally.checks += 1,
                PatternCategory::Fork => tactics.tally.forks += 1,
            }
            index.record(category, key.clone(), &played.notation);
        }

        if played.mv.is_castle() {
            tactics.tally.castles += 1;
        } else if CENTER.contains(&played.mv.to()) {
            tactics.tally.center_moves += 1;
        }

        if played.after.board().occupied().count() <= ENDGAME_PIECES {
            tactics.reached_endgame = true;
        }

        tactics.plies_replayed += 1;
        board = played.after;
    }

    (index, tactics)
}

/// Replays every game in full and indexes the moves by motif.
///
/// Per-game work runs in parallel; fragments are concatenated in input
/// order so the index lists are deterministic.
pub fn mine_patterns(games: &[GameRecord], cancel: &CancellationToken) -> Result<PatternMining> {
    let fragments: Vec<(PatternIndex, GameTactics)> = games
        .par_iter()
        .map(|game| {
            if cancel.is_cancelled() {
                return (PatternIndex::new(), GameTactics::default());
            }
            mine_game(game)
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let mut mining = PatternMining::default();
    for (index, tactics) in fragments {
        mining.index.extend(index);
        if tactics.truncated {
            mining.truncated_games += 1;
        }
        mining.games.push(tactics);
    }

    info!(
        games = games.len(),
        captures = mining.index.occurrences(PatternCategory::Capture),
        checks = mining.index.occurrences(PatternCategory::Check),
        forks = mining.index.occurrences(PatternCategory::Fork),
        fork_positions = mining.index.positions(PatternCategory::Fork),
        truncated = mining.truncated_games,
        "Pattern index built"
    );

    Ok(mining)
}
