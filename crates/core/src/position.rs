//! Position keys and the thin layer over the shakmaty rules engine
//!
//! Everything that replays corpus moves or resolves advisor input goes
//! through [`resolve`] and [`play`], so notation is rendered one way across
//! the book, the pattern index and the advisor.

use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position};
use thiserror::Error;

use crate::error::{Error, Result};

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Canonical encoding of piece placement only.
///
/// This is the board field of FEN. Side to move, castling rights, en passant
/// square and move counters are dropped, so transpositions share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionKey(String);

impl PositionKey {
    pub fn from_position(position: &Chess) -> Self {
        Self::from_fen(&to_fen(position))
    }

    /// Keeps only the placement field of a FEN string
    pub fn from_fen(fen: &str) -> Self {
        Self(fen.split_whitespace().next().unwrap_or_default().to_string())
    }

    pub fn starting() -> Self {
        Self::from_fen(STARTING_FEN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a notation could not be applied during replay
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("unparsable notation '{0}'")]
    Unparsable(String),

    #[error("illegal move '{0}'")]
    IllegalMove(String),
}

/// A move resolved against a position, together with where it leads
#[derive(Debug, Clone)]
pub struct Ply {
    pub mv: Move,
    /// SAN with `+`/`#` suffix, rendered from the resolved move
    pub notation: String,
    pub after: Chess,
}

impl Ply {
    pub fn mover(&self) -> Color {
        !self.after.turn()
    }

    pub fn is_capture(&self) -> bool {
        self.notation.contains('x') || self.mv.is_capture()
    }

    pub fn is_check(&self) -> bool {
        self.after.is_check()
    }
}

pub fn parse_fen(fen: &str) -> Result<Chess> {
    let parsed: Fen = fen
        .trim()
        .parse()
        .map_err(|e| Error::InvalidPosition(format!("{}: {}", fen, e)))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| Error::InvalidPosition(format!("{}: {}", fen, e)))
}

pub fn to_fen(position: &Chess) -> String {
    Fen::from_position(position, EnPassantMode::Legal).to_string()
}

/// Parses a SAN token and plays it on `position`.
pub fn resolve(position: &Chess, token: &str) -> std::result::Result<Ply, ReplayError> {
    let san: SanPlus = token
        .trim()
        .parse()
        .map_err(|_| ReplayError::Unparsable(token.to_string()))?;

    let mv = san
        .san
        .to_move(position)
        .map_err(|_| ReplayError::IllegalMove(token.to_string()))?;

    play(position, mv).ok_or_else(|| ReplayError::IllegalMove(token.to_string()))
}

/// Plays an already-legal move and renders its canonical notation.
pub fn play(position: &Chess, mv: Move) -> Option<Ply> {
    let san = San::from_move(position, mv.clone());
    let after = position.clone().play(mv.clone()).ok()?;
    let suffix = if after.is_checkmate() {
        "#"
    } else if after.is_check() {
        "+"
    } else {
        ""
    };

    Some(Ply {
        notation: format!("{}{}", san, suffix),
        mv,
        after,
    })
}

/// All legal moves of `position` in canonical notation
pub fn legal_notations(position: &Chess) -> Vec<String> {
    position
        .legal_moves()
        .into_iter()
        .filter_map(|mv| play(position, mv))
        .map(|ply| ply.notation)
        .collect()
}

/// True when `color`'s king is attacked in `position`.
pub fn king_attacked(position: &Chess, color: Color) -> bool {
    let board = position.board();
    match board.king_of(color) {
        Some(king) => !board.attacks_to(king, !color, board.occupied()).is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_side_to_move_and_rights() {
        let a = PositionKey::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        let b = PositionKey::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b - - 7 30");
        assert_eq!(a, b);
        assert_eq!(a, PositionKey::starting());
    }

    #[test]
    fn test_key_is_transposition_safe() {
        let mut via_knight_first = Chess::default();
        for token in ["Nf3", "Nf6", "e4", "e5"] {
            via_knight_first = resolve(&via_knight_first, token).unwrap().after;
        }

        let mut via_pawn_first = Chess::default();
        for token in ["e4", "e5", "Nf3", "Nf6"] {
            via_pawn_first = resolve(&via_pawn_first, token).unwrap().after;
        }

        assert_eq!(
            PositionKey::from_position(&via_knight_first),
            PositionKey::from_position(&via_pawn_first)
        );
    }

    #[test]
    fn test_resolve_renders_check_suffix() {
        let position =
            parse_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2").unwrap();
        let ply = resolve(&position, "Bb5").unwrap();
        assert_eq!(ply.notation, "Bb5+");
        assert!(ply.is_check());
        assert_eq!(ply.mover(), Color::White);

        let capture = resolve(&position, "exd5").unwrap();
        assert!(capture.is_capture());
        assert!(!capture.is_check());
    }

    #[test]
    fn test_resolve_rejects_bad_tokens() {
        let position = Chess::default();
        assert_eq!(
            resolve(&position, "Ke5").unwrap_err(),
            ReplayError::IllegalMove("Ke5".to_string())
        );
        assert!(matches!(resolve(&position, "zz9"), Err(ReplayError::Unparsable(_))));
    }

    #[test]
    fn test_legal_notations_from_start() {
        let moves = legal_notations(&Chess::default());
        assert_eq!(moves.len(), 20);
        assert!(moves.contains(&"e4".to_string()));
        assert!(moves.contains(&"Nf3".to_string()));
    }

    #[test]
    fn test_parse_fen_rejects_garbage() {
        assert!(matches!(parse_fen("not a fen"), Err(Error::InvalidPosition(_))));
    }
}
