//! Chess Coach Core Library
//!
//! Mines opening books and tactical patterns from skill-tiered game corpora
//! and suggests moves the way players of a given tier tend to play them.

use serde::Serialize;
use shakmaty::{Chess, Color, Position};

pub mod advisor;
pub mod book;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod eval;
pub mod parser;
pub mod patterns;
pub mod position;
pub mod profile;
pub mod tier;
pub mod training;

pub use advisor::{Advisor, AdvisorContext};
pub use book::OpeningBook;
pub use config::EngineConfig;
pub use corpus::TierSource;
pub use engine::{refresh_corpus, Engine, EngineHandle, RefreshReport};
pub use error::{Error, Result};
pub use eval::{evaluate, Score};
pub use patterns::{PatternCategory, PatternIndex};
pub use position::PositionKey;
pub use profile::TierProfile;
pub use tier::Tier;
pub use training::Recommendation;

/// Basic position information
#[derive(Debug, Serialize)]
pub struct PositionInfo {
    pub piece_count: u32,
    pub legal_move_count: u32,
    pub side_to_move: &'static str,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_stalemate: bool,
    pub evaluation: Score,
}

/// Analyzes a chess position
pub fn analyze_position(position: &Chess) -> PositionInfo {
    let side_to_move = match position.turn() {
        Color::White => "white",
        Color::Black => "black",
    };

    PositionInfo {
        piece_count: position.board().occupied().count() as u32,
        legal_move_count: position.legal_moves().len() as u32,
        side_to_move,
        is_check: position.is_check(),
        is_checkmate: position.is_checkmate(),
        is_stalemate: position.is_stalemate(),
        evaluation: evaluate(position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_position_info() {
        let info = analyze_position(&Chess::default());
        assert_eq!(info.piece_count, 32);
        assert_eq!(info.legal_move_count, 20);
        assert_eq!(info.side_to_move, "white");
        assert!(!info.is_check);
        assert_eq!(info.evaluation, Score::ZERO);
    }

    #[test]
    fn test_checkmate_info() {
        let fools_mate = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        let position = position::parse_fen(fools_mate).unwrap();
        let info = analyze_position(&position);
        assert!(info.is_checkmate);
        assert_eq!(info.legal_move_count, 0);
    }
}
