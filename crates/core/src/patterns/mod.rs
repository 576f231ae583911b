//! Tactical pattern mining

mod miner;
mod types;

pub use miner::{classify, is_fork, mine_patterns, PatternMining, ENDGAME_PIECES};
pub use types::*;
