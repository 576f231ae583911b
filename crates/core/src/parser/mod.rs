//! Parser module for reading tier corpora
//!
//! Currently supports:
//! - PGN (Portable Game Notation)

pub mod pgn;

pub use pgn::{load_corpus, load_corpus_cancellable, GameRecord, LoadedCorpus};
