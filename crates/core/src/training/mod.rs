//! Training material mined from tier corpora

pub mod recommendations;

pub use recommendations::{generate, Recommendation, RecommendationCategory};
