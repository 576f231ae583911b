//! Pattern types for tactical mining

use std::collections::HashMap;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::position::PositionKey;

/// Tactical motif a corpus move can instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Capture,
    Check,
    /// Relaxed: two or more enemy-occupied squares attacked by any of the
    /// mover's pieces after the move, not only by the moved piece
    Fork,
}

/// Category -> position -> moves played there that matched the category.
///
/// Append-only. A move is listed once per time it was played, so the same
/// notation can repeat under one key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternIndex {
    categories: HashMap<PatternCategory, HashMap<PositionKey, Vec<String>>>,
}

impl PatternIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, category: PatternCategory, key: PositionKey, notation: &str) {
        self.categories
            .entry(category)
            .or_default()
            .entry(key)
            .or_default()
            .push(notation.to_string());
    }

    /// Appends every list of `other` after the matching list of `self`
    pub fn extend(&mut self, other: PatternIndex) {
        for (category, positions) in other.categories {
            let target = self.categories.entry(category).or_default();
            for (key, moves) in positions {
                target.entry(key).or_default().extend(moves);
            }
        }
    }

    pub fn moves(&self, category: PatternCategory, key: &PositionKey) -> &[String] {
        self.categories
            .get(&category)
            .and_then(|positions| positions.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, category: PatternCategory, key: &PositionKey, notation: &str) -> bool {
        self.moves(category, key).iter().any(|m| m == notation)
    }

    /// Number of positions with at least one move under `category`
    pub fn positions(&self, category: PatternCategory) -> usize {
        self.categories.get(&category).map_or(0, HashMap::len)
    }

    /// Number of recorded moves under `category`
    pub fn occurrences(&self, category: PatternCategory) -> usize {
        self.categories
            .get(&category)
            .map_or(0, |positions| positions.values().map(Vec::len).sum())
    }
}

/// Per-game (and, summed, per-tier) counts of what the moves did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TacticTally {
    pub captures: u32,
    pub checks: u32,
    pub forks: u32,
    /// Moves landing on d4, e4, d5 or e5
    pub center_moves: u32,
    pub castles: u32,
}

impl AddAssign for TacticTally {
    fn add_assign(&mut self, rhs: TacticTally) {
        self.captures += rhs.captures;
        self.checks += rhs.checks;
        self.forks += rhs.forks;
        self.center_moves += rhs.center_moves;
        self.castles += rhs.castles;
    }
}

/// What mining learned about one game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTactics {
    pub tally: TacticTally,
    pub plies_replayed: u32,
    /// The replay reached a position with few enough pieces to count as an endgame
    pub reached_endgame: bool,
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_appends_in_order() {
        let key = PositionKey::starting();
        let mut first = PatternIndex::new();
        first.record(PatternCategory::Check, key.clone(), "Bb5+");

        let mut second = PatternIndex::new();
        second.record(PatternCategory::Check, key.clone(), "Qh5+");
        second.record(PatternCategory::Check, key.clone(), "Bb5+");

        first.extend(second);
        assert_eq!(first.moves(PatternCategory::Check, &key), ["Bb5+", "Qh5+", "Bb5+"]);
        assert_eq!(first.occurrences(PatternCategory::Check), 3);
        assert_eq!(first.positions(PatternCategory::Check), 1);
        assert!(first.moves(PatternCategory::Fork, &key).is_empty());
        assert!(first.contains(PatternCategory::Check, &key, "Qh5+"));
    }

    #[test]
    fn test_category_names() {
        assert_eq!(serde_json::to_string(&PatternCategory::Fork).unwrap(), "\"fork\"");
        assert_eq!(serde_json::to_string(&PatternCategory::Capture).unwrap(), "\"capture\"");
    }

    #[test]
    fn test_tally_sum() {
        let mut total = TacticTally::default();
        total += TacticTally { captures: 2, checks: 1, ..Default::default() };
        total += TacticTally { captures: 1, forks: 4, ..Default::default() };
        assert_eq!(total.captures, 3);
        assert_eq!(total.checks, 1);
        assert_eq!(total.forks, 4);
    }
}
