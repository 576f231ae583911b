//! Per-tier aggregates mined from a corpus

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shakmaty::Chess;

use crate::parser::GameRecord;
use crate::patterns::{GameTactics, TacticTally};
use crate::position;
use crate::tier::Tier;

/// Plies that make up an opening sequence
pub const OPENING_SEQUENCE_PLIES: usize = 2;

/// A move sequence and how many times it occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCount {
    pub sequence: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierProfile {
    pub tier: Tier,
    pub games: usize,
    /// Games the loader dropped
    pub skipped: usize,
    /// Games whose replay stopped at a rejected move
    pub truncated: usize,
    pub total_plies: usize,
    pub average_plies: u32,
    /// First-seen order
    pub openings: Vec<SequenceCount>,
    /// `"a -> b"` for consecutive moves, first-seen order. Sequences use
    /// canonical notation.
    pub transitions: Vec<SequenceCount>,
    pub tactics: TacticTally,
    pub endgame_games: usize,
}

impl TierProfile {
    /// Builds the profile of one tier. `tactics` must line up with `games`.
    pub fn build(
        tier: Tier,
        games: &[GameRecord],
        tactics: &[GameTactics],
        skipped: usize,
    ) -> Self {
        let total_plies: usize = games.iter().map(GameRecord::ply_count).sum();
        let average_plies = if games.is_empty() {
            0
        } else {
            (total_plies as f64 / games.len() as f64).round() as u32
        };

        let replayed: Vec<Vec<String>> = games.iter().map(canonical_moves).collect();
        let openings = count_first_seen(
            replayed
                .iter()
                .filter(|moves| moves.len() >= OPENING_SEQUENCE_PLIES)
                .map(|moves| moves[..OPENING_SEQUENCE_PLIES].join(" ")),
        );
        let transitions = count_first_seen(replayed.iter().flat_map(|moves| {
            moves
                .windows(2)
                .map(|pair| format!("{} -> {}", pair[0], pair[1]))
        }));

        let mut tally = TacticTally::default();
        let mut truncated = 0;
        let mut endgame_games = 0;
        for game in tactics {
            tally += game.tally;
            truncated += usize::from(game.truncated);
            endgame_games += usize::from(game.reached_endgame);
        }

        Self {
            tier,
            games: games.len(),
            skipped,
            truncated,
            total_plies,
            average_plies,
            openings,
            transitions,
            tactics: tally,
            endgame_games,
        }
    }

    /// The `n` most frequent openings, most frequent first, first-seen on ties
    pub fn top_openings(&self, n: usize) -> Vec<&SequenceCount> {
        top(&self.openings, n)
    }

    pub fn top_transitions(&self, n: usize) -> Vec<&SequenceCount> {
        top(&self.transitions, n)
    }
}

/// Canonical notation of the game's moves, up to the first rejected one
fn canonical_moves(game: &GameRecord) -> Vec<String> {
    let mut board = Chess::default();
    let mut moves = Vec::with_capacity(game.moves.len());
    for token in &game.moves {
        match position::resolve(&board, token) {
            Ok(ply) => {
                moves.push(ply.notation);
                board = ply.after;
            }
            Err(_) => break,
        }
    }
    moves
}

fn count_first_seen(sequences: impl Iterator<Item = String>) -> Vec<SequenceCount> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<SequenceCount> = Vec::new();

    for sequence in sequences {
        match positions.get(&sequence) {
            Some(&at) => counts[at].count += 1,
            None => {
                positions.insert(sequence.clone(), counts.len());
                counts.push(SequenceCount { sequence, count: 1 });
            }
        }
    }

    counts
}

fn top(entries: &[SequenceCount], n: usize) -> Vec<&SequenceCount> {
    let mut sorted: Vec<&SequenceCount> = entries.iter().collect();
    // Stable, so equal counts keep first-seen order
    sorted.sort_by(|a, b| b.count.cmp(&a.count));
    sorted.truncate(n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::load_corpus;

    const CORPUS: &str = r#"[Event "1"]

1. d4 d5 2. c4 *

[Event "2"]

1. e4 e5 2. Nf3 Nc6 *

[Event "3"]

1. e4 c5 *

[Event "4"]

1. e4 e5 2. Nf3 *

[Event "5"]

1. d4 d5 *
"#;

    fn profile() -> TierProfile {
        let games = load_corpus(&Tier::Beginner, CORPUS).games;
        let tactics = vec![GameTactics::default(); games.len()];
        TierProfile::build(Tier::Beginner, &games, &tactics, 1)
    }

    #[test]
    fn test_counts_and_average() {
        let profile = profile();
        assert_eq!(profile.games, 5);
        assert_eq!(profile.skipped, 1);
        assert_eq!(profile.total_plies, 3 + 4 + 2 + 3 + 2);
        // 14 / 5 = 2.8
        assert_eq!(profile.average_plies, 3);
    }

    #[test]
    fn test_openings_keep_first_seen_order() {
        let profile = profile();
        let sequences: Vec<(&str, u32)> = profile
            .openings
            .iter()
            .map(|s| (s.sequence.as_str(), s.count))
            .collect();
        assert_eq!(sequences, vec![("d4 d5", 2), ("e4 e5", 2), ("e4 c5", 1)]);
    }

    #[test]
    fn test_top_openings_break_ties_by_first_seen() {
        let profile = profile();
        let top: Vec<&str> = profile
            .top_openings(2)
            .iter()
            .map(|s| s.sequence.as_str())
            .collect();
        assert_eq!(top, vec!["d4 d5", "e4 e5"]);
        assert_eq!(profile.top_openings(10).len(), 3);
    }

    #[test]
    fn test_transitions() {
        let profile = profile();
        let top = profile.top_transitions(1);
        assert_eq!(top[0].sequence, "d4 -> d5");
        assert_eq!(top[0].count, 2);
        assert!(profile
            .transitions
            .iter()
            .any(|s| s.sequence == "Nf3 -> Nc6" && s.count == 1));
    }

    #[test]
    fn test_sequences_use_canonical_notation() {
        let pgn = r#"[Event "Suffixed"]

1. e4 d5 2. Bb5+ c6 *

[Event "Bare"]

1. e4 d5 2. Bb5 c6 *

[Event "Rejected"]

1. e4 Ke7 *
"#;
        let games = load_corpus(&Tier::Beginner, pgn).games;
        let tactics = vec![GameTactics::default(); games.len()];
        let profile = TierProfile::build(Tier::Beginner, &games, &tactics, 0);

        assert_eq!(profile.openings.len(), 1);
        assert_eq!(profile.openings[0].sequence, "e4 d5");
        assert_eq!(profile.openings[0].count, 2);

        let check = profile
            .transitions
            .iter()
            .find(|s| s.sequence == "d5 -> Bb5+")
            .unwrap();
        assert_eq!(check.count, 2);
        assert!(!profile.transitions.iter().any(|s| s.sequence.contains("Bb5 ")));
        assert_eq!(profile.top_transitions(1)[0].count, 2);
    }

    #[test]
    fn test_tactics_are_summed() {
        let games = load_corpus(&Tier::Master, CORPUS).games;
        let mut tactics = vec![GameTactics::default(); games.len()];
        tactics[0].tally.captures = 2;
        tactics[3].tally.captures = 1;
        tactics[3].truncated = true;
        tactics[4].reached_endgame = true;

        let profile = TierProfile::build(Tier::Master, &games, &tactics, 0);
        assert_eq!(profile.tactics.captures, 3);
        assert_eq!(profile.truncated, 1);
        assert_eq!(profile.endgame_games, 1);
    }

    #[test]
    fn test_empty_tier() {
        let profile = TierProfile::build(Tier::from("club"), &[], &[], 0);
        assert_eq!(profile.average_plies, 0);
        assert!(profile.top_openings(3).is_empty());
    }
}
