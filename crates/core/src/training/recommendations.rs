//! Training recommendations derived from a tier profile

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::profile::{SequenceCount, TierProfile};
use crate::tier::Tier;

const TOP_TRANSITIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Opening,
    Tactics,
    Positional,
    Strategy,
    Endgame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: RecommendationCategory,
    pub title: String,
    pub description: String,
    pub supporting_data: Value,
}

impl Recommendation {
    fn new(
        category: RecommendationCategory,
        title: &str,
        description: String,
        supporting_data: Value,
    ) -> Self {
        Self {
            category,
            title: title.to_string(),
            description,
            supporting_data,
        }
    }
}

/// How many opening sequences a tier is shown
pub fn opening_limit(tier: &Tier) -> usize {
    match tier {
        Tier::Beginner => 5,
        Tier::Intermediate => 10,
        Tier::Master | Tier::Other(_) => 3,
    }
}

fn sequences_json(entries: &[&SequenceCount], key: &str) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|entry| json!({ key: entry.sequence, "frequency": entry.count }))
            .collect(),
    )
}

/// Builds the recommendation list for `tier` from its mined profile.
///
/// The opening block comes first whenever the tier has any opening
/// sequences, followed by the tier-specific blocks.
pub fn generate(tier: &Tier, profile: &TierProfile) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();
    let tally = &profile.tactics;

    let openings = profile.top_openings(opening_limit(tier));
    if !openings.is_empty() {
        recommendations.push(Recommendation::new(
            RecommendationCategory::Opening,
            "Study Common Openings",
            format!("Focus on the most played openings in {} games", tier.display_name()),
            sequences_json(&openings, "opening"),
        ));
    }

    match tier {
        Tier::Beginner => {
            recommendations.push(Recommendation::new(
                RecommendationCategory::Tactics,
                "Basic Tactics",
                "Practice simple captures and checks".to_string(),
                json!({ "captures": tally.captures, "checks": tally.checks }),
            ));
        }
        Tier::Intermediate => {
            recommendations.push(Recommendation::new(
                RecommendationCategory::Tactics,
                "Intermediate Tactics",
                "Study forks and the combinations that lead to them".to_string(),
                json!({ "forks": tally.forks, "captures": tally.captures, "checks": tally.checks }),
            ));
            recommendations.push(Recommendation::new(
                RecommendationCategory::Positional,
                "Positional Understanding",
                "Fight for the centre and get the king to safety".to_string(),
                json!({ "center_moves": tally.center_moves, "castles": tally.castles }),
            ));
        }
        Tier::Master => {
            let transitions = profile.top_transitions(TOP_TRANSITIONS);
            recommendations.push(Recommendation::new(
                RecommendationCategory::Strategy,
                "Strategic Planning",
                "Focus on long-term strategic plans".to_string(),
                json!({
                    "average_plies": profile.average_plies,
                    "center_moves": tally.center_moves,
                    "castles": tally.castles,
                    "common_transitions": sequences_json(&transitions, "transition"),
                }),
            ));
            recommendations.push(Recommendation::new(
                RecommendationCategory::Endgame,
                "Endgame Technique",
                format!("Convert the endings that {} games reach", tier.display_name()),
                json!({ "endgame_games": profile.endgame_games, "games": profile.games }),
            ));
        }
        Tier::Other(_) => {}
    }

    recommendations
}
