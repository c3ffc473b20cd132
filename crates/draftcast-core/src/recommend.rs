// Recommendation engine: ranks the remaining pool into a primary pick plus
// backups.
//
// Pure and deterministic: identical inputs always produce identical output.
// Ranking is a static positional priority (RB, WR, TE, QB, DEF, K, then any
// other position) with ascending ADP as the tie-break. Players without an
// ADP sort behind every ranked player at the same position.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Player;
use crate::draft::pick::Position;

/// Maximum number of backup candidates returned alongside the primary.
pub const MAX_BACKUPS: usize = 3;

/// Remaining roster needs per position (e.g. RB → 2).
pub type RosterNeeds = HashMap<Position, u32>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecommendError {
    #[error("no remaining candidates in the available pool")]
    EmptyPool,
}

/// A ranked suggestion for the next pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub primary: Player,
    pub backups: Vec<Player>,
    pub explanation: String,
}

/// Wire form of a recommendation, including the exhausted-pool case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationPayload {
    Ready(Recommendation),
    NoCandidates { explanation: String },
}

impl From<Result<Recommendation, RecommendError>> for RecommendationPayload {
    fn from(result: Result<Recommendation, RecommendError>) -> Self {
        match result {
            Ok(reco) => RecommendationPayload::Ready(reco),
            Err(e) => RecommendationPayload::NoCandidates {
                explanation: capitalize(&e.to_string()),
            },
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Position priority: lower is drafted earlier. Unknown positions share the
/// last bucket.
pub fn priority_rank(position: &Position) -> u8 {
    match position {
        Position::RunningBack => 0,
        Position::WideReceiver => 1,
        Position::TightEnd => 2,
        Position::Quarterback => 3,
        Position::Defense => 4,
        Position::Kicker => 5,
        Position::Other(_) => 6,
    }
}

fn compare(a: &Player, b: &Player) -> Ordering {
    priority_rank(&a.position)
        .cmp(&priority_rank(&b.position))
        .then_with(|| match (a.adp, b.adp) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Rank `available` and return the top candidate with up to three backups.
///
/// `round` and `my_needs` are reserved: they are accepted so callers can
/// already supply them, but the ranking is not yet round- or need-aware.
/// Equal keys keep their input order.
pub fn recommend(
    available: &[&Player],
    round: u32,
    my_needs: Option<&RosterNeeds>,
) -> Result<Recommendation, RecommendError> {
    let _ = (round, my_needs);

    let mut sorted: Vec<&Player> = available.to_vec();
    sorted.sort_by(|a, b| compare(a, b));

    let mut ranked = sorted.into_iter();
    let primary = ranked.next().ok_or(RecommendError::EmptyPool)?;
    let backups: Vec<Player> = ranked.take(MAX_BACKUPS).cloned().collect();

    Ok(Recommendation {
        explanation: format!(
            "Prioritizing {} based on early-round scarcity and ADP value.",
            primary.position
        ),
        primary: primary.clone(),
        backups,
    })
}
