// Individual pick representation and football positions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Football positions as reported by the draft platform.
///
/// Anything outside the standard offensive/kicking/defense set (IDP slots
/// such as LB or DB) is preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Position {
    Quarterback,
    RunningBack,
    WideReceiver,
    TightEnd,
    Kicker,
    Defense,
    Other(String),
}

impl Position {
    /// Parse a position abbreviation. Case-insensitive; "DST" is accepted as
    /// an alias for team defense. Empty input yields `None`.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.to_uppercase().as_str() {
            "QB" => Position::Quarterback,
            "RB" => Position::RunningBack,
            "WR" => Position::WideReceiver,
            "TE" => Position::TightEnd,
            "K" => Position::Kicker,
            "DEF" | "DST" => Position::Defense,
            other => Position::Other(other.to_string()),
        })
    }

    /// Return the display abbreviation for this position.
    pub fn display_str(&self) -> &str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Kicker => "K",
            Position::Defense => "DEF",
            Position::Other(s) => s,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

impl From<String> for Position {
    fn from(s: String) -> Self {
        Position::from_str_pos(&s).unwrap_or(Position::Other(s))
    }
}

impl From<Position> for String {
    fn from(pos: Position) -> Self {
        pos.display_str().to_string()
    }
}

/// A single draft pick record. Append-only within a draft's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pick {
    /// Sequential overall pick number (1-indexed).
    pub overall_pick: u32,
    /// Catalog id of the selected player.
    pub player_id: String,
    /// Identifier of the selecting team.
    pub team_id: String,
}
