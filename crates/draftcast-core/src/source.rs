// Collaborator contracts consumed by the core.
//
// The tracker only needs an ordered pick list per draft, the catalog only
// needs a one-shot player snapshot, and viewer lookups need league/draft
// discovery. Adapters for a concrete platform implement these traits.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::RawPlayerRecord;
use crate::draft::pick::Pick;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Failure talking to the upstream draft platform.
///
/// The tracker treats every variant identically (log, retry next tick); the
/// distinction only matters for logs and lookup replies.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Lookup summaries
// ---------------------------------------------------------------------------

/// A league the user belongs to, as shown in the draft picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueSummary {
    pub league_id: String,
    pub name: String,
    pub season: String,
    pub total_rosters: Option<u32>,
}

/// A draft belonging to a league.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub draft_id: String,
    pub status: String,
    pub season: String,
    /// Number of teams, when the platform reports it.
    pub teams: Option<u32>,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Source of the authoritative pick list for a draft.
#[async_trait]
pub trait PickSource: Send + Sync {
    /// Return every pick made so far, ordered by overall pick number.
    async fn fetch_picks(&self, draft_id: &str) -> Result<Vec<Pick>, FetchError>;
}

/// Source of the static player snapshot, consumed once at startup.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_player_snapshot(&self) -> Result<HashMap<String, RawPlayerRecord>, FetchError>;
}

/// League and draft discovery for viewers that don't know their draft id.
#[async_trait]
pub trait DraftDirectory: Send + Sync {
    async fn leagues_for_user(
        &self,
        username: &str,
        season: &str,
    ) -> Result<Vec<LeagueSummary>, FetchError>;

    async fn drafts_for_league(&self, league_id: &str) -> Result<Vec<DraftSummary>, FetchError>;
}
