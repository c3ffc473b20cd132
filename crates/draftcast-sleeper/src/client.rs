// HTTP client for the Sleeper REST API.
//
// Every call is a plain GET returning JSON. Non-2xx responses become
// `FetchError::Status`, connection problems `FetchError::Transport`, and
// bodies that don't match the expected shape `FetchError::Decode`.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use draftcast_core::catalog::RawPlayerRecord;
use draftcast_core::draft::pick::Pick;
use draftcast_core::source::{
    CatalogSource, DraftDirectory, DraftSummary, FetchError, LeagueSummary, PickSource,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.sleeper.app/v1";
pub const DEFAULT_SPORT: &str = "nfl";

// ---------------------------------------------------------------------------
// Raw upstream shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawUser {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct RawLeague {
    league_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    season: Option<String>,
    #[serde(default)]
    total_rosters: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDraftSettings {
    #[serde(default)]
    teams: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawDraft {
    draft_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    season: Option<String>,
    #[serde(default)]
    settings: Option<RawDraftSettings>,
}

#[derive(Debug, Deserialize)]
struct RawPick {
    pick_no: u32,
    player_id: String,
    #[serde(default)]
    picked_by: Option<String>,
    #[serde(default)]
    roster_id: Option<u32>,
}

impl From<RawPick> for Pick {
    fn from(raw: RawPick) -> Self {
        // Offline/autodraft slots have an empty `picked_by`; the roster id
        // still identifies the team.
        let team_id = match raw.picked_by {
            Some(user) if !user.is_empty() => user,
            _ => raw.roster_id.map(|id| id.to_string()).unwrap_or_default(),
        };
        Pick {
            overall_pick: raw.pick_no,
            player_id: raw.player_id,
            team_id,
        }
    }
}

// ---------------------------------------------------------------------------
// SleeperClient
// ---------------------------------------------------------------------------

/// Thin JSON client over the Sleeper REST endpoints.
#[derive(Debug, Clone)]
pub struct SleeperClient {
    http: reqwest::Client,
    base_url: String,
    sport: String,
}

impl SleeperClient {
    pub fn new(base_url: impl Into<String>, sport: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            sport: sport.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn sport(&self) -> &str {
        &self.sport
    }

    /// `base_url` plus `segments`, each percent-encoded as a single path
    /// segment so viewer-supplied ids can't reach another endpoint.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::Transport(format!("invalid base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Transport(format!("base url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, FetchError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "GET");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(format!("{url}: {e}")))
    }

    /// Resolve a username to its Sleeper user id.
    pub async fn get_user_id(&self, username: &str) -> Result<String, FetchError> {
        // Sleeper answers unknown users with `200 null`.
        let user: Option<RawUser> = self.get_json(&["user", username]).await?;
        user.map(|u| u.user_id)
            .ok_or_else(|| FetchError::Decode(format!("no Sleeper user named {username:?}")))
    }

    pub async fn get_leagues_for_user(
        &self,
        user_id: &str,
        season: &str,
    ) -> Result<Vec<LeagueSummary>, FetchError> {
        let leagues: Option<Vec<RawLeague>> = self
            .get_json(&["user", user_id, "leagues", &self.sport, season])
            .await?;
        Ok(leagues
            .unwrap_or_default()
            .into_iter()
            .map(|raw| LeagueSummary {
                league_id: raw.league_id,
                name: raw.name.unwrap_or_default(),
                season: raw.season.unwrap_or_else(|| season.to_string()),
                total_rosters: raw.total_rosters,
            })
            .collect())
    }

    pub async fn get_drafts_for_league(
        &self,
        league_id: &str,
    ) -> Result<Vec<DraftSummary>, FetchError> {
        let drafts: Option<Vec<RawDraft>> =
            self.get_json(&["league", league_id, "drafts"]).await?;
        Ok(drafts
            .unwrap_or_default()
            .into_iter()
            .map(|raw| DraftSummary {
                draft_id: raw.draft_id,
                status: raw.status.unwrap_or_default(),
                season: raw.season.unwrap_or_default(),
                teams: raw.settings.and_then(|s| s.teams),
            })
            .collect())
    }

    /// Every pick made so far in `draft_id`, sorted by overall pick number.
    pub async fn get_draft_picks(&self, draft_id: &str) -> Result<Vec<Pick>, FetchError> {
        let raw: Option<Vec<RawPick>> =
            self.get_json(&["draft", draft_id, "picks"]).await?;
        let mut picks: Vec<Pick> = raw.unwrap_or_default().into_iter().map(Pick::from).collect();
        picks.sort_by_key(|p| p.overall_pick);
        Ok(picks)
    }

    /// The full player snapshot for the configured sport.
    ///
    /// Individual records that don't decode are skipped rather than failing
    /// the whole snapshot; the upstream file carries many odd placeholders.
    pub async fn get_players(&self) -> Result<HashMap<String, RawPlayerRecord>, FetchError> {
        let raw: HashMap<String, serde_json::Value> =
            self.get_json(&["players", &self.sport]).await?;

        let total = raw.len();
        let mut players = HashMap::with_capacity(total);
        for (id, value) in raw {
            match serde_json::from_value::<RawPlayerRecord>(value) {
                Ok(record) => {
                    players.insert(id, record);
                }
                Err(e) => debug!(player_id = %id, "skipping undecodable player record: {e}"),
            }
        }
        if players.len() < total {
            warn!(
                skipped = total - players.len(),
                total, "some player records could not be decoded"
            );
        }
        Ok(players)
    }
}

// ---------------------------------------------------------------------------
// Collaborator trait impls
// ---------------------------------------------------------------------------

#[async_trait]
impl PickSource for SleeperClient {
    async fn fetch_picks(&self, draft_id: &str) -> Result<Vec<Pick>, FetchError> {
        self.get_draft_picks(draft_id).await
    }
}

#[async_trait]
impl CatalogSource for SleeperClient {
    async fn fetch_player_snapshot(&self) -> Result<HashMap<String, RawPlayerRecord>, FetchError> {
        self.get_players().await
    }
}

#[async_trait]
impl DraftDirectory for SleeperClient {
    async fn leagues_for_user(
        &self,
        username: &str,
        season: &str,
    ) -> Result<Vec<LeagueSummary>, FetchError> {
        let user_id = self.get_user_id(username).await?;
        self.get_leagues_for_user(&user_id, season).await
    }

    async fn drafts_for_league(&self, league_id: &str) -> Result<Vec<DraftSummary>, FetchError> {
        self.get_drafts_for_league(league_id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
