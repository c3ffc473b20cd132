// Wire protocol between the server and viewer clients.
//
// Inbound frames are JSON objects tagged by `type`; outbound frames carry an
// `event` name and a `data` body. Event names match what the mobile client
// listens for.

use serde::{Deserialize, Serialize};

use crate::draft::state::StateSummary;
use crate::recommend::RecommendationPayload;
use crate::source::{DraftSummary, LeagueSummary};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A message sent by a viewer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "draft:join", rename_all = "camelCase")]
    Join { draft_id: String },

    #[serde(rename = "draft:leave", rename_all = "camelCase")]
    Leave { draft_id: String },

    /// Look up the leagues a platform user belongs to. `season` defaults to
    /// the current year.
    #[serde(rename = "sleeper:leagues")]
    Leagues {
        username: String,
        #[serde(default)]
        season: Option<String>,
    },

    #[serde(rename = "sleeper:drafts", rename_all = "camelCase")]
    Drafts { league_id: String },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEvent {
    pub draft_id: String,
    #[serde(flatten)]
    pub summary: StateSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationEvent {
    pub draft_id: String,
    #[serde(flatten)]
    pub recommendation: RecommendationPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipEvent {
    pub draft_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaguesEvent {
    pub leagues: Vec<LeagueSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftsEvent {
    pub league_id: String,
    pub drafts: Vec<DraftSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    pub message: String,
}

/// A message pushed to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "draft:server_state")]
    State(StateEvent),
    #[serde(rename = "draft:recommendation")]
    Recommendation(RecommendationEvent),
    #[serde(rename = "draft:joined")]
    Joined(MembershipEvent),
    #[serde(rename = "draft:left")]
    Left(MembershipEvent),
    #[serde(rename = "sleeper:leagues")]
    Leagues(LeaguesEvent),
    #[serde(rename = "sleeper:drafts")]
    Drafts(DraftsEvent),
    #[serde(rename = "error")]
    Error(ErrorEvent),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorEvent {
            message: message.into(),
        })
    }

    /// The `event` name this message is sent under.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::State(_) => "draft:server_state",
            ServerMessage::Recommendation(_) => "draft:recommendation",
            ServerMessage::Joined(_) => "draft:joined",
            ServerMessage::Left(_) => "draft:left",
            ServerMessage::Leagues(_) => "sleeper:leagues",
            ServerMessage::Drafts(_) => "sleeper:drafts",
            ServerMessage::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
