// Player catalog: the static, read-only player index shared by every
// tracker and by the recommendation engine.
//
// Built once at startup from the upstream player snapshot, optionally
// enriched with ADP values loaded from a CSV export. Records without a
// display name or position are placeholders and never become draftable.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::draft::pick::Position;
use crate::source::{CatalogSource, FetchError};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A draftable player. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    #[serde(rename = "pos")]
    pub position: Position,
    pub team: Option<String>,
    pub bye_week: Option<u32>,
    /// Average draft position; `None` when no ADP source ranked the player.
    pub adp: Option<f64>,
}

/// One entry of the upstream player snapshot, before filtering.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawPlayerRecord {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub bye_week: Option<u32>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("player snapshot unavailable: {0}")]
    Unreachable(#[from] FetchError),

    #[error("player snapshot contained no draftable players")]
    Empty,

    #[error("failed to read ADP file {path}: {source}")]
    AdpIo {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in ADP file {path}: {source}")]
    AdpCsv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable player index keyed by player id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    players: BTreeMap<String, Player>,
}

impl Catalog {
    /// Fetch the snapshot from `source` and build the catalog.
    ///
    /// Fails when the snapshot is unreachable or filters down to nothing; the
    /// caller is expected to treat either as fatal.
    pub async fn build(
        source: &dyn CatalogSource,
        adp: &HashMap<String, f64>,
    ) -> Result<Self, CatalogError> {
        let snapshot = source.fetch_player_snapshot().await?;
        let total = snapshot.len();
        let catalog = Self::from_snapshot(snapshot, adp);
        if catalog.is_empty() {
            return Err(CatalogError::Empty);
        }
        info!(
            total,
            draftable = catalog.len(),
            with_adp = catalog.players().filter(|p| p.adp.is_some()).count(),
            "player catalog built"
        );
        Ok(catalog)
    }

    /// Build a catalog from an already-fetched snapshot.
    pub fn from_snapshot(
        snapshot: HashMap<String, RawPlayerRecord>,
        adp: &HashMap<String, f64>,
    ) -> Self {
        let players = snapshot
            .into_iter()
            .filter_map(|(id, raw)| {
                let name = raw.full_name.filter(|n| !n.trim().is_empty())?;
                let position = raw.position.as_deref().and_then(Position::from_str_pos)?;
                let player = Player {
                    adp: adp.get(&id).copied(),
                    id: id.clone(),
                    name,
                    position,
                    team: raw.team.filter(|t| !t.is_empty()),
                    bye_week: raw.bye_week,
                };
                Some((id, player))
            })
            .collect();
        Catalog { players }
    }

    /// Build a catalog directly from players. Duplicate ids keep the last entry.
    pub fn from_players(players: impl IntoIterator<Item = Player>) -> Self {
        Catalog {
            players: players.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    /// All player ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.players.keys().map(String::as_str)
    }

    /// All players, ordered by id.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ADP loading
// ---------------------------------------------------------------------------

/// ADP CSV row. Extra columns (name, team, source) are ignored.
#[derive(Debug, Deserialize)]
struct RawAdp {
    player_id: String,
    adp: f64,
}

fn load_adp_from_reader<R: Read>(rdr: R) -> Result<HashMap<String, f64>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    // An unreadable header row fails the whole load; bad data rows are skipped.
    reader.headers()?;
    let mut map = HashMap::new();
    for result in reader.deserialize::<RawAdp>() {
        match result {
            Ok(raw) => {
                let id = raw.player_id.trim().to_string();
                if !raw.adp.is_finite() {
                    warn!("skipping ADP entry for '{}': non-finite value", id);
                    continue;
                }
                if map.insert(id.clone(), raw.adp).is_some() {
                    warn!("duplicate ADP entry for '{}', using latest value", id);
                }
            }
            Err(e) => {
                warn!("skipping malformed ADP row: {}", e);
            }
        }
    }
    Ok(map)
}

/// Load ADP data from a CSV file with `player_id,adp` headers.
/// Returns a map of player id → ADP value.
pub fn load_adp(path: &Path) -> Result<HashMap<String, f64>, CatalogError> {
    let file = std::fs::File::open(path).map_err(|e| CatalogError::AdpIo {
        path: path.display().to_string(),
        source: e,
    })?;
    load_adp_from_reader(file).map_err(|e| CatalogError::AdpCsv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
