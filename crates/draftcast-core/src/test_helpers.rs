// Shared fixtures for tracker and registry tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::catalog::{Catalog, Player};
use crate::draft::pick::{Pick, Position};
use crate::source::{FetchError, PickSource};

/// Pick source that replays a script of responses, repeating the final one
/// forever once the script runs out.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<Pick>, FetchError>>>,
    last: Mutex<Result<Vec<Pick>, FetchError>>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<Pick>, FetchError>>) -> Self {
        let last = script.last().cloned().unwrap_or_else(|| Ok(Vec::new()));
        ScriptedSource {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Same picks on every call.
    pub fn constant(picks: Vec<Pick>) -> Self {
        Self::new(vec![Ok(picks)])
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PickSource for ScriptedSource {
    async fn fetch_picks(&self, _draft_id: &str) -> Result<Vec<Pick>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(response) => {
                *self.last.lock().unwrap() = response.clone();
                response
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

pub fn player(id: &str, pos: Position, adp: Option<f64>) -> Player {
    Player {
        id: id.to_string(),
        name: format!("Player {id}"),
        position: pos,
        team: None,
        bye_week: None,
        adp,
    }
}

/// Six players: two RBs, two WRs, a QB and a K.
pub fn fixture_catalog() -> Catalog {
    Catalog::from_players(vec![
        player("rb1", Position::RunningBack, Some(1.0)),
        player("rb2", Position::RunningBack, Some(8.0)),
        player("wr1", Position::WideReceiver, Some(2.0)),
        player("wr2", Position::WideReceiver, None),
        player("qb1", Position::Quarterback, Some(30.0)),
        player("k1", Position::Kicker, Some(150.0)),
    ])
}

pub fn picks(player_ids: &[&str]) -> Vec<Pick> {
    player_ids
        .iter()
        .enumerate()
        .map(|(i, id)| Pick {
            overall_pick: i as u32 + 1,
            player_id: id.to_string(),
            team_id: format!("team_{}", i % 2 + 1),
        })
        .collect()
}
