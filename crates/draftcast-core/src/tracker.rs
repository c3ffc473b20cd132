// Draft session tracker: polls one draft's pick list and turns every
// detected change into a state summary plus a fresh recommendation.
//
// One tracker task runs per actively observed draft. Fetches are awaited
// inline by the loop, so a tick never starts while the previous fetch is
// still outstanding. Failures are logged and retried forever with a capped
// exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::draft::state::{DraftState, StateSummary};
use crate::protocol::{RecommendationEvent, ServerMessage, StateEvent};
use crate::recommend::{recommend, RecommendationPayload};
use crate::source::{FetchError, PickSource};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2500);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
pub const DEFAULT_TEAMS_PER_LEAGUE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Delay between ticks while the upstream is healthy.
    pub poll_interval: Duration,
    /// Upper bound on the delay after repeated fetch failures.
    pub max_backoff: Duration,
    /// Picks per round. Fixed per process, not read from league metadata.
    pub teams_per_league: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_backoff: DEFAULT_MAX_BACKOFF,
            teams_per_league: DEFAULT_TEAMS_PER_LEAGUE,
        }
    }
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// Everything a tracker emits for one detected change.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftUpdate {
    pub draft_id: String,
    /// Generation of the tracker that produced this update.
    pub generation: u64,
    pub state: StateSummary,
    pub recommendation: RecommendationPayload,
}

impl DraftUpdate {
    /// The two viewer messages for this update, state summary first.
    pub fn into_messages(self) -> [ServerMessage; 2] {
        [
            ServerMessage::State(StateEvent {
                draft_id: self.draft_id.clone(),
                summary: self.state,
            }),
            ServerMessage::Recommendation(RecommendationEvent {
                draft_id: self.draft_id,
                recommendation: self.recommendation,
            }),
        ]
    }
}

// ---------------------------------------------------------------------------
// DraftTracker
// ---------------------------------------------------------------------------

pub struct DraftTracker {
    draft_id: String,
    generation: u64,
    source: Arc<dyn PickSource>,
    catalog: Arc<Catalog>,
    config: TrackerConfig,
    /// Pick count seen on the last successful fetch. `None` until the first
    /// success, so the first poll always emits.
    last_observed: Option<usize>,
    state: Option<DraftState>,
    consecutive_failures: u32,
}

impl DraftTracker {
    pub fn new(
        draft_id: impl Into<String>,
        generation: u64,
        source: Arc<dyn PickSource>,
        catalog: Arc<Catalog>,
        config: TrackerConfig,
    ) -> Self {
        DraftTracker {
            draft_id: draft_id.into(),
            generation,
            source,
            catalog,
            config,
            last_observed: None,
            state: None,
            consecutive_failures: 0,
        }
    }

    /// The most recently derived state, if any poll has succeeded.
    pub fn state(&self) -> Option<&DraftState> {
        self.state.as_ref()
    }

    /// Fetch the pick list once and derive a new update if the pick count
    /// changed. Any count mismatch, including a decrease, triggers a full
    /// recomputation.
    pub async fn poll_once(&mut self) -> Result<Option<DraftUpdate>, FetchError> {
        let picks = self.source.fetch_picks(&self.draft_id).await?;

        if self.last_observed == Some(picks.len()) {
            return Ok(None);
        }

        let state = DraftState::compute(
            &self.draft_id,
            &picks,
            &self.catalog,
            self.config.teams_per_league,
        );
        let available = state.available_players(&self.catalog);
        let recommendation = RecommendationPayload::from(recommend(&available, state.round, None));

        debug!(
            draft_id = %self.draft_id,
            previous = ?self.last_observed,
            pick_count = state.pick_count,
            available = available.len(),
            "pick count changed"
        );

        let update = DraftUpdate {
            draft_id: self.draft_id.clone(),
            generation: self.generation,
            state: state.summary(),
            recommendation,
        };
        self.last_observed = Some(state.pick_count);
        self.state = Some(state);
        Ok(Some(update))
    }

    /// Delay before the next tick: the poll interval while healthy, doubled
    /// per consecutive failure and capped at `max_backoff`.
    pub fn next_delay(&self) -> Duration {
        let interval = self.config.poll_interval;
        if self.consecutive_failures == 0 {
            return interval;
        }
        let factor = 1u32 << self.consecutive_failures.min(16);
        interval
            .saturating_mul(factor)
            .min(self.config.max_backoff)
            .max(interval)
    }

    /// Poll until `stop` fires (or its sender is dropped) or the update
    /// channel closes.
    pub async fn run(mut self, updates: mpsc::Sender<DraftUpdate>, mut stop: oneshot::Receiver<()>) {
        info!(draft_id = %self.draft_id, generation = self.generation, "tracker started");

        loop {
            let outcome = tokio::select! {
                biased;
                _ = &mut stop => break,
                outcome = self.poll_once() => outcome,
            };

            match outcome {
                Ok(Some(update)) => {
                    self.consecutive_failures = 0;
                    info!(
                        draft_id = %self.draft_id,
                        pick_count = update.state.pick_count,
                        round = update.state.round,
                        "draft changed"
                    );
                    if updates.send(update).await.is_err() {
                        debug!(draft_id = %self.draft_id, "update channel closed");
                        break;
                    }
                }
                Ok(None) => {
                    self.consecutive_failures = 0;
                }
                Err(e) => {
                    self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                    warn!(
                        draft_id = %self.draft_id,
                        failures = self.consecutive_failures,
                        "pick fetch failed: {e}"
                    );
                }
            }

            let delay = self.next_delay();
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(draft_id = %self.draft_id, generation = self.generation, "tracker stopped");
    }
}

// ---------------------------------------------------------------------------
// TrackerHandle
// ---------------------------------------------------------------------------

/// Owner-side handle for a running tracker task. Dropping the handle aborts
/// the task, so a tracker never outlives its owner.
pub struct TrackerHandle {
    generation: u64,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TrackerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop and abort its task, cancelling any pending timer or
    /// in-flight fetch.
    pub fn stop(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        self.task.abort();
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn `tracker` on the runtime, forwarding its updates to `updates`.
pub fn spawn(tracker: DraftTracker, updates: mpsc::Sender<DraftUpdate>) -> TrackerHandle {
    let (stop_tx, stop_rx) = oneshot::channel();
    let generation = tracker.generation;
    let task = tokio::spawn(tracker.run(updates, stop_rx));
    TrackerHandle {
        generation,
        stop: Some(stop_tx),
        task,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{fixture_catalog, picks, ScriptedSource};

    fn config() -> TrackerConfig {
        TrackerConfig {
            poll_interval: Duration::from_millis(2500),
            max_backoff: Duration::from_secs(20),
            teams_per_league: 2,
        }
    }

    fn tracker(source: Arc<ScriptedSource>) -> DraftTracker {
        DraftTracker::new("d1", 7, source, Arc::new(fixture_catalog()), config())
    }

    #[tokio::test]
    async fn first_poll_always_emits() {
        let source = Arc::new(ScriptedSource::constant(vec![]));
        let mut t = tracker(source);

        let update = t.poll_once().await.unwrap().expect("first poll emits");
        assert_eq!(update.draft_id, "d1");
        assert_eq!(update.generation, 7);
        assert_eq!(update.state, StateSummary { pick_count: 0, round: 1 });
        match update.recommendation {
            RecommendationPayload::Ready(reco) => assert_eq!(reco.primary.id, "rb1"),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unchanged_count_emits_nothing() {
        let source = Arc::new(ScriptedSource::constant(picks(&["rb1", "wr1"])));
        let mut t = tracker(source.clone());

        assert!(t.poll_once().await.unwrap().is_some());
        assert!(t.poll_once().await.unwrap().is_none());
        assert!(t.poll_once().await.unwrap().is_none());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn new_pick_recomputes_state_and_recommendation() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(picks(&["rb1"])),
            Ok(picks(&["rb1", "rb2", "wr1"])),
        ]));
        let mut t = tracker(source);

        let first = t.poll_once().await.unwrap().unwrap();
        assert_eq!(first.state, StateSummary { pick_count: 1, round: 1 });

        let second = t.poll_once().await.unwrap().unwrap();
        assert_eq!(second.state, StateSummary { pick_count: 3, round: 2 });
        match second.recommendation {
            RecommendationPayload::Ready(reco) => {
                assert_eq!(reco.primary.id, "wr2");
                let backups: Vec<&str> = reco.backups.iter().map(|p| p.id.as_str()).collect();
                assert_eq!(backups, vec!["qb1", "k1"]);
            }
            other => panic!("expected Ready, got {other:?}"),
        }

        let state = t.state().unwrap();
        assert!(!state.available_player_ids.contains("rb1"));
        assert!(!state.available_player_ids.contains("wr1"));
        assert_eq!(state.available_player_ids.len(), 3);
    }

    #[tokio::test]
    async fn count_decrease_triggers_recompute() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(picks(&["rb1", "rb2"])),
            Ok(picks(&["rb1"])),
        ]));
        let mut t = tracker(source);

        t.poll_once().await.unwrap().unwrap();
        let retracted = t.poll_once().await.unwrap().expect("decrease is a change");
        assert_eq!(retracted.state.pick_count, 1);
        assert!(t.state().unwrap().available_player_ids.contains("rb2"));
    }

    #[tokio::test]
    async fn fetch_error_leaves_state_untouched() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(picks(&["rb1"])),
            Err(FetchError::Status {
                status: 502,
                url: "http://upstream/draft/d1/picks".into(),
            }),
            Ok(picks(&["rb1"])),
        ]));
        let mut t = tracker(source);

        t.poll_once().await.unwrap().unwrap();
        assert!(t.poll_once().await.is_err());
        assert_eq!(t.state().unwrap().pick_count, 1);
        // Same count as before the failure: nothing new to say.
        assert!(t.poll_once().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exhausted_pool_yields_no_candidates() {
        let all = ["rb1", "rb2", "wr1", "wr2", "qb1", "k1"];
        let source = Arc::new(ScriptedSource::constant(picks(&all)));
        let mut t = tracker(source);

        let update = t.poll_once().await.unwrap().unwrap();
        assert!(matches!(
            update.recommendation,
            RecommendationPayload::NoCandidates { .. }
        ));
        assert_eq!(update.state, StateSummary { pick_count: 6, round: 4 });
    }

    #[test]
    fn next_delay_backs_off_and_caps() {
        let source = Arc::new(ScriptedSource::constant(vec![]));
        let mut t = tracker(source);

        assert_eq!(t.next_delay(), Duration::from_millis(2500));
        t.consecutive_failures = 1;
        assert_eq!(t.next_delay(), Duration::from_secs(5));
        t.consecutive_failures = 2;
        assert_eq!(t.next_delay(), Duration::from_secs(10));
        t.consecutive_failures = 3;
        assert_eq!(t.next_delay(), Duration::from_secs(20));
        t.consecutive_failures = 40;
        assert_eq!(t.next_delay(), Duration::from_secs(20));
    }

    #[test]
    fn update_messages_are_state_first() {
        let update = DraftUpdate {
            draft_id: "d1".into(),
            generation: 1,
            state: StateSummary { pick_count: 0, round: 1 },
            recommendation: RecommendationPayload::NoCandidates {
                explanation: "none".into(),
            },
        };
        let [first, second] = update.into_messages();
        assert_eq!(first.event_name(), "draft:server_state");
        assert_eq!(second.event_name(), "draft:recommendation");
    }

    #[tokio::test(start_paused = true)]
    async fn loop_emits_once_for_repeated_counts() {
        let source = Arc::new(ScriptedSource::constant(picks(&["rb1", "wr1"])));
        let (tx, mut rx) = mpsc::channel(16);
        let handle = spawn(tracker(source.clone()), tx);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.state.pick_count, 2);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(source.calls() >= 4, "polling continues: {}", source.calls());
        assert!(rx.try_recv().is_err(), "no redundant broadcast");

        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_fetch_failures() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(FetchError::Transport("connection refused".into())),
            Err(FetchError::Status {
                status: 500,
                url: "http://upstream".into(),
            }),
            Ok(picks(&["rb1"])),
        ]));
        let (tx, mut rx) = mpsc::channel(16);
        let handle = spawn(tracker(source.clone()), tx);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.state.pick_count, 1);
        assert_eq!(source.calls(), 3);

        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_fetch_in_flight() {
        let source = Arc::new(
            ScriptedSource::constant(picks(&["rb1"])).with_latency(Duration::from_secs(10)),
        );
        let (tx, _rx) = mpsc::channel(16);
        let handle = spawn(tracker(source.clone()), tx);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(source.calls() >= 2);
        assert_eq!(source.max_in_flight(), 1);

        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_polling() {
        let source = Arc::new(ScriptedSource::constant(vec![]));
        let (tx, _rx) = mpsc::channel(16);
        let handle = spawn(tracker(source.clone()), tx);

        tokio::time::sleep(Duration::from_secs(6)).await;
        let before = source.calls();
        assert!(before >= 2);

        handle.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_polling() {
        let source = Arc::new(ScriptedSource::constant(vec![]));
        let (tx, _rx) = mpsc::channel(16);
        let handle = spawn(tracker(source.clone()), tx);

        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(handle);
        let before = source.calls();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_update_channel_ends_loop() {
        let source = Arc::new(ScriptedSource::constant(vec![]));
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let handle = spawn(tracker(source), tx);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_finished());
    }
}
