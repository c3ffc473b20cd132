// Session registry and broadcaster.
//
// A single actor task owns every room (draft id → subscribers + tracker) and
// every viewer outbox. Viewer connections talk to it through a cloneable
// `RegistryHandle`; trackers feed it through a dedicated update channel.
// Because only the actor touches the maps, no lock guards them.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::protocol::{MembershipEvent, ServerMessage};
use crate::source::PickSource;
use crate::tracker::{self, DraftTracker, DraftUpdate, TrackerConfig, TrackerHandle};

pub type ViewerId = u64;

/// Drafts a single viewer may follow at once. Each distinct draft can cost a
/// tracker polling upstream, so one connection can't fan out without bound.
pub const MAX_DRAFTS_PER_VIEWER: usize = 8;

const COMMAND_CHANNEL_CAPACITY: usize = 256;
const UPDATE_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RegistryCommand {
    /// Register a viewer connection and the outbox its messages go to.
    Connect {
        viewer: ViewerId,
        outbox: mpsc::Sender<ServerMessage>,
    },
    Subscribe {
        viewer: ViewerId,
        draft_id: String,
    },
    Unsubscribe {
        viewer: ViewerId,
        draft_id: String,
    },
    /// Drop the viewer and every subscription it holds.
    Disconnect { viewer: ViewerId },
}

// ---------------------------------------------------------------------------
// Registry state
// ---------------------------------------------------------------------------

struct Room {
    subscribers: BTreeSet<ViewerId>,
    tracker: Option<TrackerHandle>,
}

struct ViewerEntry {
    outbox: mpsc::Sender<ServerMessage>,
    drafts: HashSet<String>,
}

pub struct Registry {
    rooms: HashMap<String, Room>,
    viewers: HashMap<ViewerId, ViewerEntry>,
    catalog: Arc<Catalog>,
    source: Arc<dyn PickSource>,
    config: TrackerConfig,
    updates_tx: mpsc::Sender<DraftUpdate>,
    next_generation: u64,
}

impl Registry {
    pub fn new(
        catalog: Arc<Catalog>,
        source: Arc<dyn PickSource>,
        config: TrackerConfig,
        updates_tx: mpsc::Sender<DraftUpdate>,
    ) -> Self {
        Registry {
            rooms: HashMap::new(),
            viewers: HashMap::new(),
            catalog,
            source,
            config,
            updates_tx,
            next_generation: 0,
        }
    }

    pub fn handle_command(&mut self, command: RegistryCommand) {
        match command {
            RegistryCommand::Connect { viewer, outbox } => self.connect(viewer, outbox),
            RegistryCommand::Subscribe { viewer, draft_id } => self.subscribe(viewer, &draft_id),
            RegistryCommand::Unsubscribe { viewer, draft_id } => {
                self.unsubscribe(viewer, &draft_id)
            }
            RegistryCommand::Disconnect { viewer } => self.disconnect(viewer),
        }
    }

    pub fn connect(&mut self, viewer: ViewerId, outbox: mpsc::Sender<ServerMessage>) {
        debug!(viewer, "viewer connected");
        self.viewers.insert(
            viewer,
            ViewerEntry {
                outbox,
                drafts: HashSet::new(),
            },
        );
    }

    /// Attach `viewer` to `draft_id`, starting the draft's tracker if this is
    /// the first subscriber. The viewer only sees events from now on.
    ///
    /// A viewer already following [`MAX_DRAFTS_PER_VIEWER`] drafts gets an
    /// error instead, and no tracker is started.
    pub fn subscribe(&mut self, viewer: ViewerId, draft_id: &str) {
        let Some(entry) = self.viewers.get_mut(&viewer) else {
            warn!(viewer, draft_id, "subscribe from unknown viewer ignored");
            return;
        };
        if !entry.drafts.contains(draft_id) && entry.drafts.len() >= MAX_DRAFTS_PER_VIEWER {
            warn!(viewer, draft_id, "subscription limit reached");
            self.send_to(
                viewer,
                ServerMessage::error(format!(
                    "cannot follow more than {MAX_DRAFTS_PER_VIEWER} drafts at once"
                )),
            );
            return;
        }
        entry.drafts.insert(draft_id.to_string());

        let room = self
            .rooms
            .entry(draft_id.to_string())
            .or_insert_with(|| Room {
                subscribers: BTreeSet::new(),
                tracker: None,
            });
        room.subscribers.insert(viewer);

        if room.tracker.is_none() {
            self.next_generation += 1;
            let tracker = DraftTracker::new(
                draft_id,
                self.next_generation,
                Arc::clone(&self.source),
                Arc::clone(&self.catalog),
                self.config,
            );
            room.tracker = Some(tracker::spawn(tracker, self.updates_tx.clone()));
            info!(draft_id, generation = self.next_generation, "draft became active");
        }
        info!(viewer, draft_id, subscribers = room.subscribers.len(), "viewer joined draft");

        self.send_to(
            viewer,
            ServerMessage::Joined(MembershipEvent {
                draft_id: draft_id.to_string(),
            }),
        );
    }

    pub fn unsubscribe(&mut self, viewer: ViewerId, draft_id: &str) {
        let was_member = self
            .viewers
            .get_mut(&viewer)
            .is_some_and(|entry| entry.drafts.remove(draft_id));
        self.leave_room(viewer, draft_id);
        if was_member {
            self.send_to(
                viewer,
                ServerMessage::Left(MembershipEvent {
                    draft_id: draft_id.to_string(),
                }),
            );
        }
    }

    pub fn disconnect(&mut self, viewer: ViewerId) {
        let Some(entry) = self.viewers.remove(&viewer) else {
            return;
        };
        debug!(viewer, drafts = entry.drafts.len(), "viewer disconnected");
        for draft_id in entry.drafts {
            self.leave_room(viewer, &draft_id);
        }
    }

    /// Remove `viewer` from a room; the last one out stops the tracker.
    fn leave_room(&mut self, viewer: ViewerId, draft_id: &str) {
        let Some(room) = self.rooms.get_mut(draft_id) else {
            return;
        };
        room.subscribers.remove(&viewer);
        if !room.subscribers.is_empty() {
            return;
        }
        if let Some(room) = self.rooms.remove(draft_id) {
            if let Some(handle) = room.tracker {
                handle.stop();
            }
            info!(draft_id, "last viewer left, draft idle");
        }
    }

    fn send_to(&mut self, viewer: ViewerId, message: ServerMessage) {
        let Some(entry) = self.viewers.get(&viewer) else {
            return;
        };
        if let Err(TrySendError::Closed(_)) = entry.outbox.try_send(message) {
            self.disconnect(viewer);
        }
    }

    /// Deliver `message` to the current subscribers of `draft_id`. Returns
    /// the number of viewers it was queued for.
    pub fn broadcast(&mut self, draft_id: &str, message: &ServerMessage) -> usize {
        let Some(room) = self.rooms.get(draft_id) else {
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for viewer in &room.subscribers {
            let Some(entry) = self.viewers.get(viewer) else {
                continue;
            };
            match entry.outbox.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(viewer, draft_id, event = message.event_name(), "viewer outbox full, dropping message");
                }
                Err(TrySendError::Closed(_)) => closed.push(*viewer),
            }
        }

        for viewer in closed {
            self.disconnect(viewer);
        }
        delivered
    }

    /// Broadcast a tracker update, state summary first. Updates from a
    /// tracker generation that no longer owns the room are discarded.
    pub fn publish(&mut self, update: DraftUpdate) {
        let current = self.tracker_generation(&update.draft_id);
        if current != Some(update.generation) {
            debug!(
                draft_id = %update.draft_id,
                generation = update.generation,
                current = ?current,
                "discarding stale tracker update"
            );
            return;
        }
        let draft_id = update.draft_id.clone();
        for message in update.into_messages() {
            self.broadcast(&draft_id, &message);
        }
    }

    pub fn subscriber_count(&self, draft_id: &str) -> usize {
        self.rooms
            .get(draft_id)
            .map_or(0, |room| room.subscribers.len())
    }

    pub fn is_tracking(&self, draft_id: &str) -> bool {
        self.rooms
            .get(draft_id)
            .is_some_and(|room| room.tracker.is_some())
    }

    pub fn tracker_generation(&self, draft_id: &str) -> Option<u64> {
        self.rooms
            .get(draft_id)
            .and_then(|room| room.tracker.as_ref())
            .map(TrackerHandle::generation)
    }

    /// Stop every tracker and forget all viewers.
    pub fn shutdown(&mut self) {
        for (draft_id, room) in self.rooms.drain() {
            if let Some(handle) = room.tracker {
                debug!(draft_id = %draft_id, "stopping tracker");
                handle.stop();
            }
        }
        self.viewers.clear();
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Cloneable front door to the registry actor.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryCommand>,
    next_viewer: Arc<AtomicU64>,
}

impl RegistryHandle {
    pub fn new(tx: mpsc::Sender<RegistryCommand>) -> Self {
        RegistryHandle {
            tx,
            next_viewer: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate a fresh viewer id for a new connection.
    pub fn next_viewer_id(&self) -> ViewerId {
        self.next_viewer.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a command. Returns `false` once the actor has shut down.
    pub async fn send(&self, command: RegistryCommand) -> bool {
        self.tx.send(command).await.is_ok()
    }

    pub async fn connect(&self, viewer: ViewerId, outbox: mpsc::Sender<ServerMessage>) -> bool {
        self.send(RegistryCommand::Connect { viewer, outbox }).await
    }

    pub async fn subscribe(&self, viewer: ViewerId, draft_id: impl Into<String>) -> bool {
        self.send(RegistryCommand::Subscribe {
            viewer,
            draft_id: draft_id.into(),
        })
        .await
    }

    pub async fn unsubscribe(&self, viewer: ViewerId, draft_id: impl Into<String>) -> bool {
        self.send(RegistryCommand::Unsubscribe {
            viewer,
            draft_id: draft_id.into(),
        })
        .await
    }

    pub async fn disconnect(&self, viewer: ViewerId) -> bool {
        self.send(RegistryCommand::Disconnect { viewer }).await
    }
}

/// Run the registry actor until every `RegistryHandle` is dropped.
///
/// Listens on two channels using `tokio::select!`:
/// 1. Viewer commands (connect / subscribe / unsubscribe / disconnect)
/// 2. Tracker updates to broadcast
pub async fn run(
    mut registry: Registry,
    mut cmd_rx: mpsc::Receiver<RegistryCommand>,
    mut updates_rx: mpsc::Receiver<DraftUpdate>,
) {
    info!("registry started");
    loop {
        tokio::select! {
            command = cmd_rx.recv() => match command {
                Some(command) => registry.handle_command(command),
                None => {
                    info!("command channel closed, shutting down registry");
                    break;
                }
            },
            Some(update) = updates_rx.recv() => registry.publish(update),
        }
    }
    registry.shutdown();
    info!("registry stopped");
}

/// Build a registry over `catalog` and `source` and spawn its actor task.
pub fn spawn(
    catalog: Arc<Catalog>,
    source: Arc<dyn PickSource>,
    config: TrackerConfig,
) -> (RegistryHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (updates_tx, updates_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
    let registry = Registry::new(catalog, source, config, updates_tx);
    let task = tokio::spawn(run(registry, cmd_rx, updates_rx));
    (RegistryHandle::new(cmd_tx), task)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
