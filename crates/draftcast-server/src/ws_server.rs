// WebSocket server for viewer connections.
//
// Each accepted connection becomes a registry viewer. Inbound text frames are
// parsed into `ClientMessage`s and turned into registry commands or platform
// lookups; everything sent back to the viewer goes through its registry
// outbox, drained by a dedicated writer task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Datelike;
use futures_util::stream::Stream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use draftcast_core::protocol::{ClientMessage, DraftsEvent, LeaguesEvent, ServerMessage};
use draftcast_core::registry::{RegistryHandle, ViewerId};
use draftcast_core::source::DraftDirectory;

/// Messages queued for a single viewer before new ones are dropped.
pub const OUTBOX_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Accept loop
// ---------------------------------------------------------------------------

/// Accept viewer connections on `listener` until the task is cancelled.
///
/// Every connection is served on its own task, so any number of viewers can
/// be attached at once.
pub async fn run(
    listener: TcpListener,
    registry: RegistryHandle,
    directory: Arc<dyn DraftDirectory>,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("Accepted TCP connection from {addr}");
        tokio::spawn(handle_connection(
            stream,
            addr,
            registry.clone(),
            Arc::clone(&directory),
        ));
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: RegistryHandle,
    directory: Arc<dyn DraftDirectory>,
) {
    let addr = addr.to_string();
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };

    let viewer = registry.next_viewer_id();
    let (outbox, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
    if !registry.connect(viewer, outbox.clone()).await {
        warn!(viewer, "registry is shut down, refusing {addr}");
        return;
    }
    info!(viewer, "viewer connected from {addr}");

    let (write, read) = ws_stream.split();
    let writer = tokio::spawn(write_outbox(write, outbox_rx, addr.clone()));

    let session = ViewerSession::new(viewer, registry.clone(), directory, outbox);
    let _ = process_client_stream(read, &session, &addr).await;

    registry.disconnect(viewer).await;
    // The writer finishes once the registry and the session have both
    // released their outbox senders.
    drop(session);
    let _ = writer.await;
    info!(viewer, "viewer {addr} disconnected");
}

/// Drain a viewer's outbox into its WebSocket sink as JSON text frames.
pub async fn write_outbox<Si>(mut sink: Si, mut outbox: mpsc::Receiver<ServerMessage>, addr: String)
where
    Si: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(message) = outbox.recv().await {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize {} for {addr}: {e}", message.event_name());
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            debug!("write to {addr} failed: {e}");
            break;
        }
    }
    let _ = sink.close().await;
}

// ---------------------------------------------------------------------------
// Per-viewer message handling
// ---------------------------------------------------------------------------

/// Registry side of one connected viewer.
pub struct ViewerSession {
    viewer: ViewerId,
    registry: RegistryHandle,
    directory: Arc<dyn DraftDirectory>,
    outbox: mpsc::Sender<ServerMessage>,
}

impl ViewerSession {
    pub fn new(
        viewer: ViewerId,
        registry: RegistryHandle,
        directory: Arc<dyn DraftDirectory>,
        outbox: mpsc::Sender<ServerMessage>,
    ) -> Self {
        ViewerSession {
            viewer,
            registry,
            directory,
            outbox,
        }
    }

    /// Handle one inbound text frame. Returns `Err(())` once the registry or
    /// the viewer's outbox is gone and the connection should be dropped.
    ///
    /// Platform lookups run on their own task and reply through the outbox,
    /// so a slow upstream never holds up the viewer's next frame.
    pub async fn handle_text(&self, text: &str) -> Result<(), ()> {
        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(viewer = self.viewer, "unparseable frame: {e}");
                return self
                    .reply(ServerMessage::error(format!("invalid message: {e}")))
                    .await;
            }
        };

        match message {
            ClientMessage::Join { draft_id } => {
                if draft_id.trim().is_empty() {
                    return self.reply(ServerMessage::error("draftId must not be empty")).await;
                }
                self.command(self.registry.subscribe(self.viewer, draft_id).await)
            }
            ClientMessage::Leave { draft_id } => {
                self.command(self.registry.unsubscribe(self.viewer, draft_id).await)
            }
            ClientMessage::Leagues { username, season } => {
                let season = season.unwrap_or_else(current_season);
                let viewer = self.viewer;
                let directory = Arc::clone(&self.directory);
                self.lookup(async move {
                    match directory.leagues_for_user(&username, &season).await {
                        Ok(leagues) => ServerMessage::Leagues(LeaguesEvent { leagues }),
                        Err(e) => {
                            warn!(viewer, username = %username, "league lookup failed: {e}");
                            ServerMessage::error(format!("league lookup failed: {e}"))
                        }
                    }
                })
            }
            ClientMessage::Drafts { league_id } => {
                let viewer = self.viewer;
                let directory = Arc::clone(&self.directory);
                self.lookup(async move {
                    match directory.drafts_for_league(&league_id).await {
                        Ok(drafts) => ServerMessage::Drafts(DraftsEvent { league_id, drafts }),
                        Err(e) => {
                            warn!(viewer, league_id = %league_id, "draft lookup failed: {e}");
                            ServerMessage::error(format!("draft lookup failed: {e}"))
                        }
                    }
                })
            }
        }
    }

    /// Run `lookup` on its own task and queue its reply for the viewer.
    fn lookup<F>(&self, lookup: F) -> Result<(), ()>
    where
        F: Future<Output = ServerMessage> + Send + 'static,
    {
        if self.outbox.is_closed() {
            return Err(());
        }
        let outbox = self.outbox.clone();
        let viewer = self.viewer;
        tokio::spawn(async move {
            let reply = lookup.await;
            if outbox.send(reply).await.is_err() {
                debug!(viewer, "viewer left before its lookup finished");
            }
        });
        Ok(())
    }

    fn command(&self, delivered: bool) -> Result<(), ()> {
        if delivered {
            Ok(())
        } else {
            Err(())
        }
    }

    async fn reply(&self, message: ServerMessage) -> Result<(), ()> {
        self.outbox.send(message).await.map_err(|_| ())
    }
}

/// The season assumed when a lookup omits one.
pub fn current_season() -> String {
    chrono::Local::now().year().to_string()
}

/// Process raw WebSocket [`Message`] items from any [`Stream`], handing text
/// payloads to `session`. Close frames, socket errors and end of stream all
/// end processing; binary and ping/pong frames are ignored.
pub async fn process_client_stream<St>(
    mut stream: St,
    session: &ViewerSession,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => session.handle_text(text.as_str()).await?,
            Ok(Message::Close(_)) => {
                debug!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {}
        }
    }
    Ok(())
}
