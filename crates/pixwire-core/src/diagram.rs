// ── Diagram facade ──
//
// Lifecycle of one diagram session: initial load from the server, a
// command processor applying edits one at a time, and the controller
// feed bridged into the same command queue.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pixwire_api::transport::{TlsMode, TransportConfig};
use pixwire_api::{DiagramClient, FeedHandle, ReconnectConfig};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::{DiagramConfig, TlsVerification};
use crate::engine::SnapSettings;
use crate::error::CoreError;
use crate::store::{DataStore, DiagramSnapshot, Topology, controllers_from_feed};
use crate::stream::TopologyStream;

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ── Diagram ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable. Without a server configured the diagram runs
/// purely in memory; [`connect()`](Self::connect) still has to be
/// called to start the command processor.
#[derive(Clone)]
pub struct Diagram {
    inner: Arc<DiagramInner>,
}

struct DiagramInner {
    config: DiagramConfig,
    store: Arc<DataStore>,
    connection_state: watch::Sender<ConnectionState>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    client: Mutex<Option<DiagramClient>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Diagram {
    /// Create a diagram from configuration. Does NOT connect.
    pub fn new(config: DiagramConfig) -> Self {
        let store = Arc::new(DataStore::new(config.rules.clone()));
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Self {
            inner: Arc::new(DiagramInner {
                config,
                store,
                connection_state,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                client: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &DiagramConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Load the saved diagram (if a server is configured), start the
    /// command processor, and subscribe to the controller feed.
    ///
    /// A no-op while already connecting or connected.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let mut busy = false;
        self.inner.connection_state.send_if_modified(|state| {
            busy = matches!(state, ConnectionState::Connecting | ConnectionState::Connected);
            if !busy {
                *state = ConnectionState::Connecting;
            }
            !busy
        });
        if busy {
            debug!("connect ignored, diagram already connected");
            return Ok(());
        }

        let feed = match self.prepare().await {
            Ok(feed) => feed,
            Err(e) => {
                self.inner.connection_state.send_replace(ConnectionState::Failed);
                return Err(e);
            }
        };

        let mut handles = self.inner.task_handles.lock().await;

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let diagram = self.clone();
            handles.push(tokio::spawn(command_processor_task(diagram, rx)));
        }
        if let Some(feed) = feed {
            let diagram = self.clone();
            let cancel = self.inner.cancel.clone();
            handles.push(tokio::spawn(feed_task(diagram, feed, cancel)));
        }

        self.inner.connection_state.send_replace(ConnectionState::Connected);
        info!("diagram ready");
        Ok(())
    }

    async fn prepare(&self) -> Result<Option<FeedHandle>, CoreError> {
        self.load_from_server().await?;
        if self.inner.config.feed_enabled {
            self.open_feed().await
        } else {
            Ok(None)
        }
    }

    async fn load_from_server(&self) -> Result<(), CoreError> {
        let Some(url) = self.inner.config.server.clone() else {
            debug!("no server configured; starting empty");
            return Ok(());
        };
        let client = DiagramClient::new(url, &build_transport(&self.inner.config))?;

        match client.load_diagram().await? {
            Some(map) => {
                let snapshot = DiagramSnapshot::from_value(Value::Object(map))?;
                self.inner.store.load_snapshot(snapshot)?;
                info!(server = %client.base_url(), "loaded saved diagram");
            }
            None => {
                self.inner.store.clear();
                info!(server = %client.base_url(), "no saved diagram; starting empty");
            }
        }

        *self.inner.client.lock().await = Some(client);
        Ok(())
    }

    async fn open_feed(&self) -> Result<Option<FeedHandle>, CoreError> {
        let guard = self.inner.client.lock().await;
        let Some(client) = guard.as_ref() else {
            return Ok(None);
        };
        let http = build_transport(&self.inner.config).build_stream_client()?;
        let url = client.feed_url()?;
        info!(url = %url, "subscribing to controller feed");
        Ok(Some(FeedHandle::spawn(
            http,
            url,
            ReconnectConfig::default(),
            self.inner.cancel.child_token(),
        )))
    }

    /// Stop background tasks and reset the connection state.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        *self.inner.client.lock().await = None;
        self.inner.connection_state.send_replace(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Queue a command and wait for its result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.connection_state.borrow() != ConnectionState::Connected {
            return Err(CoreError::DiagramClosed);
        }
        self.submit(cmd).await
    }

    async fn submit(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let (tx, rx) = tokio::sync::oneshot::channel();

        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::DiagramClosed)?;

        rx.await.map_err(|_| CoreError::DiagramClosed)?
    }

    /// Write the current diagram back to the server.
    pub async fn save(&self) -> Result<(), CoreError> {
        let snapshot = self.inner.store.to_snapshot();
        let guard = self.inner.client.lock().await;
        let client = guard.as_ref().ok_or(CoreError::NoServer)?;
        client.save_diagram(&snapshot).await?;
        info!(server = %client.base_url(), "saved diagram");
        Ok(())
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// Connect without the feed, run `f`, disconnect.
    pub async fn oneshot<F, Fut, T>(config: DiagramConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Diagram) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.feed_enabled = false;

        let diagram = Diagram::new(cfg);
        diagram.connect().await?;
        let result = f(diagram.clone()).await;
        diagram.disconnect().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Topology> {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> TopologyStream {
        self.inner.store.subscribe()
    }
}

// ── Background tasks ─────────────────────────────────────────────

async fn command_processor_task(diagram: Diagram, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = diagram.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(
                    &diagram.inner.store,
                    &diagram.inner.config.snap,
                    envelope.command,
                );
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

/// Bridge feed updates into the command queue.
async fn feed_task(diagram: Diagram, mut feed: FeedHandle, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            msg = feed.recv() => {
                let Some(msg) = msg else { break };
                if !msg.is_update() {
                    debug!(kind = %msg.kind, "ignoring feed message");
                    continue;
                }
                let controllers = match controllers_from_feed(msg.controllers) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "ignoring malformed feed update");
                        continue;
                    }
                };
                match diagram.submit(Command::ApplyControllerFeed(controllers)).await {
                    Ok(_) => {}
                    Err(CoreError::DiagramClosed) => break,
                    Err(e) => warn!(error = %e, "feed update rejected"),
                }
            }
        }
    }
    feed.shutdown();
}

// ── Command routing ──────────────────────────────────────────────

/// Apply one command to the store.
fn route_command(
    store: &DataStore,
    snap: &SnapSettings,
    cmd: Command,
) -> Result<CommandResult, CoreError> {
    let result = match cmd {
        Command::Connect {
            from,
            to,
            wire_color,
        } => CommandResult::Connected(store.connect(from, to, wire_color)?),
        Command::SnapConnect {
            fixed,
            release,
            anchors,
            wire_color,
        } => CommandResult::Snapped(
            store.mutate(|t| t.snap_connect(&fixed, release, &anchors, snap, wire_color))?,
        ),
        Command::Disconnect { id } => CommandResult::Disconnected(store.disconnect(&id)?),
        Command::Recolor { id, wire_color } => {
            store.mutate(|t| t.recolor(&id, wire_color))?;
            CommandResult::Ok
        }
        Command::Rename { id, name } => {
            store.rename(&id, name)?;
            CommandResult::Ok
        }
        Command::SetPortCapacity {
            id,
            index,
            max_pixels,
        } => {
            store.set_port_capacity(&id, index, max_pixels)?;
            CommandResult::Ok
        }
        Command::AddController {
            name,
            controller_type,
            ports,
        } => CommandResult::Created(store.mutate(|t| {
            Ok(t.add_controller(name, controller_type, ports.into_iter().map(Into::into)))
        })?),
        Command::AddDifferential { name } => {
            CommandResult::Created(store.mutate(|t| Ok(t.add_differential(name)))?)
        }
        Command::AddReceiver { name, ports } => CommandResult::Created(
            store.mutate(|t| Ok(t.add_receiver(name, ports.into_iter().map(Into::into))))?,
        ),
        Command::Delete { id } => CommandResult::Deleted(store.mutate(|t| t.delete(&id))?),
        Command::AddModel {
            name,
            pixels,
            port_id,
        } => CommandResult::Created(store.mutate(|t| t.add_model(name, pixels, &port_id))?),
        Command::SetModelPixels { id, pixels } => {
            store.mutate(|t| t.set_model_pixels(&id, pixels))?;
            CommandResult::Ok
        }
        Command::ReassignModel { id, port_id } => {
            store.mutate(|t| t.reassign_model(&id, &port_id))?;
            CommandResult::Ok
        }
        Command::LoadSnapshot(snapshot) => {
            store.load_snapshot(*snapshot)?;
            CommandResult::Ok
        }
        Command::ApplyControllerFeed(controllers) => {
            CommandResult::Feed(store.apply_controller_feed(controllers)?)
        }
    };
    Ok(result)
}

// ── Helpers ──────────────────────────────────────────────────────

fn build_transport(config: &DiagramConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
