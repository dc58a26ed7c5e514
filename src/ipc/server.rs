//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of
//! assistant events to subscribed clients. Actions run on a blocking
//! worker one at a time, against a snapshot of the input state taken
//! when the request arrived.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::actions;
use crate::config::{is_supported_language, SUPPORTED_LANGUAGES};
use crate::dispatch::{Dispatcher, InputSnapshot, Outcome};
use crate::events::AssistantEvent;
use crate::lifecycle::ShutdownSignal;
use crate::state::ModeState;

use super::protocol::{AssistantStatus, Menu, MenuEntry, Notification, Request, Response};

/// Largest accepted message body
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

/// State shared by every client handler
struct Shared {
    state: RwLock<ServerState>,
    dispatcher: Arc<Mutex<Dispatcher>>,
    events: broadcast::Sender<AssistantEvent>,
    exit: ShutdownSignal,
}

/// Front-end input state
struct ServerState {
    status: AssistantStatus,
    start_time: std::time::Instant,
    modes: ModeState,
    /// Text field contents
    text: String,
    language: String,
}

impl ServerState {
    fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            mode: self.modes.mode(),
            text: self.text.clone(),
            language: self.language.clone(),
        }
    }
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        dispatcher: Dispatcher,
        events: broadcast::Sender<AssistantEvent>,
        exit: ShutdownSignal,
        language: &str,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path)
            .context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = ServerState {
            status: AssistantStatus {
                language: language.to_string(),
                ..AssistantStatus::default()
            },
            start_time: std::time::Instant::now(),
            modes: ModeState::new(events.clone()),
            text: String::new(),
            language: language.to_string(),
        };

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                dispatcher: Arc::new(Mutex::new(dispatcher)),
                events,
                exit,
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref()
            .context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let shared = Arc::clone(&self.shared);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, shared) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
        let (reader, mut writer) = stream.into_split();

        // Frames are read on their own task so a pending read is never
        // cancelled halfway through by an outgoing notification
        let (request_tx, mut request_rx) = mpsc::channel(8);
        let read_task = tokio::spawn(Self::read_requests(reader, request_tx));

        // Dispatch responses come back here so events keep flowing
        // while an action runs
        let (response_tx, mut response_rx) = mpsc::channel::<Response>(8);

        let mut events: Option<broadcast::Receiver<AssistantEvent>> = None;

        let result = loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let Some(request) = request else {
                        debug!("client disconnected");
                        break Ok(());
                    };

                    let response = match request {
                        Ok(request) if request.is_dispatch() => {
                            debug!(?request, "received dispatch request");
                            let shared = Arc::clone(&shared);
                            let response_tx = response_tx.clone();
                            tokio::spawn(async move {
                                let (response, _) = Self::process_request(request, &shared).await;
                                let _ = response_tx.send(response).await;
                            });
                            continue;
                        }
                        Ok(request) => {
                            debug!(?request, "received request");
                            let (response, subscribe) = Self::process_request(request, &shared).await;
                            if subscribe && events.is_none() {
                                events = Some(shared.events.subscribe());
                                debug!("client subscribed to notifications");
                            }
                            response
                        }
                        Err(message) => Response::Error {
                            code: "bad_request".to_string(),
                            message,
                        },
                    };

                    if let Err(e) = Self::send_message(&mut writer, &response).await {
                        break Err(e);
                    }
                }

                Some(response) = response_rx.recv() => {
                    if let Err(e) = Self::send_message(&mut writer, &response).await {
                        break Err(e);
                    }
                }

                event = next_event(&mut events) => {
                    match event {
                        Ok(event) => {
                            let note = Notification::Event { event };
                            if let Err(e) = Self::send_message(&mut writer, &note).await {
                                break Err(e);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "event subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            events = None;
                        }
                    }
                }
            }
        };

        read_task.abort();
        result
    }

    /// Read length-prefixed requests until the client goes away
    ///
    /// Undecodable bodies are forwarded as `Err` so the client gets an
    /// error response instead of a dropped connection.
    async fn read_requests(
        mut reader: OwnedReadHalf,
        request_tx: mpsc::Sender<std::result::Result<Request, String>>,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_MESSAGE_LEN {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            reader.read_exact(&mut msg_buf).await?;

            let request = serde_json::from_slice::<Request>(&msg_buf).map_err(|e| {
                warn!(%e, "failed to parse request");
                e.to_string()
            });

            if request_tx.send(request).await.is_err() {
                return Ok(());
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(writer: &mut OwnedWriteHalf, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, shared: &Arc<Shared>) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let mut state = shared.state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                state.status.mode = state.modes.mode();
                state.status.mode_label = state.modes.mode().label().to_string();
                state.status.language = state.language.clone();
                (Response::Status(state.status.clone()), false)
            }

            Request::GetMenu => {
                let state = shared.state.read().await;
                let menu = Menu {
                    actions: actions::registry().iter().map(MenuEntry::from).collect(),
                    languages: SUPPORTED_LANGUAGES.iter().map(|l| l.to_string()).collect(),
                    mode_label: state.modes.mode().label().to_string(),
                };
                (Response::Menu(menu), false)
            }

            Request::Subscribe => (Response::Subscribed, true),

            Request::ToggleMode => {
                let mode = shared.state.write().await.modes.toggle();
                (
                    Response::ModeChange {
                        mode,
                        label: mode.label().to_string(),
                    },
                    false,
                )
            }

            Request::SetMode { mode } => {
                let mode = shared.state.write().await.modes.select(mode);
                (
                    Response::ModeChange {
                        mode,
                        label: mode.label().to_string(),
                    },
                    false,
                )
            }

            Request::SetText { text } => {
                shared.state.write().await.text = text;
                (Response::Ack, false)
            }

            Request::SetLanguage { language } => {
                if !is_supported_language(&language) {
                    return (
                        Response::Error {
                            code: "unsupported_language".to_string(),
                            message: format!("language {:?} is not offered", language),
                        },
                        false,
                    );
                }

                let mut state = shared.state.write().await;
                if state.language != language {
                    info!(from = %state.language, to = %language, "language changed");
                    state.language = language.clone();
                    let _ = shared.events.send(AssistantEvent::LanguageChanged { language });
                }
                (Response::Ack, false)
            }

            Request::Trigger { action } => {
                let descriptor = actions::lookup(action);
                let snapshot = shared.state.read().await.snapshot();
                let response = Self::run_dispatch(shared, move |dispatcher| {
                    dispatcher.dispatch(descriptor, &snapshot)
                })
                .await;
                (response, false)
            }

            Request::SendEmail { to, subject, body } => {
                let response = Self::run_dispatch(shared, move |dispatcher| {
                    dispatcher.send_email(&to, &subject, &body)
                })
                .await;
                (response, false)
            }

            Request::Power { op } => {
                let response =
                    Self::run_dispatch(shared, move |dispatcher| dispatcher.power(op)).await;
                (response, false)
            }
        }
    }

    /// Run a dispatcher job on the blocking pool, one job at a time
    async fn run_dispatch<F>(shared: &Arc<Shared>, job: F) -> Response
    where
        F: FnOnce(&mut Dispatcher) -> Outcome + Send + 'static,
    {
        let dispatcher = Arc::clone(&shared.dispatcher);
        let joined = tokio::task::spawn_blocking(move || {
            let mut dispatcher = dispatcher.blocking_lock();
            job(&mut dispatcher)
        })
        .await;

        match joined {
            Ok(outcome) => {
                if outcome == Outcome::Exiting {
                    info!("exit requested by user");
                    shared.exit.trigger();
                }
                Response::Dispatched { outcome }
            }
            Err(e) => {
                error!(?e, "dispatch task failed");
                Response::Error {
                    code: "dispatch_failed".to_string(),
                    message: e.to_string(),
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Next event for a subscribed client; never resolves otherwise
async fn next_event(
    events: &mut Option<broadcast::Receiver<AssistantEvent>>,
) -> std::result::Result<AssistantEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
