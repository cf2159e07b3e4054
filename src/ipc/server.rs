//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of
//! service events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::events::ServiceEvent;
use crate::service::{ScanningService, ServiceState};

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Largest accepted message body
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

/// State shared with every client handler
struct Shared {
    service: Arc<Mutex<ScanningService>>,
    event_tx: broadcast::Sender<ServiceEvent>,
    start_time: Instant,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        service: Arc<Mutex<ScanningService>>,
        event_tx: broadcast::Sender<ServiceEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            shared: Arc::new(Shared {
                service,
                event_tx,
                start_time: Instant::now(),
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

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
    ///
    /// Requests are decoded on a separate task so that pushed notifications
    /// can be interleaved with responses.
    async fn handle_client(stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (request_tx, mut request_rx) = mpsc::channel(8);

        let reader_task = tokio::spawn(async move {
            if let Err(e) = Self::read_requests(&mut reader, request_tx).await {
                debug!(?e, "request reader stopped");
            }
        });

        let mut events: Option<broadcast::Receiver<ServiceEvent>> = None;

        let result: Result<()> = async {
            loop {
                tokio::select! {
                    request = request_rx.recv() => {
                        let Some(request) = request else {
                            debug!("client disconnected");
                            return Ok(());
                        };

                        let response = match request {
                            Ok(request) => {
                                debug!(?request, "received request");
                                let (response, subscribe) =
                                    Self::process_request(request, &shared).await;
                                if subscribe && events.is_none() {
                                    events = Some(shared.event_tx.subscribe());
                                    debug!("client subscribed to notifications");
                                }
                                response
                            }
                            Err(e) => {
                                warn!(?e, "failed to parse request");
                                Response::Error {
                                    code: "bad_request".to_string(),
                                    message: e.to_string(),
                                }
                            }
                        };

                        Self::send_message(&mut writer, &response).await?;
                    }

                    event = Self::next_event(&mut events) => {
                        match event {
                            Ok(event) => {
                                Self::send_message(&mut writer, &Notification::ServiceEvent(event))
                                    .await?;
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "subscriber lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                events = None;
                            }
                        }
                    }
                }
            }
        }
        .await;

        reader_task.abort();
        result
    }

    /// Decode length-prefixed requests until EOF
    async fn read_requests<R>(
        reader: &mut R,
        request_tx: mpsc::Sender<Result<Request, serde_json::Error>>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
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

            if request_tx
                .send(serde_json::from_slice(&msg_buf))
                .await
                .is_err()
            {
                return Ok(());
            }
        }
    }

    /// Next event for a subscribed client; pending forever otherwise
    async fn next_event(
        events: &mut Option<broadcast::Receiver<ServiceEvent>>,
    ) -> Result<ServiceEvent, broadcast::error::RecvError> {
        match events {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
    where
        W: AsyncWrite + Unpin,
        T: serde::Serialize,
    {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, shared: &Shared) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let service = shared.service.lock().await;
                let running = service.running_flag().unwrap_or_else(|e| {
                    warn!(?e, "failed to read running flag");
                    false
                });
                let status = DaemonStatus {
                    state: service.state(),
                    running,
                    muted: service.is_muted().ok(),
                    uptime_secs: shared.start_time.elapsed().as_secs(),
                    ..DaemonStatus::default()
                };
                (Response::Status(status), false)
            }

            Request::Command { command } => {
                let mut service = shared.service.lock().await;
                info!(%command, "command received via IPC");
                match service.handle_command(command) {
                    Ok(()) => (
                        Response::CommandAccepted {
                            running: service.state() == ServiceState::Running,
                        },
                        false,
                    ),
                    Err(e) => (
                        Response::Error {
                            code: e.code().to_string(),
                            message: e.to_string(),
                        },
                        false,
                    ),
                }
            }

            Request::Subscribe => (Response::Subscribed, true),
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
