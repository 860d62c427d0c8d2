//! Public handle to the connection task

use gateway_common::{ClientConfig, ReconnectConfig};
use gateway_core::{Credential, CredentialProvider, PresencePayload, PresenceStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::runner::{Command, Runner};
use crate::error::{GatewayError, GatewayResult};
use crate::events::{ClientEvent, ClientStatus};
use crate::session::SessionMachine;
use crate::transport::{Connector, GatewayEndpoint};

/// Queued requests from the handle
const COMMAND_BUFFER_SIZE: usize = 32;

/// How the client connects and retries
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub endpoint: GatewayEndpoint,
    /// Per-attempt limit on opening the transport
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
    /// Capacity of the event channel
    pub event_buffer: usize,
}

impl GatewayOptions {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_EVENT_BUFFER: usize = 256;

    #[must_use]
    pub fn new(endpoint: GatewayEndpoint) -> Self {
        Self {
            endpoint,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectConfig::default(),
            event_buffer: Self::DEFAULT_EVENT_BUFFER,
        }
    }

    pub fn from_config(config: &ClientConfig) -> GatewayResult<Self> {
        Ok(Self {
            endpoint: GatewayEndpoint::from_config(&config.endpoint)?,
            connect_timeout: config.endpoint.connect_timeout(),
            reconnect: config.reconnect.clone(),
            event_buffer: config.event_buffer,
        })
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    #[must_use]
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }
}

/// Handle to a running gateway session
///
/// Dropping the handle stops the task and closes the connection.
#[derive(Debug)]
pub struct GatewayClient {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ClientStatus>,
    task: JoinHandle<()>,
}

impl GatewayClient {
    /// Spawn the connection task on the current runtime
    ///
    /// Nothing connects until [`start`](Self::start) is called. Events arrive
    /// on the returned receiver; the task waits when it is full.
    pub fn spawn<C>(options: GatewayOptions, connector: C) -> (Self, mpsc::Receiver<ClientEvent>)
    where
        C: Connector + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let (event_tx, event_rx) = mpsc::channel(options.event_buffer.max(1));
        let (status_tx, status_rx) = watch::channel(ClientStatus::default());

        let compressed = options.endpoint.is_compressed();
        let machine = SessionMachine::new(options.endpoint, &options.reconnect);
        let runner = Runner::new(
            machine,
            Arc::new(connector),
            options.connect_timeout,
            compressed,
            command_rx,
            event_tx,
            status_tx,
        );

        let client = Self {
            commands: command_tx,
            status: status_rx,
            task: tokio::spawn(runner.run()),
        };
        (client, event_rx)
    }

    /// Connect and authenticate; does nothing if a session is already running
    pub async fn start(&self, credential: Credential) -> GatewayResult<()> {
        if !credential.is_usable() {
            return Err(GatewayError::MissingCredential);
        }
        self.send(Command::Start(credential)).await
    }

    /// Like [`start`](Self::start), asking the provider for the credential
    pub async fn start_with(&self, provider: &dyn CredentialProvider) -> GatewayResult<()> {
        let credential = provider
            .credential()
            .await
            .ok_or(GatewayError::MissingCredential)?;
        self.start(credential).await
    }

    /// Close the session with the given code; no automatic reconnect follows
    ///
    /// 1000 and 1001 end the session on the server. Other codes leave it
    /// resumable by a later `start`.
    pub async fn close(&self, code: u16) -> GatewayResult<()> {
        self.send(Command::Close(code)).await
    }

    /// Change the online status while the session is established
    pub async fn update_presence(&self, status: PresenceStatus) -> GatewayResult<()> {
        self.send(Command::UpdatePresence(PresencePayload::with_status(status)))
            .await
    }

    /// Latest published status
    #[must_use]
    pub fn status(&self) -> ClientStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ClientStatus> {
        self.status.clone()
    }

    /// Close the connection with 1000 and wait for the task to finish
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Gateway client task ended abnormally");
        }
    }

    async fn send(&self, command: Command) -> GatewayResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GatewayError::ClientGone)
    }
}
