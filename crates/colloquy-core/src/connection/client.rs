//! Public handle for driving a chat session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use colloquy_common::{ChatError, Notice};

use crate::config::ChatConfig;
use crate::conversation::Message;
use crate::protocol::ToolDescriptor;
use crate::registry::group_by_category;

use super::task::{Command, SessionTask};
use super::transport::{Transport, WsTransport};

/// Lifecycle of the transport channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    /// Reconnect attempts exhausted; never left automatically.
    Failed,
}

/// Handle for interacting with the session task.
///
/// All methods are non-blocking and send commands to the background task;
/// the raw channel handle never leaves the task, so a stale link from a
/// superseded attempt can never mutate current state.
#[derive(Clone)]
pub struct ChatClient {
    command_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    messages_rx: watch::Receiver<Vec<Message>>,
    tools_rx: watch::Receiver<Vec<ToolDescriptor>>,
}

impl ChatClient {
    /// Create a client over the WebSocket transport and spawn its session
    /// task. Returns `(client, notice_receiver)`. No channel is opened until
    /// [`connect`](Self::connect) is called.
    pub fn new(config: ChatConfig) -> (Self, mpsc::Receiver<Notice>) {
        let timeout = Duration::from_secs(config.endpoint.open_timeout_secs);
        Self::with_transport(config, Arc::new(WsTransport::new(timeout)))
    }

    /// Create a client over a custom transport (test harnesses).
    pub fn with_transport(
        config: ChatConfig,
        transport: Arc<dyn Transport>,
    ) -> (Self, mpsc::Receiver<Notice>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (notice_tx, notice_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        let task = SessionTask::new(config, transport, state_tx, notice_tx);
        let messages_rx = task.subscribe_messages();
        let tools_rx = task.subscribe_tools();
        tokio::spawn(task.run(command_rx));

        let client = Self {
            command_tx,
            state_rx,
            messages_rx,
            tools_rx,
        };
        (client, notice_rx)
    }

    /// Ask the session to open the channel. No-op while an attempt is
    /// already in flight or the channel is open.
    pub async fn connect(&self) {
        let _ = self.command_tx.send(Command::Connect).await;
    }

    /// Submit user text. Fails with `NotConnected` when the channel is not
    /// open, `ReconnectExhausted` once the session has failed terminally,
    /// and `ReplyPending` while an earlier send still awaits its reply.
    /// Does not wait for the reply itself; that arrives later as a
    /// conversation update.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), ChatError> {
        match *self.state_rx.borrow() {
            ConnectionState::Open => {}
            ConnectionState::Failed => return Err(ChatError::ReconnectExhausted),
            _ => return Err(ChatError::NotConnected),
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Send {
                text: text.into(),
                ack: ack_tx,
            })
            .await
            .map_err(|_| ChatError::SessionClosed)?;
        ack_rx.await.map_err(|_| ChatError::SessionClosed)?
    }

    /// Close the channel and cancel any pending reconnect. Idempotent, and
    /// distinct from abnormal closure: nothing reconnects afterwards.
    pub async fn disconnect(&self) {
        let _ = self.command_tx.send(Command::Disconnect).await;
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Current conversation snapshot.
    pub fn messages(&self) -> Vec<Message> {
        self.messages_rx.borrow().clone()
    }

    pub fn subscribe_messages(&self) -> watch::Receiver<Vec<Message>> {
        self.messages_rx.clone()
    }

    /// Current deduplicated tool snapshot.
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools_rx.borrow().clone()
    }

    pub fn subscribe_tools(&self) -> watch::Receiver<Vec<ToolDescriptor>> {
        self.tools_rx.clone()
    }

    /// Tool snapshot grouped by category, for presentation.
    pub fn tools_by_category(&self) -> Vec<(String, Vec<ToolDescriptor>)> {
        group_by_category(&self.tools_rx.borrow())
    }
}
