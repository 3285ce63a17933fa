use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Channel-level faults. These feed the reconnect policy and never
/// escape the session task as panics.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("connect timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// `send` was called while the connection is not open.
    #[error("not connected to the agent backend")]
    NotConnected,

    /// A previous send is still awaiting its reply.
    #[error("a reply is still pending")]
    ReplyPending,

    /// All reconnect attempts were used up; the session is terminal.
    #[error("reconnect attempts exhausted")]
    ReconnectExhausted,

    /// The session task is gone (client outlived its session).
    #[error("session closed")]
    SessionClosed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
