//! Session/connection core for the colloquy chat client.
//!
//! Maintains a persistent WebSocket channel to an agent/tool-orchestration
//! backend with:
//! - Bounded reconnect on non-clean closure (fixed delay, capped attempts)
//! - Tool negotiation with a configured set of upstream providers
//! - An append-only conversation log with placeholder resolution
//! - Watch-based snapshot subscriptions for presentation layers

pub mod config;
pub mod connection;
pub mod conversation;
pub mod generate;
pub mod protocol;
pub mod registry;

pub use config::{load_config, ChatConfig};
pub use connection::{ChatClient, ConnectionState, LinkEvent, Transport, TransportLink, WsTransport};
pub use conversation::{Conversation, Message, Role};
pub use generate::{GenerationError, OpenAiConfig, OpenAiGenerator, ReplyGenerator};
pub use protocol::{decode_frame, ClientIntent, ServerEvent, ToolDescriptor, ToolSchema};
pub use registry::ToolRegistry;
