//! Wire protocol between the chat client and the agent backend.
//!
//! Frames are UTF-8 JSON records tagged by a `type` field. Unknown frame
//! types and unparsable payloads are dropped with a logged warning; unknown
//! fields inside a recognized frame are ignored.

use serde::{Deserialize, Serialize};

/// Category label for tool names without a `.` separator.
pub const FALLBACK_CATEGORY: &str = "other";

/// A capability advertised by an upstream tool provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "serverName")]
    pub provider_name: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: ToolSchema,
}

impl ToolDescriptor {
    /// Category derived from the name prefix before the first `.`.
    /// Pure and recomputed on demand, never stored.
    pub fn category(&self) -> &str {
        match self.name.split_once('.') {
            Some((prefix, _)) if !prefix.is_empty() => prefix,
            _ => FALLBACK_CATEGORY,
        }
    }
}

/// Structural description of the arguments a tool accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type", default)]
    pub schema_type: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Outbound intents, encoded to wire form.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientIntent {
    /// Ask the backend to attach to a named upstream tool provider.
    #[serde(rename = "connect")]
    Connect { server: String },

    /// Submit user text plus the current tool snapshot so the backend can
    /// decide whether and which tool to invoke.
    #[serde(rename = "agent_message")]
    AgentMessage {
        content: String,
        tools: Vec<ToolDescriptor>,
    },
}

impl ClientIntent {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Raw inbound frame, before tool validation.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ServerFrame {
    #[serde(rename = "connection_established")]
    ConnectionEstablished,

    #[serde(rename = "tools")]
    Tools {
        #[serde(default)]
        tools: Vec<serde_json::Value>,
    },

    #[serde(rename = "response")]
    Response { content: String },

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(other)]
    Unknown,
}

/// Typed inbound events after decoding and validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Acknowledgement, purely informational.
    ConnectionEstablished,
    /// A provider's full current tool list, malformed elements filtered.
    Tools(Vec<ToolDescriptor>),
    /// A completed assistant turn.
    Response { content: String },
    /// A backend-reported failure; not a transport fault.
    Error { message: String },
}

/// Decode one inbound text frame.
///
/// Returns `None` for malformed or unrecognized frames after logging; a bad
/// frame never tears down the session.
pub fn decode_frame(text: &str) -> Option<ServerEvent> {
    let frame = match serde_json::from_str::<ServerFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed inbound frame");
            return None;
        }
    };

    match frame {
        ServerFrame::ConnectionEstablished => Some(ServerEvent::ConnectionEstablished),
        ServerFrame::Tools { tools } => Some(ServerEvent::Tools(filter_tools(tools))),
        ServerFrame::Response { content } => Some(ServerEvent::Response { content }),
        ServerFrame::Error { message } => Some(ServerEvent::Error { message }),
        ServerFrame::Unknown => {
            tracing::warn!("Dropping frame with unrecognized type");
            None
        }
    }
}

/// Keep only structurally well-formed descriptors. A malformed element is
/// skipped; it never rejects the rest of the batch.
fn filter_tools(raw: Vec<serde_json::Value>) -> Vec<ToolDescriptor> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<ToolDescriptor>(value) {
            Ok(tool) => Some(tool),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed tool descriptor");
                None
            }
        })
        .collect()
}
