//! Connection manager: owns the transport channel and its lifecycle.
//!
//! A [`ChatClient`] handle drives a single-owner session task which
//! multiplexes commands, inbound frames, and the reconnect timer. The raw
//! channel handle never leaves the task.

mod client;
mod task;
mod transport;

pub use client::{ChatClient, ConnectionState};
pub use transport::{LinkEvent, Transport, TransportLink, WsTransport};
