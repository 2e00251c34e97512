//! Streaming research client.
//!
//! One query opens one socket to the research service. Every inbound frame
//! is decoded once at the transport boundary into a [`StreamEvent`] and then
//! folded into a [`StreamingState`] that renderers read from.
//!
//! ```text
//!   ResearchClient ──connect──▶ Transport (WebSocket)
//!        │                          │ raw JSON frames
//!        ▼                          ▼
//!   StreamSession ◀──decode_frame── protocol
//!        │ StreamEvent
//!        ▼
//!   StreamingState (+ FeedbackGate)
//! ```

mod client;
mod error;
mod feedback;
pub mod protocol;
mod state;
pub mod transport;

pub use client::{ResearchClient, StreamSession};
pub use error::{ErrorClass, StreamError};
pub use feedback::{FeedbackError, FeedbackGate, FeedbackReply, GateState};
pub use protocol::{
    decode_frame, Citation, FeedbackFrame, QueryContext, QueryFrame, RemoteError, StreamEvent,
    ThoughtStep, ToolCallRecord,
};
pub use state::{Applied, StreamingState};
pub use transport::{Connector, Transport, WsConnector, WsTransport};
