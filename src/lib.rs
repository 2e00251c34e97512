//! ideaprobe library
//!
//! Client for a streaming business-idea research service, plus the
//! pieces the `probe` binary is built from.
//!
//! ## Main Components
//!
//! - [`stream`] - WebSocket research client, frame decoding, streaming state, feedback gate
//! - [`chat`] - Chat transcript, local cache, and the conversation controller
//! - [`jobs`] - Extraction and embedding status tracking
//! - [`services`] - HTTP enhancement endpoints with fallbacks
//! - [`messaging`] - UI event bus and terminal renderer
//! - [`config`] - Settings, client configuration, and XDG directories
//! - [`db`] - SQLite persistence
//! - [`cli`] - Command implementations for the `probe` binary
//!
//! ## Quick Start
//!
//! ```ignore
//! use ideaprobe::{ChatRepository, Conversation, Database, ResearchClient, TranscriptStore, WsConnector};
//!
//! let db = Database::open()?;
//! db.migrate()?;
//! let store = TranscriptStore::new("conv-1").with_backend(ChatRepository::new(&db));
//! let client = ResearchClient::new(WsConnector::new("wss://research.example.com/ws"));
//! let mut conversation = Conversation::new(client, store);
//! let outcome = conversation.ask("Is a mobile sauna rental viable?", &mut handler).await?;
//! ```

pub mod chat;
pub mod cli;
pub mod config;
pub mod db;
pub mod jobs;
pub mod messaging;
pub mod services;
pub mod stream;

// Re-export commonly used types
pub use chat::{
    Conversation, ControllerError, FeedbackHandler, Message, MessageMarker, Role, TranscriptCache,
    TranscriptStore, TurnOutcome,
};
pub use config::{ClientConfig, Settings, XdgDirs};
pub use db::{ChatRepository, Database, JobRepository};
pub use jobs::{EmbeddingStatus, EmbeddingTracker, ExtractionStatus, ExtractionTracker};
pub use messaging::{EventBus, TerminalRenderer, UiEvent};
pub use services::EnhancementClient;
pub use stream::{
    Citation, ResearchClient, StreamError, StreamEvent, StreamingState, WsConnector,
};
