//! Chat transcript and the controller that drives it.
//!
//! The transcript is durable and ordered; the streaming state of the
//! response in flight lives beside it in [`Conversation`] and is thrown
//! away when the turn ends.

mod cache;
mod controller;
mod message;
mod store;

pub use cache::{CacheEntry, CachedTranscript, TranscriptCache};
pub use controller::{
    fallback_text, Conversation, ControllerError, FeedbackHandler, Step, TurnOutcome,
    GENERIC_FALLBACK, NETWORK_FALLBACK,
};
pub use message::{Message, MessageMarker, MessagePatch, Role};
pub use store::{StoreError, TranscriptBackend, TranscriptStore};
