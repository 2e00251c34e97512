//! Render events for Ideaprobe.
//!
//! A conversation publishes [`UiEvent`]s on an [`EventBus`]; renderers
//! subscribe and draw them. The conversation never writes to the terminal
//! itself.
//!
//! ```text
//!   Conversation ──publish──▶ EventBus ──broadcast──▶ TerminalRenderer
//!                                        └──────────▶ (other subscribers)
//! ```

mod bus;
mod renderer;
mod types;

pub use bus::{BusError, EventBus, EventReceiver, EventSender};
pub use renderer::TerminalRenderer;
pub use types::{Level, Notice, TurnEnd, UiEvent};
