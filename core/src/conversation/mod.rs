//! Conversation state machine.
//!
//! A single [`Dispatcher`] owns the state → handler mapping. Every inbound
//! message is rate-limited, checked for global commands, then routed to the
//! handler of the user's current state, which returns the next state.

pub mod delivery;
pub mod dispatcher;
pub mod input;
pub mod state;

pub use dispatcher::Dispatcher;
pub use input::{ContinuousAction, LanguageChoice, MenuAction};
pub use state::{ConversationContext, ConversationState};
