//! Conversations and messaging
//!
//! A view model over the user's conversations with short-interval polling
//! of the open thread.

mod participants;
mod state;
mod view;

pub use participants::{Participant, display_name_from_email, other_party};
pub use state::ChatState;
pub use view::{ChatError, ChatOptions, ConversationView};
