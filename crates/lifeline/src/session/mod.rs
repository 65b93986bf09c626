//! Session model
//!
//! A session is present while a bearer token is stored and the identity
//! behind it is known. Token persistence is abstracted by [`TokenStore`];
//! session changes are published to observers through a watch channel.

mod state;
mod store;

pub use state::Session;
pub(crate) use state::identity_changed;
pub use store::{FileTokenStore, MemoryTokenStore, TOKEN_KEY, TokenStore};
