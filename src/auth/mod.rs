//! Authentication against the instance OAuth endpoint
//!
//! Password grant to start a session, refresh grant to keep it alive. The
//! resulting token is cached in a [`KeyValueStore`](crate::store::KeyValueStore).

pub mod manager;
pub mod oauth;
pub mod tokens;

pub use manager::TokenManager;
pub use oauth::{GrantClient, GrantedTokens};
pub use tokens::{Clock, ManualClock, SystemClock, TokenRecord, TokenState, SAFETY_MARGIN_SECS};
