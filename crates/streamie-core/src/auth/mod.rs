//! Authentication module for managing the user's session.
//!
//! This module provides:
//! - `SessionToken`: the bearer token and the claims decoded from it
//! - `SessionManager`: the login/logout/expiry state machine
//! - `TokenStore`: persistence of the token across restarts (file, keychain, memory)
//!
//! Tokens are issued by the server with a one hour lifetime.

pub mod credentials;
pub mod session;
pub mod store;
pub mod token;

pub use credentials::Credentials;
pub use session::{LogoutReason, SessionError, SessionEvent, SessionManager, SessionState};
pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use token::SessionToken;
