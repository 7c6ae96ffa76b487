// Authentication module
// Manages the access/refresh token lifecycle for outbound calls

mod expiry;
mod gateway;
mod manager;
mod types;

pub use expiry::{ExpiryParser, TokenRejected, FALLBACK_LIFETIME_SECS};
pub use gateway::{AuthGateway, HttpAuthGateway};
pub use manager::CredentialManager;
pub use types::{BasicCredential, Token, TokenPair};
