// Rafta remote client - library root

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
