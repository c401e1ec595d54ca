//! Common types for the HirePrep API client

#![warn(missing_docs)]
pub use smol_str;
pub use url;

/// Access-token storage: the single source of truth for the current bearer credential.
pub mod credential;
pub mod error;
/// HTTP client abstraction used by the hireprep crates.
pub mod http_client;
/// Bearer token types.
pub mod token;

pub use credential::{CredentialStore, MemoryCredentialStore};
pub use token::AccessToken;
