//! # HirePrep client
//!
//! Authenticated HTTP client for the HirePrep interview-preparation API.
//!
//! ## What it does
//!
//! - Attaches the current access token as `Authorization: Bearer ...` to every request.
//! - Renews an expired session through `/auth/refresh` (the refresh credential is an
//!   HTTP-only cookie the transport carries) and resends the failed request once.
//! - Runs at most one refresh at a time; concurrent 401s wait for it and share the result.
//! - Ends the session (token cleared, login redirect fired) when renewal is impossible.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hireprep::client::AuthenticatedClient;
//! use hireprep::config::ClientConfig;
//!
//! #[tokio::main]
//! async fn main() -> miette::Result<()> {
//!     let config = ClientConfig::with_base("http://localhost:8000")?;
//!     let client = AuthenticatedClient::from_config(config)?;
//!
//!     let outcome = client.login("alice", "correct horse").await?;
//!     if outcome.must_change_password {
//!         println!("temporary password in use, change it first");
//!     }
//!
//!     let me = client.me().await?;
//!     println!("logged in as {} ({} solved)", me.username, me.total_solved().unwrap_or(0));
//!
//!     let problems = client.get("/problems/").await?;
//!     println!("{}", String::from_utf8_lossy(problems.body()));
//!
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Authenticated client, refresh coordination and `/auth` endpoint wrappers
pub mod client;
pub mod config;
pub mod redirect;

pub use hireprep_common::*;
