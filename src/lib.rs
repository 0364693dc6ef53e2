//! License activator - activation code issuance and single-machine binding.
//!
//! A client submits an activation code together with a machine code. The
//! first machine to present a code binds it; any other machine is refused
//! from then on. Bound machines receive a secret key derived from their
//! machine code. A privileged caller can draw fresh codes from a pool that
//! refills itself in batches.
//!
//! # Features
//!
//! - `server` - HTTP server, handlers, database. Enabled by default.
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend.
//! - `background-jobs` - Scheduled pool refill.
//!
//! # Example
//!
//! ```toml
//! # Server with SQLite (default)
//! license-activator = { path = "." }
//!
//! # Client and key derivation only
//! license-activator = { path = ".", default-features = false }
//! ```

#[cfg(all(feature = "server", not(any(feature = "sqlite", feature = "postgres"))))]
compile_error!("the `server` feature requires the `sqlite` or `postgres` feature");

// Core modules (always available)
pub mod activation_code;
pub mod client;
pub mod config;
pub mod errors;
pub mod key_derivation;
pub mod protocol;

// Server-related modules (requires "server" feature)
#[cfg(feature = "server")]
#[path = "server/mod.rs"]
pub mod server;

// Background jobs (requires "background-jobs" feature)
#[cfg(feature = "background-jobs")]
pub mod jobs;
