// src/server/mod.rs

//! Server-side components.
//!
//! This module contains:
//! - `database`      → storage abstraction over SQLite/Postgres
//! - `handlers`      → Axum handlers for activation and issuance
//! - `routes`        → router builder with CORS and request logging
//! - `api_response`  → HTTP mapping for the response envelope
//! - `logging`       → subscriber setup, request middleware, activation events
//! - `validation`    → request field validation
//! - `cli`           → operator commands of the server binary

pub mod api_response;
pub mod cli;
pub mod database;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod validation;

pub use cli::{execute_codes_command, parse_codes_command, CodesCommand};
pub use database::{Database, LicenseRecord};
pub use handlers::{
    activate_handler, health_handler, issue_code_handler, replenish_pool, AppState, RefillLock,
};
pub use logging::{init_logging, log_activation_event, ActivationEvent, HealthResponse};
pub use routes::{build_router, cors_layer};
pub use validation::{validate_machine_code, ValidationError, ValidationResult};
