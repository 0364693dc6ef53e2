//! Activation code generation.
//!
//! Codes are the lowercase hex SHA-256 digest of the current UTC timestamp
//! (RFC 3339, nanosecond precision) concatenated with a static seed:
//!
//! ```text
//! code = hex(sha256("2024-01-01T00:00:00.000000000Z" ++ seed))
//! ```
//!
//! Codes within one batch are always distinct. Across batches uniqueness is
//! probabilistic; the storage layer carries a unique index as a backstop.
//!
//! # Example
//!
//! ```rust
//! use activator::activation_code::{generate_activation_codes, CodeBatchConfig};
//!
//! let config = CodeBatchConfig { batch_size: 3, seed: "demo".to_string() };
//! let codes = generate_activation_codes(&config);
//! assert_eq!(codes.len(), 3);
//! ```

use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::config::IssuanceConfig;

/// Number of codes produced per pool refill.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Seed mixed into every generated code unless configured otherwise.
pub const DEFAULT_CODE_SEED: &str = "license-activator";

/// Parameters for one generation pass.
#[derive(Debug, Clone)]
pub struct CodeBatchConfig {
    /// Number of codes to produce
    pub batch_size: usize,
    /// Static seed appended to each timestamp
    pub seed: String,
}

impl Default for CodeBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            seed: DEFAULT_CODE_SEED.to_string(),
        }
    }
}

impl From<&IssuanceConfig> for CodeBatchConfig {
    fn from(config: &IssuanceConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            seed: config.code_seed.clone(),
        }
    }
}

/// Hash a timestamp string and seed into an activation code.
pub fn activation_code_for(timestamp: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(seed.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a single code from the current wall-clock time.
pub fn generate_activation_code(seed: &str) -> String {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
    activation_code_for(&timestamp, seed)
}

/// Generate exactly `config.batch_size` distinct codes.
///
/// When the clock has not advanced between two draws the repeated code is
/// discarded and drawn again.
pub fn generate_activation_codes(config: &CodeBatchConfig) -> Vec<String> {
    let mut seen = HashSet::with_capacity(config.batch_size);
    let mut codes = Vec::with_capacity(config.batch_size);

    while codes.len() < config.batch_size {
        let code = generate_activation_code(&config.seed);
        if seen.insert(code.clone()) {
            codes.push(code);
        } else {
            std::hint::spin_loop();
        }
    }

    codes
}
