use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::activation_code::{generate_activation_codes, CodeBatchConfig};
use crate::config::IssuanceConfig;
use crate::errors::{LicenseError, LicenseResult};
use crate::key_derivation::derive_secret_key;
use crate::protocol::{ActivationRequest, ApiResponse, IssueCodeRequest};
use crate::server::database::{Database, LicenseRecord};
use crate::server::logging::{log_activation_event, ActivationEvent, HealthResponse};
use crate::server::validation::validate_machine_code;

/// Serializes pool refills so concurrent refills produce one batch, not one
/// each. Shared by the issuance handler and the background refill job.
pub type RefillLock = Arc<Mutex<()>>;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub issuance: Arc<IssuanceConfig>,
    refill_lock: RefillLock,
}

impl AppState {
    pub fn new(db: Arc<Database>, issuance: IssuanceConfig) -> Self {
        Self {
            db,
            issuance: Arc::new(issuance),
            refill_lock: RefillLock::default(),
        }
    }

    /// Handle to the refill lock, for anything else that refills the pool.
    pub fn refill_lock(&self) -> RefillLock {
        Arc::clone(&self.refill_lock)
    }
}

/// Handler for `POST /`.
///
/// Behavior:
/// - Unknown code → code 2, whatever the machine code.
/// - Bound to another machine → code 3, whatever the machine code.
/// - Unbound with an invalid machine code → code 4.
/// - Bound to this machine → derived key (idempotent).
/// - Unbound → bind to this machine, then derived key.
pub async fn activate_handler(
    State(state): State<AppState>,
    payload: Result<Json<ActivationRequest>, JsonRejection>,
) -> LicenseResult<Json<ApiResponse<String>>> {
    let Json(req) = payload.map_err(|rejection| {
        warn!("Rejected activation body: {}", rejection.body_text());
        LicenseError::from(rejection)
    })?;

    info!(
        "Activation request for activation_code={} machine_code={}",
        req.activation_code, req.protected_machine_code
    );

    let record = find_record(&state.db, &req.activation_code).await?;
    let machine_code = req.protected_machine_code.as_str();

    if record.is_bound() {
        return check_existing_binding(&record, machine_code).map(Json);
    }

    // Only a value that is about to be stored needs to be well-formed.
    validate_machine_code(machine_code)?;

    if state.db.bind_machine(record.id, machine_code).await? {
        log_activation_event(
            ActivationEvent::Bound,
            &record.activation_code,
            Some(machine_code),
        );
        return Ok(Json(ApiResponse::success(derive_secret_key(machine_code))));
    }

    // Lost a race with a concurrent bind; judge against whoever won.
    let winner = find_record(&state.db, &req.activation_code).await?;
    check_existing_binding(&winner, machine_code).map(Json)
}

async fn find_record(db: &Database, activation_code: &str) -> LicenseResult<LicenseRecord> {
    db.find_by_activation_code(activation_code)
        .await?
        .ok_or_else(|| {
            log_activation_event(ActivationEvent::UnknownCode, activation_code, None);
            LicenseError::UnknownActivationCode
        })
}

fn check_existing_binding(
    record: &LicenseRecord,
    machine_code: &str,
) -> LicenseResult<ApiResponse<String>> {
    if record.is_bound_to(machine_code) {
        log_activation_event(
            ActivationEvent::Validated,
            &record.activation_code,
            Some(machine_code),
        );
        Ok(ApiResponse::success(derive_secret_key(machine_code)))
    } else {
        log_activation_event(
            ActivationEvent::Rejected,
            &record.activation_code,
            Some("bound to another machine"),
        );
        Err(LicenseError::AlreadyBound)
    }
}

/// Constant-length comparison of two secrets via their SHA-256 digests.
fn secret_key_matches(provided: &str, expected: &str) -> bool {
    !expected.is_empty() && Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// Handler for `POST /code/get`.
///
/// Behavior:
/// - Wrong secret → code 1, nothing is touched.
/// - Claims one unbound, unused code and marks it used.
/// - On an empty pool, generates one batch and claims from it.
pub async fn issue_code_handler(
    State(state): State<AppState>,
    payload: Result<Json<IssueCodeRequest>, JsonRejection>,
) -> LicenseResult<Json<ApiResponse<String>>> {
    let Json(req) = payload?;

    if !secret_key_matches(&req.secret_key, &state.issuance.secret_key) {
        log_activation_event(ActivationEvent::BadSecret, "", None);
        return Err(LicenseError::BadSecretKey);
    }

    let code = match state.db.claim_unused_code().await? {
        Some(code) => code,
        None => claim_after_refill(&state).await?,
    };

    log_activation_event(ActivationEvent::CodeIssued, &code, None);
    Ok(Json(ApiResponse::success(code)))
}

async fn claim_after_refill(state: &AppState) -> LicenseResult<String> {
    let _guard = state.refill_lock.lock().await;

    // Someone may have refilled while we waited for the lock.
    if let Some(code) = state.db.claim_unused_code().await? {
        return Ok(code);
    }

    let batch = CodeBatchConfig::from(state.issuance.as_ref());
    let inserted = replenish_pool(&state.db, &batch).await?;
    info!("Activation code pool was empty, generated {inserted} codes");

    state
        .db
        .claim_unused_code()
        .await?
        .ok_or(LicenseError::PoolExhausted)
}

/// Generate one batch of codes and store it. Returns the rows inserted.
pub async fn replenish_pool(db: &Database, batch: &CodeBatchConfig) -> LicenseResult<u64> {
    let codes = generate_activation_codes(batch);
    let inserted = db.insert_activation_codes(&codes).await?;
    log_activation_event(
        ActivationEvent::PoolReplenished,
        "",
        Some(&format!("{inserted} codes")),
    );
    Ok(inserted)
}

/// Handler for `GET /health`.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.db.ping().await;
    Json(HealthResponse::new(connected, state.db.db_type()))
}
