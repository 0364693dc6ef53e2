use chrono::{NaiveDateTime, Utc};
use sqlx::{query, query_as, query_scalar, FromRow};
use std::sync::Arc;
use tracing::{debug, error};

#[cfg(feature = "sqlite")]
use sqlx::sqlite::SqlitePoolOptions;
#[cfg(feature = "sqlite")]
use sqlx::SqlitePool;

#[cfg(feature = "postgres")]
use sqlx::postgres::PgPoolOptions;
#[cfg(feature = "postgres")]
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::errors::{LicenseError, LicenseResult};

/// One activation code and its binding state.
///
/// Mirrors the `licenses` table created by [`Database::migrate`].
#[derive(Debug, Clone, FromRow)]
pub struct LicenseRecord {
    pub id: i64,
    pub activation_code: String,
    /// Empty until the first successful bind.
    pub protected_machine_code: String,
    /// Set once the code has been handed out by the issuance endpoint.
    pub used: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

impl LicenseRecord {
    pub fn is_bound(&self) -> bool {
        !self.protected_machine_code.is_empty()
    }

    pub fn is_bound_to(&self, machine_code: &str) -> bool {
        self.is_bound() && self.protected_machine_code == machine_code
    }
}

#[cfg(feature = "sqlite")]
const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS licenses (
        id                      INTEGER PRIMARY KEY AUTOINCREMENT,
        activation_code         TEXT NOT NULL,
        protected_machine_code  TEXT NOT NULL DEFAULT '',
        used                    BOOLEAN NOT NULL DEFAULT FALSE,
        created_at              TEXT NOT NULL,
        updated_at              TEXT NOT NULL,
        deleted_at              TEXT
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_activation_code ON licenses (activation_code)",
    "CREATE INDEX IF NOT EXISTS idx_protected_machine_code ON licenses (protected_machine_code)",
    "CREATE INDEX IF NOT EXISTS idx_licenses_deleted_at ON licenses (deleted_at)",
];

#[cfg(feature = "postgres")]
const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS licenses (
        id                      BIGSERIAL PRIMARY KEY,
        activation_code         TEXT NOT NULL,
        protected_machine_code  TEXT NOT NULL DEFAULT '',
        used                    BOOLEAN NOT NULL DEFAULT FALSE,
        created_at              TIMESTAMP NOT NULL,
        updated_at              TIMESTAMP NOT NULL,
        deleted_at              TIMESTAMP
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_activation_code ON licenses (activation_code)",
    "CREATE INDEX IF NOT EXISTS idx_protected_machine_code ON licenses (protected_machine_code)",
    "CREATE INDEX IF NOT EXISTS idx_licenses_deleted_at ON licenses (deleted_at)",
];

/// Log a failed query and wrap it as a storage error.
fn storage_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> LicenseError {
    move |e| {
        error!("{operation} failed: {e}");
        LicenseError::StorageError(format!("{operation}: {e}"))
    }
}

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

impl Database {
    /// Open a connection pool for the configured backend.
    pub async fn connect(config: &DatabaseConfig) -> LicenseResult<Arc<Self>> {
        match config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.sqlite_url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to SQLite: {e}");
                        LicenseError::StorageError(format!("failed to connect to SQLite: {e}"))
                    })?;

                Ok(Arc::new(Database::SQLite(pool)))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(LicenseError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.postgres_url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to PostgreSQL: {e}");
                        LicenseError::StorageError(format!(
                            "failed to connect to PostgreSQL: {e}"
                        ))
                    })?;

                Ok(Arc::new(Database::Postgres(pool)))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(LicenseError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(LicenseError::ConfigError(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Backend name, as used in `database.db_type`.
    pub fn db_type(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }

    /// Create the `licenses` table and its indexes if they are missing.
    pub async fn migrate(&self) -> LicenseResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                for statement in SQLITE_SCHEMA {
                    query(statement)
                        .execute(pool)
                        .await
                        .map_err(storage_error("SQLite migrate"))?;
                }
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                for statement in POSTGRES_SCHEMA {
                    query(statement)
                        .execute(pool)
                        .await
                        .map_err(storage_error("Postgres migrate"))?;
                }
            }
        }

        debug!("licenses schema is up to date");
        Ok(())
    }

    /// Cheap connectivity probe.
    pub async fn ping(&self) -> bool {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("SELECT 1").execute(pool).await.is_ok(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("SELECT 1").execute(pool).await.is_ok(),
        }
    }

    /// Fetch the first live record carrying `activation_code`.
    ///
    /// Returns:
    /// - `Ok(Some(LicenseRecord))` if found
    /// - `Ok(None)` if no live record matches
    /// - `Err(LicenseError::StorageError)` on DB failure
    pub async fn find_by_activation_code(
        &self,
        activation_code: &str,
    ) -> LicenseResult<Option<LicenseRecord>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, LicenseRecord>(
                "SELECT * FROM licenses \
                 WHERE activation_code = ? AND deleted_at IS NULL \
                 ORDER BY id LIMIT 1",
            )
            .bind(activation_code)
            .fetch_optional(pool)
            .await
            .map_err(storage_error("SQLite find_by_activation_code")),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, LicenseRecord>(
                "SELECT * FROM licenses \
                 WHERE activation_code = $1 AND deleted_at IS NULL \
                 ORDER BY id LIMIT 1",
            )
            .bind(activation_code)
            .fetch_optional(pool)
            .await
            .map_err(storage_error("Postgres find_by_activation_code")),
        }
    }

    /// Bind record `id` to `machine_code` if it is still unbound.
    ///
    /// The update only matches while `protected_machine_code` is empty, so
    /// of several concurrent binds exactly one succeeds.
    ///
    /// Returns:
    /// - `Ok(true)` if this call performed the bind
    /// - `Ok(false)` if the record was already bound (or is gone)
    pub async fn bind_machine(&self, id: i64, machine_code: &str) -> LicenseResult<bool> {
        let now = Utc::now().naive_utc();

        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(
                "UPDATE licenses \
                 SET protected_machine_code = ?, updated_at = ? \
                 WHERE id = ? AND protected_machine_code = '' AND deleted_at IS NULL",
            )
            .bind(machine_code)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await
            .map_err(storage_error("SQLite bind_machine"))?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(
                "UPDATE licenses \
                 SET protected_machine_code = $1, updated_at = $2 \
                 WHERE id = $3 AND protected_machine_code = '' AND deleted_at IS NULL",
            )
            .bind(machine_code)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await
            .map_err(storage_error("Postgres bind_machine"))?
            .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Atomically mark one eligible code as used and return it.
    ///
    /// Eligible means unbound, unused and not soft-deleted. Returns
    /// `Ok(None)` when the pool is empty.
    pub async fn claim_unused_code(&self) -> LicenseResult<Option<String>> {
        let now = Utc::now().naive_utc();

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, String>(
                "UPDATE licenses SET used = TRUE, updated_at = ? \
                 WHERE id = ( \
                     SELECT id FROM licenses \
                     WHERE used = FALSE AND protected_machine_code = '' AND deleted_at IS NULL \
                     ORDER BY id LIMIT 1 \
                 ) \
                 RETURNING activation_code",
            )
            .bind(now)
            .fetch_optional(pool)
            .await
            .map_err(storage_error("SQLite claim_unused_code")),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, String>(
                "UPDATE licenses SET used = TRUE, updated_at = $1 \
                 WHERE id = ( \
                     SELECT id FROM licenses \
                     WHERE used = FALSE AND protected_machine_code = '' AND deleted_at IS NULL \
                     ORDER BY id LIMIT 1 \
                     FOR UPDATE SKIP LOCKED \
                 ) \
                 RETURNING activation_code",
            )
            .bind(now)
            .fetch_optional(pool)
            .await
            .map_err(storage_error("Postgres claim_unused_code")),
        }
    }

    /// Insert fresh, unbound, unused codes in a single transaction.
    ///
    /// All rows share the same `created_at` / `updated_at`. Returns the
    /// number of rows inserted.
    pub async fn insert_activation_codes(&self, codes: &[String]) -> LicenseResult<u64> {
        let now = Utc::now().naive_utc();
        let mut inserted = 0;

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let mut tx = pool
                    .begin()
                    .await
                    .map_err(storage_error("SQLite begin transaction"))?;

                for code in codes {
                    inserted += query(
                        "INSERT INTO licenses \
                         (activation_code, protected_machine_code, used, created_at, updated_at) \
                         VALUES (?, '', FALSE, ?, ?)",
                    )
                    .bind(code)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage_error("SQLite insert_activation_codes"))?
                    .rows_affected();
                }

                tx.commit()
                    .await
                    .map_err(storage_error("SQLite commit transaction"))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let mut tx = pool
                    .begin()
                    .await
                    .map_err(storage_error("Postgres begin transaction"))?;

                for code in codes {
                    inserted += query(
                        "INSERT INTO licenses \
                         (activation_code, protected_machine_code, used, created_at, updated_at) \
                         VALUES ($1, '', FALSE, $2, $3)",
                    )
                    .bind(code)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage_error("Postgres insert_activation_codes"))?
                    .rows_affected();
                }

                tx.commit()
                    .await
                    .map_err(storage_error("Postgres commit transaction"))?;
            }
        }

        Ok(inserted)
    }

    /// Number of codes the issuance endpoint could still hand out.
    pub async fn count_available(&self) -> LicenseResult<i64> {
        const COUNT_AVAILABLE: &str = "SELECT COUNT(*) FROM licenses \
             WHERE used = FALSE AND protected_machine_code = '' AND deleted_at IS NULL";

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_scalar::<_, i64>(COUNT_AVAILABLE)
                .fetch_one(pool)
                .await
                .map_err(storage_error("SQLite count_available")),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_scalar::<_, i64>(COUNT_AVAILABLE)
                .fetch_one(pool)
                .await
                .map_err(storage_error("Postgres count_available")),
        }
    }
}
