//! Operator commands for the server binary.
//!
//! ```text
//! activator_server                          # run the server
//! activator_server codes generate           # add one batch (issuance.batch_size)
//! activator_server codes generate --count 50
//! activator_server codes count              # eligible codes left in the pool
//! ```

use crate::activation_code::CodeBatchConfig;
use crate::errors::{LicenseError, LicenseResult};
use crate::server::database::Database;
use crate::server::handlers::replenish_pool;

/// Parsed command line.
#[derive(Debug, PartialEq, Eq)]
pub enum CodesCommand {
    /// Generate and store codes, then print them
    Generate { count: Option<usize> },
    /// Print the number of codes still available for issuance
    Count,
    /// No command (run server normally)
    None,
}

/// Parse CLI arguments for code pool commands.
///
/// Unrecognized input falls through to [`CodesCommand::None`] so the
/// server starts as usual; a malformed `--count` is an error.
pub fn parse_codes_command(args: &[String]) -> LicenseResult<CodesCommand> {
    if args.len() < 3 || args[1] != "codes" {
        return Ok(CodesCommand::None);
    }

    match args[2].as_str() {
        "generate" => {
            let mut count = None;

            let mut i = 3;
            while i < args.len() {
                match args[i].as_str() {
                    "--count" | "-c" => {
                        let value = args.get(i + 1).ok_or_else(|| {
                            LicenseError::InvalidRequest("--count requires a value".to_string())
                        })?;
                        let parsed = value.parse::<usize>().map_err(|_| {
                            LicenseError::InvalidRequest(format!(
                                "--count must be a positive integer, got '{value}'"
                            ))
                        })?;
                        if parsed == 0 {
                            return Err(LicenseError::InvalidRequest(
                                "--count must be greater than 0".to_string(),
                            ));
                        }
                        count = Some(parsed);
                        i += 2;
                    }
                    _ => i += 1,
                }
            }

            Ok(CodesCommand::Generate { count })
        }
        "count" => Ok(CodesCommand::Count),
        _ => Ok(CodesCommand::None),
    }
}

/// Execute a codes command.
///
/// Returns `true` when a command ran and the process should exit.
pub async fn execute_codes_command(
    db: &Database,
    cmd: CodesCommand,
    defaults: &CodeBatchConfig,
) -> LicenseResult<bool> {
    match cmd {
        CodesCommand::Generate { count } => {
            let batch = CodeBatchConfig {
                batch_size: count.unwrap_or(defaults.batch_size),
                seed: defaults.seed.clone(),
            };
            let before = db.count_available().await?;
            let inserted = replenish_pool(db, &batch).await?;
            let after = db.count_available().await?;

            println!("Generated {inserted} activation codes ({before} -> {after} available).");
            Ok(true)
        }
        CodesCommand::Count => {
            let available = db.count_available().await?;
            println!("{available} activation codes available for issuance.");
            Ok(true)
        }
        CodesCommand::None => Ok(false),
    }
}
