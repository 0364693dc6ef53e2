//! Request field validation.

use std::fmt;

use crate::errors::LicenseError;

/// Upper bound on a submitted machine code, in bytes.
pub const MAX_MACHINE_CODE_LEN: usize = 512;

/// Validation error type.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for LicenseError {
    fn from(err: ValidationError) -> Self {
        LicenseError::InvalidRequest(err.to_string())
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate that a string is not empty or whitespace only.
///
/// # Example
/// ```
/// use activator::server::validation::validate_not_empty;
///
/// assert!(validate_not_empty("hello", "name").is_ok());
/// assert!(validate_not_empty("", "name").is_err());
/// assert!(validate_not_empty("   ", "name").is_err());
/// ```
pub fn validate_not_empty(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "cannot be empty".to_string(),
        })
    } else {
        Ok(())
    }
}

/// Validate that a string's byte length is at most `max`.
pub fn validate_max_length(value: &str, max: usize, field_name: &str) -> ValidationResult<()> {
    if value.len() > max {
        Err(ValidationError {
            field: field_name.to_string(),
            message: format!("must be at most {} bytes", max),
        })
    } else {
        Ok(())
    }
}

/// Reject Unicode control characters, C0 and C1 alike (they end up verbatim
/// in the log file).
pub fn validate_no_control_chars(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.chars().any(char::is_control) {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "must not contain control characters".to_string(),
        })
    } else {
        Ok(())
    }
}

/// Validate a machine code before it is compared or bound.
pub fn validate_machine_code(value: &str) -> ValidationResult<()> {
    const FIELD: &str = "protected_machine_code";
    validate_not_empty(value, FIELD)?;
    validate_max_length(value, MAX_MACHINE_CODE_LEN, FIELD)?;
    validate_no_control_chars(value, FIELD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty() {
        assert!(validate_not_empty("hello", "field").is_ok());
        assert!(validate_not_empty("", "field").is_err());
        assert!(validate_not_empty("\t\n", "field").is_err());
    }

    #[test]
    fn test_validate_max_length() {
        assert!(validate_max_length("hello", 5, "field").is_ok());
        assert!(validate_max_length("hello!", 5, "field").is_err());
    }

    #[test]
    fn test_validate_no_control_chars() {
        assert!(validate_no_control_chars("plain-ascii", "field").is_ok());
        assert!(validate_no_control_chars("Größe-ü", "field").is_ok());
        assert!(validate_no_control_chars("tab\there", "field").is_err());
        assert!(validate_no_control_chars("del\u{7f}", "field").is_err());
        // C1 controls (U+0080..=U+009F) are rejected too.
        assert!(validate_no_control_chars("a\u{85}b", "field").is_err());
        assert!(validate_no_control_chars("\u{9f}", "field").is_err());
    }

    #[test]
    fn test_validate_machine_code() {
        assert!(validate_machine_code("BFEBFBFF000906EA-WD-WX41A").is_ok());
        assert!(validate_machine_code("machine with spaces").is_ok());
        assert!(validate_machine_code("").is_err());
        assert!(validate_machine_code("line\nbreak").is_err());
        assert!(validate_machine_code(&"x".repeat(MAX_MACHINE_CODE_LEN + 1)).is_err());
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError {
            field: "test_field".to_string(),
            message: "is invalid".to_string(),
        };
        assert_eq!(err.to_string(), "test_field: is invalid");
    }

    #[test]
    fn validation_error_becomes_invalid_request() {
        let err: LicenseError = validate_machine_code("").unwrap_err().into();
        assert!(matches!(err, LicenseError::InvalidRequest(_)));
    }
}
