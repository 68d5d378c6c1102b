//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_ID_LEN: usize = 64;

/// Validates a chat-platform identifier: non-empty, at most 64 characters,
/// no whitespace or control characters.
///
/// # Examples
///
/// ```ignore
/// validate_platform_id("268924437419458560") // Ok
/// validate_platform_id("")                   // Err - empty
/// validate_platform_id("12 34")              // Err - whitespace
/// ```
pub fn validate_platform_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        let mut err = ValidationError::new("platform_id_length");
        err.message = Some(
            format!(
                "Identifier must be between 1 and {MAX_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        let mut err = ValidationError::new("platform_id_format");
        err.message = Some("Identifier must not contain whitespace or control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_platform_id_valid() {
        assert!(validate_platform_id("268924437419458560").is_ok());
        assert!(validate_platform_id("p1").is_ok());
    }

    #[test]
    fn test_validate_platform_id_invalid_length() {
        assert!(validate_platform_id("").is_err());
        assert!(validate_platform_id(&"9".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_platform_id_invalid_format() {
        assert!(validate_platform_id("12 34").is_err());
        assert!(validate_platform_id("12\n34").is_err());
    }
}
