//! Validation helpers for DTOs.

use validator::ValidationError;

/// Maximum length of a participant display name.
const NAME_MAX_CHARS: usize = 40;

/// Validates that a participant display name is non-blank and short enough to
/// fit scoreboards.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Display name must not be blank".into());
        return Err(err);
    }

    if name.chars().count() > NAME_MAX_CHARS {
        let mut err = ValidationError::new("display_name_length");
        err.message =
            Some(format!("Display name must be at most {NAME_MAX_CHARS} characters").into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a join code is exactly 6 uppercase alphanumeric characters.
pub fn validate_join_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != 6
        || !code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        let mut err = ValidationError::new("join_code_format");
        err.message = Some("Join code must be 6 uppercase alphanumeric characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_accepts_reasonable_names() {
        assert!(validate_display_name("The Fact Hunters").is_ok());
        assert!(validate_display_name("x").is_ok());
    }

    #[test]
    fn display_name_rejects_blank_and_oversized() {
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"a".repeat(41)).is_err());
    }

    #[test]
    fn join_code_format_enforced() {
        assert!(validate_join_code("AB12CD").is_ok());
        assert!(validate_join_code("ab12cd").is_err()); // lowercase
        assert!(validate_join_code("AB12C").is_err()); // too short
        assert!(validate_join_code("AB12CD7").is_err()); // too long
        assert!(validate_join_code("AB 2CD").is_err()); // space
    }
}
