//! Field normalization shared by the resource endpoints.

use super::error::ApiError;

const MAX_NAME_LENGTH: usize = 100;

pub fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("Name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::bad_request(
            "Name cannot be longer than 100 characters",
        ));
    }
    Ok(())
}

/// Trimmed text, or None when blank. On updates a blank value clears the
/// column.
pub fn blank_to_none(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}
