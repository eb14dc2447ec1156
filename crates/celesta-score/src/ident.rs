//! Identifier legality rules.
//!
//! Every named element (grain, table, column, index, sequence, view, FK
//! constraint) is validated against the same rule: `[A-Za-z_][A-Za-z0-9_]*`,
//! at most [`MAX_IDENTIFIER_LENGTH`] characters. The length cap matches the
//! width of the identifier columns in the system catalog.

use celesta_error::{CelestaError, CelestaResult};

/// Maximum identifier length, matching the `nvarchar2(30)` catalog columns.
pub const MAX_IDENTIFIER_LENGTH: usize = 30;

/// Validate an identifier, returning it unchanged on success.
pub fn validate_identifier(name: &str) -> CelestaResult<&str> {
    if name.is_empty() {
        return Err(CelestaError::InvalidIdentifier {
            name: name.to_owned(),
            reason: "empty".to_owned(),
        });
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(CelestaError::InvalidIdentifier {
            name: name.to_owned(),
            reason: format!("longer than {MAX_IDENTIFIER_LENGTH} characters"),
        });
    }
    let bytes = name.as_bytes();
    if !(bytes[0].is_ascii_alphabetic() || bytes[0] == b'_') {
        return Err(CelestaError::InvalidIdentifier {
            name: name.to_owned(),
            reason: "must start with a letter or underscore".to_owned(),
        });
    }
    if let Some(&bad) = bytes[1..]
        .iter()
        .find(|b| !(b.is_ascii_alphanumeric() || **b == b'_'))
    {
        return Err(CelestaError::InvalidIdentifier {
            name: name.to_owned(),
            reason: format!("contains illegal character '{}'", bad as char),
        });
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        for name in ["t1", "_x", "grainid", "a_b_c", "Abc9"] {
            assert!(validate_identifier(name).is_ok(), "{name}");
        }
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        for name in ["", "1abc", "a-b", "a b", "таблица", "a."] {
            assert!(validate_identifier(name).is_err(), "{name}");
        }
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
    }
}
