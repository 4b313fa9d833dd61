//! Identifier generation for runs, correlation, and errors
//!
//! All identifiers are UUID v4 strings. `run_id` and `correlation_id` are
//! generated once at context creation and never regenerated during
//! propagation.

use uuid::Uuid;

/// Generate a unique run identifier (UUID v4)
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a unique correlation identifier (UUID v4)
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a unique error identifier (UUID v4)
pub fn new_error_id() -> String {
    Uuid::new_v4().to_string()
}

/// Check that an identifier parses as a UUID
pub fn is_valid_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid_uuids() {
        assert!(is_valid_id(&new_run_id()));
        assert!(is_valid_id(&new_correlation_id()));
        assert!(is_valid_id(&new_error_id()));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(new_run_id(), new_run_id());
    }

    #[test]
    fn rejects_non_uuid_strings() {
        assert!(!is_valid_id("run-42"));
        assert!(!is_valid_id(""));
    }
}
