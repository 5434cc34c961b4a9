//! Identifier helpers shared across components.

use uuid::Uuid;

/// A fresh UUIDv4 string, used as the explicit caller-generated id for every
/// persistent record.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// The first 8 hex characters of a fresh UUIDv4, used as a `request_id`.
pub fn short_request_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_request_id_is_eight_hex_chars() {
        let id = short_request_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn new_id_is_a_valid_uuid() {
        let id = new_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
