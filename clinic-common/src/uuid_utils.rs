//! UUID utilities

use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Fresh opaque schedule entry identifier
pub fn generate_entry_id() -> String {
    generate().to_string()
}
