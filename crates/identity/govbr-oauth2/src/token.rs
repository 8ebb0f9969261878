//! Opaque anti-forgery tokens (`state`, `nonce`).

use uuid::Uuid;

/// A fresh UUID v4; 122 bits from the OS random source.
pub fn generate_security_token() -> String {
    Uuid::new_v4().to_string()
}
