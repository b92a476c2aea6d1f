//! Webhook secret generation.

use rand::Rng;

/// Number of random bytes in a webhook secret.
pub const TOKEN_BYTES: usize = 32;

/// Generate a fresh webhook secret: 32 bytes from the thread-local CSPRNG,
/// hex encoded to 64 characters.
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
