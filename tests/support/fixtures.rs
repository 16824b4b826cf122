//! Test fixtures and key ring helpers.

use age::secrecy::ExposeSecret;
use age::x25519;

/// Key used by the value round-trip tests.
pub const DB_PASSWORD_KEY: &str = "/app/db/password";

/// A line that is not an age key, for negative tests.
pub const INVALID_KEY_LINE: &str = "not-a-valid-age-key";

/// Key ring holding the private half of `identity`.
pub fn secret_ring(identity: &x25519::Identity) -> String {
    format!(
        "# created: test fixture\n# public key: {}\n{}\n",
        identity.to_public(),
        identity.to_string().expose_secret()
    )
}

/// Key ring holding only the public half of `identity`.
pub fn public_ring(identity: &x25519::Identity) -> String {
    format!("{}\n", identity.to_public())
}
