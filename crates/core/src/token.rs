//! Session token minting.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Error, Result};

/// Bytes of entropy behind every token.
const TOKEN_BYTES: usize = 32;

/// Mint a new session token: 256 bits from the OS entropy source, encoded as
/// unpadded URL-safe base64 (43 characters, cookie- and URL-safe).
///
/// Entropy failure is returned to the caller; tokens are never minted from a
/// weaker source.
pub(crate) fn generate() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(Error::TokenGeneration)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_43_url_safe_chars() {
        let token = generate().unwrap();
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn tokens_are_unique() {
        let a = generate().unwrap();
        let b = generate().unwrap();
        assert_ne!(a, b);
    }
}
