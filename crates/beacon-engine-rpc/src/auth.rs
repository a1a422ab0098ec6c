//! Engine API authentication: a shared 32-byte HS256 secret and the
//! short-lived bearer tokens minted from it.

use std::fmt;
use std::path::Path;

use jwt_simple::{
    algorithms::{HS256Key, MACLike},
    claims::Claims,
    prelude::Duration as TokenDuration,
};
use zeroize::Zeroizing;

use crate::error::RpcError;

pub const JWT_SECRET_LEN: usize = 32;

/// Execution clients accept tokens whose `iat` is within 60 seconds of
/// their own clock.
const TOKEN_VALIDITY_SECS: u64 = 60;

/// The shared Engine API secret. Never printed, never cloned.
pub struct JwtSecret {
    key: HS256Key,
}

impl JwtSecret {
    /// Decode a secret from its hex text. Surrounding whitespace and an
    /// optional `0x` prefix are ignored; the rest must decode to exactly
    /// [`JWT_SECRET_LEN`] bytes.
    pub fn from_hex(text: &str) -> Result<Self, RpcError> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let bytes = hex::decode(digits)
            .map(Zeroizing::new)
            .map_err(|e| RpcError::Auth(format!("JWT secret is not valid hex: {e}")))?;

        if bytes.len() != JWT_SECRET_LEN {
            return Err(RpcError::Auth(format!(
                "JWT secret must be exactly {JWT_SECRET_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(JwtSecret {
            key: HS256Key::from_bytes(bytes.as_slice()),
        })
    }

    /// Read and decode a secret file
    pub fn load(path: &Path) -> Result<Self, RpcError> {
        let content = std::fs::read_to_string(path)
            .map(Zeroizing::new)
            .map_err(|e| {
                RpcError::Auth(format!("cannot read JWT secret {}: {e}", path.display()))
            })?;
        Self::from_hex(content.as_str())
    }

    /// Mint a fresh `Authorization` header value carrying an `iat` of now
    pub fn bearer_token(&self) -> Result<String, RpcError> {
        let claims = Claims::create(TokenDuration::from_secs(TOKEN_VALIDITY_SECS));
        let token = self
            .key
            .authenticate(claims)
            .map_err(|e| RpcError::Auth(format!("failed to sign token: {e}")))?;
        Ok(format!("Bearer {token}"))
    }

    #[cfg(test)]
    fn to_bytes(&self) -> Vec<u8> {
        self.key.to_bytes()
    }
}

impl fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JwtSecret([REDACTED])")
    }
}
