use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use shared_models::auth::{JwtClaims, User};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("JWT secret is not set")]
    MissingSecret,

    #[error("Invalid token format")]
    Malformed,

    #[error("Invalid signature encoding")]
    BadSignatureEncoding,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Invalid claims")]
    BadClaims,

    #[error("Token expired")]
    Expired,
}

/// Verify an HS256 token and turn its claims into a [`User`].
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, TokenError> {
    if jwt_secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(c), Some(s), None) => (h, c, s),
        _ => return Err(TokenError::Malformed),
    };

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        TokenError::BadSignatureEncoding
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| TokenError::MissingSecret)?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err(TokenError::BadSignature);
    }

    let claims_json = URL_SAFE_NO_PAD.decode(claims_b64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(TokenError::BadClaims)?;

    let claims: JwtClaims = serde_json::from_str(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        TokenError::BadClaims
    })?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp().max(0) as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err(TokenError::Expired);
        }
    }

    let created_at = claims.iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    #[test]
    fn valid_token_yields_user() {
        let user = TestUser::patient("p@example.com");
        let token = JwtTestUtils::create_test_token(&user, SECRET, Some(1));

        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.role.as_deref(), Some("patient"));
    }

    #[test]
    fn rejects_expired_forged_and_malformed_tokens() {
        let user = TestUser::default();

        assert_eq!(
            validate_token(&JwtTestUtils::create_expired_token(&user, SECRET), SECRET).unwrap_err(),
            TokenError::Expired,
        );
        assert_eq!(
            validate_token(&JwtTestUtils::create_invalid_signature_token(&user), SECRET).unwrap_err(),
            TokenError::BadSignature,
        );
        assert!(validate_token(&JwtTestUtils::create_malformed_token(), SECRET).is_err());
        assert_eq!(validate_token("a.b", SECRET).unwrap_err(), TokenError::Malformed);
        assert_eq!(validate_token("a.b.c", "").unwrap_err(), TokenError::MissingSecret);
    }
}
