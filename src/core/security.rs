use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::core::config::Settings;

const ARGON2_MEMORY_KIB: u32 = 19_456;
const ARGON2_TIME: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

pub(crate) const ROLE_SESSION: &str = "session";
pub(crate) const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("passcode hashing failed")]
    Hashing,
    #[error("passcode verification failed")]
    Verification,
    #[error("jwt encoding failed")]
    JwtEncoding,
    #[error("jwt decoding failed")]
    JwtDecoding,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Capability claims: `sub` is the session token (or "admin"), `role` scopes
/// what the bearer may touch. Session-scoped handlers must additionally check
/// that `sub` equals the path-addressed session token.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) role: String,
    pub(crate) exp: i64,
}

pub(crate) fn hash_passcode(passcode: &str) -> Result<String, SecurityError> {
    let salt = SaltString::generate(&mut OsRng);
    let params = argon2::Params::new(ARGON2_MEMORY_KIB, ARGON2_TIME, ARGON2_PARALLELISM, None)
        .map_err(|_| SecurityError::Hashing)?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let hash = argon2
        .hash_password(passcode.as_bytes(), &salt)
        .map_err(|_| SecurityError::Hashing)?
        .to_string();

    Ok(hash)
}

pub(crate) fn verify_passcode(passcode: &str, hash: &str) -> Result<bool, SecurityError> {
    let parsed = PasswordHash::new(hash).map_err(|_| SecurityError::Verification)?;
    let params = argon2::Params::new(ARGON2_MEMORY_KIB, ARGON2_TIME, ARGON2_PARALLELISM, None)
        .map_err(|_| SecurityError::Verification)?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    match argon2.verify_password(passcode.as_bytes(), &parsed) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(SecurityError::Verification),
    }
}

pub(crate) fn create_session_capability(
    session_token: &str,
    settings: &Settings,
) -> Result<String, SecurityError> {
    create_token(
        session_token,
        ROLE_SESSION,
        Duration::minutes(settings.security().session_token_expire_minutes as i64),
        settings,
    )
}

pub(crate) fn create_admin_token(settings: &Settings) -> Result<String, SecurityError> {
    create_token(
        "admin",
        ROLE_ADMIN,
        Duration::minutes(settings.security().admin_token_expire_minutes as i64),
        settings,
    )
}

fn create_token(
    subject: &str,
    role: &str,
    expires_in: Duration,
    settings: &Settings,
) -> Result<String, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let expire = OffsetDateTime::now_utc() + expires_in;

    let claims =
        Claims { sub: subject.to_string(), role: role.to_string(), exp: expire.unix_timestamp() };

    encode(
        &jsonwebtoken::Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(settings.security().secret_key.as_bytes()),
    )
    .map_err(|_| SecurityError::JwtEncoding)
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = true;
    validation.required_spec_claims.insert("exp".to_string());
    validation.required_spec_claims.insert("sub".to_string());

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.security().secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| SecurityError::JwtDecoding)
}

fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passcode_hash_roundtrip() {
        let hash = hash_passcode("quiet-falcon-42").expect("hash");
        assert!(verify_passcode("quiet-falcon-42", &hash).unwrap());
        assert!(!verify_passcode("loud-falcon-42", &hash).unwrap());
    }

    #[test]
    fn capability_encode_decode_roundtrip() {
        std::env::set_var("SECRET_KEY", "test-secret");
        let settings = Settings::load().expect("settings");

        let token = create_session_capability("session-123", &settings).expect("token");
        let claims = verify_token(&token, &settings).expect("claims");

        assert_eq!(claims.sub, "session-123");
        assert_eq!(claims.role, ROLE_SESSION);
    }

    #[test]
    fn admin_token_carries_admin_role() {
        std::env::set_var("SECRET_KEY", "test-secret");
        let settings = Settings::load().expect("settings");

        let token = create_admin_token(&settings).expect("token");
        let claims = verify_token(&token, &settings).expect("claims");

        assert_eq!(claims.role, ROLE_ADMIN);
    }
}
