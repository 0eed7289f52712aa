use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AdminConfig;
use crate::error::{AppError, AppResult};

/// Subject of every admin token; there is a single administrator.
pub const ADMIN_SUBJECT: &str = "admin";

const SESSION_KIND: &str = "session";
const CSRF_KIND: &str = "csrf";
const CSRF_LIFETIME_MINUTES: i64 = 30;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub kind: String,
    pub exp: usize,
    pub iat: usize,
}

/// Signed form token: a random nonce bound to the admin subject, so no
/// server-side nonce storage is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfClaims {
    pub sub: String,
    pub kind: String,
    pub nonce: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    /// Check an admin password against the configured bcrypt hash.
    pub fn verify_password(admin: &AdminConfig, password: &str) -> AppResult<bool> {
        if admin.password_hash.is_empty() {
            return Err(AppError::Config("Admin password is not configured".to_string()));
        }
        bcrypt::verify(password, &admin.password_hash)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("bcrypt verification failed: {}", e)))
    }

    /// Create a signed session JWT. Returns the token and its expiry (unix seconds).
    pub fn create_jwt(admin: &AdminConfig, subject: &str) -> AppResult<(String, i64)> {
        let now = Utc::now();
        let exp = now + Duration::hours(admin.jwt_expiration_hours);
        let claims = Claims {
            sub: subject.to_string(),
            kind: SESSION_KIND.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(admin.jwt_secret.as_bytes()),
        )?;
        Ok((token, exp.timestamp()))
    }

    /// Decode and validate a session JWT, returning its claims.
    pub fn decode_jwt(admin: &AdminConfig, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(admin.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;
        if token_data.claims.kind != SESSION_KIND {
            return Err(AppError::Unauthorized);
        }
        Ok(token_data.claims)
    }

    /// Issue a short-lived CSRF token for the admin forms.
    pub fn issue_csrf_token(admin: &AdminConfig, subject: &str) -> AppResult<String> {
        let now = Utc::now();
        let claims = CsrfClaims {
            sub: subject.to_string(),
            kind: CSRF_KIND.to_string(),
            nonce: Self::generate_random_string(32),
            iat: now.timestamp() as usize,
            exp: (now + Duration::minutes(CSRF_LIFETIME_MINUTES)).timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(admin.jwt_secret.as_bytes()),
        )?)
    }

    /// Verify a submitted CSRF token for `subject`. Any failure is `Forbidden`.
    pub fn verify_csrf_token(admin: &AdminConfig, subject: &str, token: &str) -> AppResult<()> {
        let claims = decode::<CsrfClaims>(
            token,
            &DecodingKey::from_secret(admin.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            tracing::warn!("Rejected admin form with invalid CSRF token: {}", e);
            AppError::Forbidden
        })?
        .claims;

        if claims.kind != CSRF_KIND || claims.sub != subject {
            tracing::warn!("Rejected admin form with mismatched CSRF token");
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    /// Generate a random alphanumeric string of the given length.
    pub fn generate_random_string(length: usize) -> String {
        use rand::Rng;
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}
