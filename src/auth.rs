//! Admin accounts and bearer tokens.
//!
//! Passwords are stored as Argon2 PHC strings; access tokens are HS256 JWTs whose
//! subject is the admin's normalized email.

use crate::error::{CampusError, Result};
use crate::store::{validate_email, Admin, RecordStore};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const MIN_PASSWORD_LEN: usize = 8;

/// JWT claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token handed out on login, shaped like an OAuth2 token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: String,
}

/// Signup payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Hash a password with a fresh salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| CampusError::Auth(format!("Failed to encode salt: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CampusError::Auth(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Issues and checks admin credentials.
pub struct AuthManager {
    store: Arc<dyn RecordStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry: Duration,
}

impl AuthManager {
    pub fn new(store: Arc<dyn RecordStore>, secret: &str, token_expiry_hours: u32) -> Result<Self> {
        if secret.is_empty() {
            return Err(CampusError::Config("Token signing secret must not be empty".to_string()));
        }
        Ok(Self {
            store,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_expiry: Duration::hours(i64::from(token_expiry_hours)),
        })
    }

    /// Register a new admin.
    #[instrument(skip_all)]
    pub async fn signup(&self, request: SignupRequest) -> Result<Admin> {
        let email = validate_email(&request.email)?;
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CampusError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let name = request
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        let admin = Admin {
            email,
            name,
            password_hash: hash_password(&request.password)?,
            created_at: Utc::now(),
        };
        self.store.insert_admin(&admin).await?;

        info!("Registered admin {}", admin.email);
        Ok(admin)
    }

    /// Check credentials and issue an access token.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken> {
        let invalid = || CampusError::Auth("Invalid credentials".to_string());

        let email = validate_email(email).map_err(|_| invalid())?;
        let admin = self.store.get_admin(&email).await?.ok_or_else(invalid)?;
        if !verify_password(password, &admin.password_hash) {
            warn!("Failed login for {}", email);
            return Err(invalid());
        }

        let access_token = self.issue_token(&admin.email)?;
        info!("Admin {} logged in", admin.email);
        Ok(AuthToken {
            access_token,
            token_type: "bearer".to_string(),
        })
    }

    /// Sign a token for the given admin email.
    pub fn issue_token(&self, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.token_expiry).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| CampusError::Auth(format!("Failed to sign token: {}", e)))
    }

    /// Validate a token and return the admin it belongs to.
    pub async fn verify(&self, token: &str) -> Result<Admin> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| CampusError::Auth(format!("Invalid token: {}", e)))?;

        self.store
            .get_admin(&data.claims.sub)
            .await?
            .ok_or_else(|| CampusError::Auth("Admin account no longer exists".to_string()))
    }
}
