//! Identity service: user registration, login and bearer-token resolution
//!
//! Provides:
//! - User creation with bcrypt-hashed credentials
//! - Login issuing HS256 JWTs that embed `{username, id}`
//! - Resolution of the current user from an `Authorization` header

use anyhow::anyhow;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::db::{CreateUser, Database, StoreError, UserRecord};

use super::error::{ServiceError, ServiceResult};

// ============================================================================
// JWT Claims
// ============================================================================

/// Claims embedded in session tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub username: String,
    /// User ID
    pub id: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

// ============================================================================
// Configuration
// ============================================================================

/// Auth service configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,
    /// Token lifetime in seconds (default: 24 hours)
    pub token_lifetime: i64,
    /// Bcrypt cost factor
    pub bcrypt_cost: u32,
    /// Password assigned to users registered without one
    pub initial_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production".to_string(),
            token_lifetime: 24 * 60 * 60,
            bcrypt_cost: DEFAULT_COST,
            initial_password: "secret".to_string(),
        }
    }
}

// ============================================================================
// Bearer parsing
// ============================================================================

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively; anything other than
/// `Bearer <token>` yields `None`.
pub fn bearer_token(header: &str) -> Option<&str> {
    let scheme = header.get(..7)?;
    if !scheme.eq_ignore_ascii_case("bearer ") {
        return None;
    }
    let token = header.get(7..)?.trim();
    (!token.is_empty()).then_some(token)
}

// ============================================================================
// Auth Service
// ============================================================================

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(db: Database, config: AuthConfig) -> Self {
        Self { db, config }
    }

    /// Register a new user.
    ///
    /// Without a password the configured initial password is used, hashed
    /// per user like any other credential.
    pub async fn create_user(
        &self,
        username: &str,
        favorite_genre: &str,
        password: Option<&str>,
    ) -> ServiceResult<UserRecord> {
        let args = json!({ "username": username, "favoriteGenre": favorite_genre });
        let password = password.unwrap_or(&self.config.initial_password);
        let password_hash = self.hash_password(password)?;

        let user = self
            .db
            .users()
            .create(CreateUser {
                username: username.to_string(),
                favorite_genre: favorite_genre.to_string(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate { .. } | StoreError::Invalid { .. } => {
                    ServiceError::invalid_input(e, args)
                }
                other => ServiceError::Store(other),
            })?;

        info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Verify credentials and issue a session token
    pub async fn login(&self, username: &str, password: &str) -> ServiceResult<String> {
        let wrong_credentials =
            || ServiceError::invalid_input("wrong credentials", json!({ "username": username }));

        let Some(user) = self.db.users().get_by_username(username).await? else {
            debug!(username = %username, "Login for unknown user");
            return Err(wrong_credentials());
        };

        if !self.verify_password(password, &user.password_hash)? {
            debug!(user_id = %user.id, "Login with wrong password");
            return Err(wrong_credentials());
        }

        let token = self.issue_token(&user)?;
        info!(user_id = %user.id, "User logged in");
        Ok(token)
    }

    /// Resolve the current user from an optional `Authorization` header.
    ///
    /// Every failure (missing or malformed header, bad signature, expired
    /// token, unknown user, store error) resolves to `None`.
    pub async fn resolve_current_user(&self, header: Option<&str>) -> Option<UserRecord> {
        let token = match header {
            Some(value) => match bearer_token(value) {
                Some(token) => token,
                None => {
                    debug!("Ignoring malformed Authorization header");
                    return None;
                }
            },
            None => return None,
        };

        let claims = match self.verify_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Rejected bearer token");
                return None;
            }
        };

        match self.db.users().get_by_id(&claims.id).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                warn!(user_id = %claims.id, "Token references unknown user");
                None
            }
            Err(e) => {
                warn!(error = %e, "User lookup failed while resolving token");
                None
            }
        }
    }

    /// Decode and validate a session token
    pub fn verify_token(&self, token: &str) -> anyhow::Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| anyhow!("Invalid token: {}", e))?;

        Ok(token_data.claims)
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn issue_token(&self, user: &UserRecord) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            username: user.username.clone(),
            id: user.id.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.config.token_lifetime)).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| anyhow!("Failed to create token: {}", e))
    }

    /// Hash a password with bcrypt
    fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        hash(password, self.config.bcrypt_cost).map_err(|e| anyhow!("Failed to hash password: {}", e))
    }

    /// Verify a password against a hash
    fn verify_password(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        verify(password, hash).map_err(|e| anyhow!("Failed to verify password: {}", e))
    }
}
