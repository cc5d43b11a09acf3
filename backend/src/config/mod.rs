//! Application configuration management

use std::env;

use anyhow::{Context, Result};
use base64::Engine;
use rand::RngCore;

use crate::services::{AuthConfig, EventBusConfig};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// SQLite connection URL
    pub database_url: String,

    pub database_max_connections: u32,

    /// JWT secret for signing and verifying session tokens
    pub jwt_secret: String,

    /// Session token lifetime in seconds
    pub token_lifetime: i64,

    /// Bcrypt cost factor for password hashes
    pub bcrypt_cost: u32,

    /// Password given to users registered without one
    pub initial_user_password: String,

    /// Per-subscriber buffer of the catalog event bus
    pub event_bus_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // Without JWT_SECRET tokens only survive until restart
        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set, generating an ephemeral development secret");
                generate_secret()
            }
        };

        Ok(Self {
            host: var_or("HOST", "0.0.0.0"),

            port: var_or("PORT", "4000").parse().context("Invalid PORT")?,

            database_url: var_or("DATABASE_URL", "sqlite:./data/bookshelf.db"),

            database_max_connections: var_or("DATABASE_MAX_CONNECTIONS", "10")
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,

            jwt_secret,

            token_lifetime: var_or("TOKEN_LIFETIME", "86400")
                .parse()
                .context("Invalid TOKEN_LIFETIME")?,

            bcrypt_cost: var_or("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())
                .parse()
                .context("Invalid BCRYPT_COST")?,

            initial_user_password: var_or("INITIAL_USER_PASSWORD", "secret"),

            event_bus_capacity: var_or("EVENT_BUS_CAPACITY", "256")
                .parse()
                .context("Invalid EVENT_BUS_CAPACITY")?,
        })
    }

    pub fn auth(&self) -> AuthConfig {
        AuthConfig {
            jwt_secret: self.jwt_secret.clone(),
            token_lifetime: self.token_lifetime,
            bcrypt_cost: self.bcrypt_cost,
            initial_password: self.initial_user_password.clone(),
        }
    }

    pub fn event_bus(&self) -> EventBusConfig {
        EventBusConfig {
            capacity: self.event_bus_capacity,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.bind_addr(), "0.0.0.0:4000");
        assert_eq!(config.database_url, "sqlite:./data/bookshelf.db");
        assert_eq!(config.token_lifetime, 86400);
        assert_eq!(config.initial_user_password, "secret");
        assert_eq!(config.event_bus().capacity, 256);
        assert!(!config.jwt_secret.is_empty());
    }

    #[test]
    fn test_generated_secrets_differ() {
        let a = config(&[]).unwrap();
        let b = config(&[]).unwrap();
        assert_ne!(a.jwt_secret, b.jwt_secret);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("JWT_SECRET", "s3cret"),
            ("TOKEN_LIFETIME", "60"),
            ("BCRYPT_COST", "4"),
            ("INITIAL_USER_PASSWORD", "hunter2"),
        ])
        .unwrap();

        let auth = config.auth();
        assert_eq!(config.port, 8080);
        assert_eq!(auth.jwt_secret, "s3cret");
        assert_eq!(auth.token_lifetime, 60);
        assert_eq!(auth.bcrypt_cost, 4);
        assert_eq!(auth.initial_password, "hunter2");
    }

    #[test]
    fn test_invalid_port() {
        let err = config(&[("PORT", "not-a-port")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
