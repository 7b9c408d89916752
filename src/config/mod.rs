use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Secret used when running locally without `JWT_SECRET`.
const DEVELOPMENT_JWT_SECRET: &str = "fieldops-development-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub port: u16,
    pub auth: AuthConfig,
    pub store: StoreConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub token_leeway_secs: u64,
    pub role_lookup_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgrest,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub supabase_url: Option<String>,
    #[serde(skip_serializing)]
    pub supabase_key: Option<String>,
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn role_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.role_lookup_timeout_ms)
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgrest" | "supabase" => Ok(StoreBackend::Postgrest),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid { name: "STORE_BACKEND", value: s.to_string() }),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        let config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()?;

        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(v) = env::var("PORT") {
            self.port = v.parse().unwrap_or(self.port);
        }

        // Auth overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = env::var("TOKEN_TTL_SECS") {
            self.auth.token_ttl_secs = v.parse().unwrap_or(self.auth.token_ttl_secs);
        }
        if let Ok(v) = env::var("TOKEN_LEEWAY_SECS") {
            self.auth.token_leeway_secs = v.parse().unwrap_or(self.auth.token_leeway_secs);
        }
        if let Ok(v) = env::var("ROLE_LOOKUP_TIMEOUT_MS") {
            self.auth.role_lookup_timeout_ms = v.parse().unwrap_or(self.auth.role_lookup_timeout_ms);
        }

        // Store overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.store.backend = v.parse()?;
        }
        if let Ok(v) = env::var("SUPABASE_URL") {
            self.store.supabase_url = Some(v);
        }
        if let Ok(v) = env::var("SUPABASE_KEY") {
            self.store.supabase_key = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Ok(v) = env::var("STORE_REQUEST_TIMEOUT_SECS") {
            self.store.request_timeout_secs = v.parse().unwrap_or(self.store.request_timeout_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }

        Ok(self)
    }

    /// Refuse to start without the settings the chosen backend needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        match self.store.backend {
            StoreBackend::Postgrest => {
                if self.store.supabase_url.as_deref().unwrap_or_default().is_empty() {
                    return Err(ConfigError::Missing("SUPABASE_URL"));
                }
                if self.store.supabase_key.as_deref().unwrap_or_default().is_empty() {
                    return Err(ConfigError::Missing("SUPABASE_KEY"));
                }
            }
            StoreBackend::Postgres => {
                if self.store.database_url.as_deref().unwrap_or_default().is_empty() {
                    return Err(ConfigError::Missing("DATABASE_URL"));
                }
            }
            StoreBackend::Memory => {
                if self.environment == Environment::Production {
                    return Err(ConfigError::Invalid { name: "STORE_BACKEND", value: "memory".to_string() });
                }
            }
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn uses_development_secret(&self) -> bool {
        self.auth.jwt_secret == DEVELOPMENT_JWT_SECRET
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            port: 3000,
            auth: AuthConfig {
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                token_ttl_secs: 3600,
                token_leeway_secs: 30,
                role_lookup_timeout_ms: 2000,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgrest,
                supabase_url: None,
                supabase_key: None,
                database_url: None,
                max_connections: 5,
                request_timeout_secs: 10,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec![],
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            port: 3000,
            auth: AuthConfig {
                jwt_secret: String::new(),
                token_ttl_secs: 3600,
                token_leeway_secs: 10,
                role_lookup_timeout_ms: 2000,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgrest,
                supabase_url: None,
                supabase_key: None,
                database_url: None,
                max_connections: 10,
                request_timeout_secs: 5,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec![],
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            port: 3000,
            auth: AuthConfig {
                jwt_secret: String::new(),
                token_ttl_secs: 3600,
                token_leeway_secs: 5,
                role_lookup_timeout_ms: 1500,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgrest,
                supabase_url: None,
                supabase_key: None,
                database_url: None,
                max_connections: 20,
                request_timeout_secs: 5,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec![],
            },
        }
    }

    /// Self-contained configuration backed by the in-memory store.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        let mut config = Self::development();
        config.auth.jwt_secret = jwt_secret.into();
        config.store.backend = StoreBackend::Memory;
        config
    }
}
