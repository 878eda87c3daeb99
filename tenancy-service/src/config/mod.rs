use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::routes::{DEFAULT_PUBLIC_ROUTES, DEFAULT_WEBHOOK_ROUTES};

#[derive(Debug, Clone, Deserialize)]
pub struct TenancyConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub mongodb: MongoConfig,
    pub redis: RedisConfig,
    pub session: SessionConfig,
    pub security: SecurityConfig,
    pub routes: RouteConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Verification settings for provider-issued session tokens. The identity
/// provider signs; this service only ever verifies.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub public_key_path: String,
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub admin_api_key: String,
    pub stripe_webhook_secret: String,
    pub clerk_webhook_secret: String,
    /// Maximum clock skew accepted on a signed webhook delivery.
    pub webhook_tolerance_seconds: i64,
}

/// Static route classification entries. Paths ending in `*` match as
/// prefixes; everything else is exact. Any path not listed is protected.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub public_paths: Vec<String>,
    pub webhook_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl TenancyConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = TenancyConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("tenancy-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .unwrap_or(10),
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?
                    .parse()
                    .unwrap_or(1),
            },
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", None, is_prod)?,
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", None, is_prod)?,
            },
            session: SessionConfig {
                public_key_path: get_env("SESSION_PUBLIC_KEY_PATH", None, is_prod)?,
                issuer: env::var("SESSION_ISSUER").ok().filter(|s| !s.is_empty()),
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                admin_api_key: get_env("ADMIN_API_KEY", None, true)?,
                stripe_webhook_secret: get_env("STRIPE_WEBHOOK_SECRET", None, is_prod)?,
                clerk_webhook_secret: get_env("CLERK_WEBHOOK_SECRET", None, is_prod)?,
                webhook_tolerance_seconds: get_env("WEBHOOK_TOLERANCE_SECONDS", Some("300"), is_prod)?
                    .parse()
                    .unwrap_or(300),
            },
            routes: RouteConfig {
                public_paths: get_env(
                    "PUBLIC_ROUTES",
                    Some(&DEFAULT_PUBLIC_ROUTES.join(",")),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                webhook_paths: get_env(
                    "WEBHOOK_ROUTES",
                    Some(&DEFAULT_WEBHOOK_ROUTES.join(",")),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                global_ip_limit: get_env("RATE_LIMIT_GLOBAL_IP_LIMIT", Some("100"), is_prod)?
                    .parse()
                    .unwrap_or(100),
                global_ip_window_seconds: get_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(60),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.security.webhook_tolerance_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "WEBHOOK_TOLERANCE_SECONDS must be positive"
            )));
        }

        for path in self
            .routes
            .public_paths
            .iter()
            .chain(self.routes.webhook_paths.iter())
        {
            if !path.starts_with('/') {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Route entry '{}' must start with '/'",
                    path
                )));
            }
        }

        // Each path maps to exactly one class; a double listing is a
        // misconfiguration, not a tie to break at request time.
        if let Some(dup) = self
            .routes
            .public_paths
            .iter()
            .find(|p| self.routes.webhook_paths.contains(p))
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Route entry '{}' is listed as both public and webhook",
                dup
            )));
        }

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
