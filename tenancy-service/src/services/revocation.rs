use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use service_core::error::AppError;

/// Session revocation list. The identity provider publishes revocations
/// (logout, compromise) keyed by session id; entries expire with the
/// session's own lifetime.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn is_revoked(&self, session_id: &str) -> Result<bool, AppError>;
    async fn revoke(&self, session_id: &str, expiry_seconds: i64) -> Result<(), AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct RedisRevocations {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisRevocations {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, AppError> {
        tracing::info!(url = %config.url, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // ConnectionManager reconnects on its own after drops.
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            AppError::InternalError(anyhow::anyhow!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl RevocationStore for RedisRevocations {
    async fn is_revoked(&self, session_id: &str) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let key = format!("revoked:{}", session_id);

        let exists: bool = redis::cmd("EXISTS")
            .arg(&key)
            .query_async(&mut conn)
            .await?;

        Ok(exists)
    }

    async fn revoke(&self, session_id: &str, expiry_seconds: i64) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let key = format!("revoked:{}", session_id);

        redis::cmd("SET")
            .arg(&key)
            .arg("revoked")
            .arg("EX")
            .arg(expiry_seconds)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(AppError::from)
    }
}

/// In-memory revocation list for tests.
#[derive(Default)]
pub struct MemoryRevocations {
    revoked: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl MemoryRevocations {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocations {
    async fn is_revoked(&self, session_id: &str) -> Result<bool, AppError> {
        let revoked = self
            .revoked
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?;
        Ok(revoked.contains(session_id))
    }

    async fn revoke(&self, session_id: &str, _expiry_seconds: i64) -> Result<(), AppError> {
        self.revoked
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?
            .insert(session_id.to_string());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
