//! Audit trail for denied cross-tenant access attempts.
//!
//! Append is fire-and-forget: a sink failure is logged and swallowed,
//! never surfaced into the access decision itself.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use mongodb::{Client, Collection, Database};
use service_core::error::AppError;

use crate::models::ViolationRecord;

const VIOLATIONS_COLLECTION: &str = "isolation_violations";

/// Append-only store of violation records, queryable by recency for
/// forensic review.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: &ViolationRecord) -> Result<(), AppError>;
    async fn recent(&self, limit: i64) -> Result<Vec<ViolationRecord>, AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
}

pub struct MongoAuditSink {
    db: Database,
}

impl MongoAuditSink {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB audit store");
        let client = Client::with_uri_str(uri).await?;
        Ok(Self {
            db: client.database(database),
        })
    }

    fn violations(&self) -> Collection<ViolationRecord> {
        self.db.collection(VIOLATIONS_COLLECTION)
    }
}

#[async_trait]
impl AuditSink for MongoAuditSink {
    async fn append(&self, record: &ViolationRecord) -> Result<(), AppError> {
        self.violations().insert_one(record, None).await?;
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ViolationRecord>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "occurred_at": -1 })
            .limit(limit)
            .build();
        let cursor = self.violations().find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}

/// In-memory sink for tests; keeps records in append order.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: std::sync::Mutex<Vec<ViolationRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ViolationRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: &ViolationRecord) -> Result<(), AppError> {
        self.records
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?
            .push(record.clone());
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ViolationRecord>, AppError> {
        let records = self
            .records
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?;
        Ok(records.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Front door for violation logging.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Record a violation without blocking the caller. The access decision
    /// has already been made; losing the record is an observability gap,
    /// not an enforcement gap.
    pub fn record_violation(&self, record: ViolationRecord) {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.append(&record).await {
                tracing::error!(
                    error = %e,
                    resource_path = %record.resource_path,
                    "Failed to write isolation violation record"
                );
            } else {
                tracing::warn!(
                    actor_user_id = %record.actor_user_id,
                    resource_path = %record.resource_path,
                    attempted_tenant_id = %record.attempted_tenant_id,
                    "Cross-tenant access attempt recorded"
                );
            }
        });
    }

    /// Synchronous append, for callers that must observe the write.
    pub async fn record_violation_sync(&self, record: ViolationRecord) -> Result<(), AppError> {
        self.sink.append(&record).await
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<ViolationRecord>, AppError> {
        self.sink.recent(limit).await
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.sink.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recent_returns_newest_first() {
        let sink = MemoryAuditSink::new();
        for n in 0..3 {
            sink.append(&ViolationRecord::new(
                format!("user-{}", n),
                Some("tenant-a-uuid".to_string()),
                format!("dealerships/resource-{}", n),
                "tenant-b-uuid",
                None,
            ))
            .await
            .unwrap();
        }

        let recent = sink.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].actor_user_id, "user-2");
        assert_eq!(recent[1].actor_user_id, "user-1");
    }
}
