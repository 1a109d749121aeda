//! # SMS Log Repository
//!
//! Append-only audit trail of invite dispatches. One row per attempt,
//! whether the provider accepted the message or not.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use splitpay_core::{SmsLog, SmsStatus};

/// Repository for SMS log operations.
#[derive(Debug, Clone)]
pub struct SmsLogRepository {
    pool: SqlitePool,
}

impl SmsLogRepository {
    /// Creates a new SmsLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SmsLogRepository { pool }
    }

    /// Records one dispatch attempt.
    pub async fn record(
        &self,
        split_id: &str,
        phone: &str,
        message: &str,
        provider_message_id: Option<&str>,
        status: SmsStatus,
    ) -> DbResult<SmsLog> {
        let log = SmsLog {
            id: Uuid::new_v4().to_string(),
            split_id: split_id.to_string(),
            phone: phone.to_string(),
            message: message.to_string(),
            provider_message_id: provider_message_id.map(str::to_string),
            status,
            created_at: super::now(),
        };

        debug!(split_id = %split_id, status = ?status, "Recording SMS dispatch");

        sqlx::query(
            r#"
            INSERT INTO sms_logs (id, split_id, phone, message, provider_message_id, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&log.id)
        .bind(&log.split_id)
        .bind(&log.phone)
        .bind(&log.message)
        .bind(&log.provider_message_id)
        .bind(log.status)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;

        Ok(log)
    }

    /// All dispatches for a split, oldest first.
    pub async fn list_for_split(&self, split_id: &str) -> DbResult<Vec<SmsLog>> {
        let logs = sqlx::query_as::<_, SmsLog>(
            r#"
            SELECT id, split_id, phone, message, provider_message_id, status, created_at
            FROM sms_logs
            WHERE split_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(split_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
