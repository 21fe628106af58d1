//! # Audit Log Repository
//!
//! Append and query the audit log. There is no update or delete: a trigger
//! rejects `UPDATE` on `audit_logs` and nothing here issues `DELETE`.

use sqlx::SqlitePool;

use crate::error::DbResult;
use tally_core::{AuditEntityType, AuditLogEntry, PageRequest};

#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: SqlitePool,
}

impl AuditLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditLogRepository { pool }
    }

    /// Appends one entry.
    pub async fn insert(&self, entry: &AuditLogEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, user_id, action, entity_type, entity_id, changes, ip_address, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.changes)
        .bind(&entry.ip_address)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// One page of the log, newest first, optionally for one entity type.
    pub async fn list(
        &self,
        entity_type: Option<AuditEntityType>,
        page: &PageRequest,
    ) -> DbResult<(Vec<AuditLogEntry>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_logs WHERE (?1 IS NULL OR entity_type = ?1)",
        )
        .bind(entity_type)
        .fetch_one(&self.pool)
        .await?;

        let entries = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT * FROM audit_logs
            WHERE (?1 IS NULL OR entity_type = ?1)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(entity_type)
        .bind(i64::from(page.limit()))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((entries, total))
    }

    /// Every entry for one entity, oldest first.
    pub async fn for_entity(
        &self,
        entity_type: AuditEntityType,
        entity_id: &str,
    ) -> DbResult<Vec<AuditLogEntry>> {
        let entries = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT * FROM audit_logs
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY rowid ASC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
