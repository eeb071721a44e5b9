use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AppointmentStatus, AuditAction, AuditContext, DeletedItem, RecycleKind};
use crate::services::audit_service::AuditService;
use crate::services::availability::is_interval_free;
use crate::services::scheduling_service::{active_professional_ids, load_busy, lock_business};

const MAX_ITEMS: i64 = 200;

/// Soft-deleted clients, services, team members and appointments.
#[derive(Clone)]
pub struct RecycleBinService {
    db: PgPool,
    audit: AuditService,
}

impl RecycleBinService {
    pub fn new(db: PgPool) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            db,
        }
    }

    /// Everything in the bin, most recently deleted first.
    pub async fn list(&self, business_id: Uuid) -> Result<Vec<DeletedItem>, AppError> {
        let items = sqlx::query_as::<_, DeletedItem>(
            "SELECT kind, id, label, deleted_at FROM (
                SELECT 'client' AS kind, id, name AS label, deleted_at
                  FROM clients WHERE user_id = $1 AND deleted_at IS NOT NULL
                UNION ALL
                SELECT 'service', id, name, deleted_at
                  FROM services WHERE user_id = $1 AND deleted_at IS NOT NULL
                UNION ALL
                SELECT 'team_member', id, name, deleted_at
                  FROM team_members WHERE user_id = $1 AND deleted_at IS NOT NULL
                UNION ALL
                SELECT 'appointment', id, service, deleted_at
                  FROM appointments WHERE user_id = $1 AND deleted_at IS NOT NULL
             ) AS bin
             ORDER BY deleted_at DESC
             LIMIT $2",
        )
        .bind(business_id)
        .bind(MAX_ITEMS)
        .fetch_all(&self.db)
        .await?;
        Ok(items)
    }

    /// Brings an item back. An appointment whose slot was taken in the
    /// meantime stays in the bin.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn restore(
        &self,
        business_id: Uuid,
        kind: RecycleKind,
        id: Uuid,
        ctx: &AuditContext,
    ) -> Result<(), AppError> {
        let table = kind.table();
        let mut tx = self.db.begin().await?;

        if kind == RecycleKind::Appointment {
            let row: Option<(Option<Uuid>, DateTime<Utc>, i32, String)> = sqlx::query_as(
                "SELECT professional_id, appointment_time, duration_minutes, status
                 FROM appointments
                 WHERE id = $1 AND user_id = $2 AND deleted_at IS NOT NULL",
            )
            .bind(id)
            .bind(business_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some((professional, start, duration, status)) = row {
                if AppointmentStatus::from_str(&status).is_some_and(|s| s.blocks_slot()) {
                    lock_business(&mut tx, business_id).await?;
                    let end = start + Duration::minutes(duration as i64);
                    let busy = load_busy(&mut tx, business_id, start, end, None, Some(id)).await?;
                    let professionals = active_professional_ids(&mut tx, business_id).await?;
                    if !is_interval_free(start, end, professional, &professionals, &busy) {
                        return Err(AppError::Conflict(
                            "The time slot of this appointment is now taken".to_string(),
                        ));
                    }
                }
            }
        }

        let restored = sqlx::query(&format!(
            "UPDATE {table} SET deleted_at = NULL, updated_at = NOW()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NOT NULL"
        ))
        .bind(id)
        .bind(business_id)
        .execute(&mut *tx)
        .await?;

        if restored.rows_affected() == 0 {
            return Err(AppError::not_found("Deleted item"));
        }
        tx.commit().await?;

        tracing::info!(%id, table, "item restored");
        self.audit
            .record_quietly(ctx.entry(AuditAction::Restore, table).resource(id))
            .await;
        Ok(())
    }
}
