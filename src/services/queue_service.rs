use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AppointmentSource, AuditAction, AuditContext, JoinQueueRequest, NewRevenueRecord,
    QueueEntry, QueueMetrics, QueuePosition, QueueStatus, Region, DEFAULT_SERVICE_DURATION,
};
use crate::services::audit_service::AuditService;
use crate::services::client_service::{find_or_create_by_phone, register_visit};
use crate::services::finance_service::insert_revenue;
use crate::utils::dates::{day_bounds, local_date};

const QUEUE_COLUMNS: &str = "id, business_id, client_name, client_phone, client_id, service_id, \
     professional_id, status, created_at, updated_at";

const WALK_IN_SERVICE: &str = "Atendimento";

/// Walk-in queue of a business.
#[derive(Clone)]
pub struct QueueService {
    db: PgPool,
    audit: AuditService,
}

impl QueueService {
    pub fn new(db: PgPool) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            db,
        }
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn join(&self, slug: &str, request: JoinQueueRequest) -> Result<QueuePosition, AppError> {
        let business_id: Uuid = sqlx::query_scalar("SELECT id FROM profiles WHERE business_slug = $1")
            .bind(slug)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Business"))?;

        if let Some(service_id) = request.service_id {
            self.ensure_owned("services", business_id, service_id, "Service").await?;
        }
        if let Some(professional_id) = request.professional_id {
            self.ensure_owned("team_members", business_id, professional_id, "Professional").await?;
        }

        let entry = sqlx::query_as::<_, QueueEntry>(&format!(
            "INSERT INTO queue_entries (id, business_id, client_name, client_phone, service_id, professional_id, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'waiting')
             RETURNING {QUEUE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(business_id)
        .bind(request.client_name.trim())
        .bind(request.client_phone.trim())
        .bind(request.service_id)
        .bind(request.professional_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(entry_id = %entry.id, %business_id, "joined queue");
        self.position(entry.id).await
    }

    async fn ensure_owned(&self, table: &str, business_id: Uuid, id: Uuid, label: &str) -> Result<(), AppError> {
        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL)"
        ))
        .bind(id)
        .bind(business_id)
        .fetch_one(&self.db)
        .await?;

        if exists {
            Ok(())
        } else {
            Err(AppError::not_found(label))
        }
    }

    /// Place in line: one plus the waiting entries that arrived earlier.
    pub async fn position(&self, entry_id: Uuid) -> Result<QueuePosition, AppError> {
        let entry = sqlx::query_as::<_, QueueEntry>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queue_entries WHERE id = $1"
        ))
        .bind(entry_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Queue entry"))?;

        let ahead: i64 = if entry.status == QueueStatus::Waiting.as_str() {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM queue_entries
                 WHERE business_id = $1 AND status = 'waiting' AND created_at < $2",
            )
            .bind(entry.business_id)
            .bind(entry.created_at)
            .fetch_one(&self.db)
            .await?
        } else {
            0
        };

        Ok(QueuePosition::new(entry.id, entry.status, ahead))
    }

    /// Entries still being handled, oldest first.
    pub async fn list(&self, business_id: Uuid) -> Result<Vec<QueueEntry>, AppError> {
        let entries = sqlx::query_as::<_, QueueEntry>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queue_entries
             WHERE business_id = $1 AND status IN ('waiting', 'calling', 'serving')
             ORDER BY created_at ASC"
        ))
        .bind(business_id)
        .fetch_all(&self.db)
        .await?;
        Ok(entries)
    }

    pub async fn metrics(&self, business_id: Uuid) -> Result<QueueMetrics, AppError> {
        let region: String = sqlx::query_scalar("SELECT region FROM profiles WHERE id = $1")
            .bind(business_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Business"))?;
        let offset = Region::from_str(&region).offset();
        let (start, end) = day_bounds(local_date(Utc::now(), offset), offset);

        let (waiting, serving, completed_today): (i64, i64, i64) = sqlx::query_as(
            "SELECT
                COUNT(*) FILTER (WHERE status IN ('waiting', 'calling')),
                COUNT(*) FILTER (WHERE status = 'serving'),
                COUNT(*) FILTER (WHERE status = 'completed' AND updated_at >= $2 AND updated_at < $3)
             FROM queue_entries
             WHERE business_id = $1",
        )
        .bind(business_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await?;

        Ok(QueueMetrics {
            waiting,
            serving,
            completed_today,
        })
    }

    /// Moves an entry forward. Completing it records the visit, a completed
    /// appointment and its revenue.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn transition(
        &self,
        business_id: Uuid,
        entry_id: Uuid,
        next: QueueStatus,
        ctx: &AuditContext,
    ) -> Result<QueueEntry, AppError> {
        let mut tx = self.db.begin().await?;

        let entry = sqlx::query_as::<_, QueueEntry>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queue_entries
             WHERE id = $1 AND business_id = $2
             FOR UPDATE"
        ))
        .bind(entry_id)
        .bind(business_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Queue entry"))?;

        let current = QueueStatus::from_str(&entry.status)
            .ok_or_else(|| AppError::Conflict(format!("Unknown queue status {}", entry.status)))?;
        if !current.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "Cannot move from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }

        let mut client_id = entry.client_id;
        if next == QueueStatus::Completed {
            let now = Utc::now();
            let (id, client_name) =
                find_or_create_by_phone(&mut tx, business_id, &entry.client_name, &entry.client_phone, None).await?;
            client_id = Some(id);

            let service: Option<(String, f64, i32)> = match entry.service_id {
                Some(service_id) => {
                    sqlx::query_as("SELECT name, price, duration_minutes FROM services WHERE id = $1 AND user_id = $2")
                        .bind(service_id)
                        .bind(business_id)
                        .fetch_optional(&mut *tx)
                        .await?
                }
                None => None,
            };
            let (service_name, price, duration) =
                service.unwrap_or_else(|| (WALK_IN_SERVICE.to_string(), 0.0, DEFAULT_SERVICE_DURATION));

            let professional: Option<(String, f64)> = match entry.professional_id {
                Some(professional_id) => {
                    sqlx::query_as("SELECT name, commission_rate FROM team_members WHERE id = $1 AND user_id = $2")
                        .bind(professional_id)
                        .bind(business_id)
                        .fetch_optional(&mut *tx)
                        .await?
                }
                None => None,
            };
            let (professional_name, commission_rate) = match professional {
                Some((name, rate)) => (Some(name), rate),
                None => (None, 0.0),
            };

            let appointment_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO appointments (
                    id, user_id, client_id, professional_id, service, service_ids,
                    appointment_time, duration_minutes, price, status, source, completed_at
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'Completed', $10, $7)",
            )
            .bind(appointment_id)
            .bind(business_id)
            .bind(id)
            .bind(entry.professional_id)
            .bind(&service_name)
            .bind(entry.service_id.into_iter().collect::<Vec<Uuid>>())
            .bind(now)
            .bind(duration)
            .bind(price)
            .bind(AppointmentSource::Queue.as_str())
            .execute(&mut *tx)
            .await?;

            insert_revenue(
                &mut tx,
                NewRevenueRecord {
                    business_id,
                    appointment_id: Some(appointment_id),
                    professional_id: entry.professional_id,
                    professional_name,
                    client_name: Some(client_name),
                    service_name,
                    revenue: price,
                    commission_rate,
                },
            )
            .await?;
            register_visit(&mut tx, id, now).await?;
        }

        let updated = sqlx::query_as::<_, QueueEntry>(&format!(
            "UPDATE queue_entries SET status = $3, client_id = $4, updated_at = NOW()
             WHERE id = $1 AND business_id = $2
             RETURNING {QUEUE_COLUMNS}"
        ))
        .bind(entry_id)
        .bind(business_id)
        .bind(next.as_str())
        .bind(client_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Update, "queue_entries")
                    .resource(updated.id)
                    .values(
                        Some(serde_json::json!({ "status": entry.status })),
                        Some(serde_json::json!({ "status": updated.status })),
                    ),
            )
            .await;

        Ok(updated)
    }
}
