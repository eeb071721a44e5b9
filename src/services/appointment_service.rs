use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AgendaEntry, AgendaQuery, Appointment, AppointmentCreated, AppointmentSource,
    AppointmentStatus, AuditAction, AuditContext, CompleteAppointmentRequest, CompletionResult,
    CreateAppointmentRequest, NewRevenueRecord, SecureBookingInput,
    UpdateAppointmentRequest,
};
use crate::services::audit_service::AuditService;
use crate::services::availability::is_interval_free;
use crate::services::business_service::BusinessService;
use crate::services::catalog_service::CatalogService;
use crate::services::client_service::register_visit;
use crate::services::event_hub::EventHub;
use crate::services::finance_service::insert_revenue;
use crate::services::pricing;
use crate::services::scheduling_service::{
    active_professional_ids, ensure_professional, load_busy, lock_business, SchedulingService,
};
use crate::utils::dates::{day_bounds, local_date, local_to_utc};
use crate::utils::whatsapp::{booking_confirmation, whatsapp_url};

pub(crate) const APPOINTMENT_COLUMNS: &str = "id, user_id, client_id, professional_id, service, \
     service_ids, appointment_time, duration_minutes, price, discount_percent, status, \
     payment_method, notes, custom_service_name, source, public_booking_id, reminder_sent_at, \
     completed_at, created_at, updated_at, deleted_at";

const AGENDA_SELECT: &str = "SELECT a.id, a.client_id, c.name AS client_name, c.phone AS client_phone,
        a.professional_id, t.name AS professional_name, a.service, a.appointment_time,
        a.duration_minutes, a.price, a.status, a.source, a.notes
     FROM appointments a
     LEFT JOIN clients c ON c.id = a.client_id
     LEFT JOIN team_members t ON t.id = a.professional_id";

/// Days a reactivation campaign stays eligible for conversion credit.
const CAMPAIGN_ATTRIBUTION_DAYS: i64 = 30;
const MAX_AGENDA_DAYS: i64 = 62;

#[derive(Clone)]
pub struct AppointmentService {
    db: PgPool,
    audit: AuditService,
    business: BusinessService,
    catalog: CatalogService,
    scheduling: SchedulingService,
}

impl AppointmentService {
    pub fn new(db: PgPool, events: EventHub) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            business: BusinessService::new(db.clone()),
            catalog: CatalogService::new(db.clone()),
            scheduling: SchedulingService::new(db.clone(), events),
            db,
        }
    }

    pub async fn get(&self, business_id: Uuid, appointment_id: Uuid) -> Result<Appointment, AppError> {
        sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL"
        ))
        .bind(appointment_id)
        .bind(business_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Appointment"))
    }

    /// Creates a confirmed appointment from the wizard submission.
    #[tracing::instrument(skip(self, request, ctx))]
    pub async fn create(
        &self,
        business_id: Uuid,
        request: CreateAppointmentRequest,
        ctx: &AuditContext,
    ) -> Result<AppointmentCreated, AppError> {
        let client_id = request
            .client_id
            .ok_or_else(|| AppError::validation("select a client"))?;
        let date = request.date.ok_or_else(|| AppError::validation("select a date"))?;
        let time = request.time.ok_or_else(|| AppError::validation("select a time"))?;
        if request.service_ids.is_empty() && !request.custom_service.enabled {
            return Err(AppError::validation("select at least one service"));
        }

        if request.professional_id.is_none() {
            let mut conn = self.db.acquire().await?;
            if !active_professional_ids(&mut conn, business_id).await?.is_empty() {
                return Err(AppError::validation("select a professional"));
            }
        }

        let profile = self.business.get_profile(business_id).await?;
        let services = self.catalog.services_by_ids(business_id, &request.service_ids).await?;
        let custom = &request.custom_service;

        let price = request
            .price
            .unwrap_or_else(|| pricing::suggested_price(&services, custom));
        let discount = request.discount_percent.unwrap_or(0.0).clamp(0.0, 100.0);
        let offset = profile.region().offset();
        let start = local_to_utc(date, time, offset);
        let label = pricing::service_label(&services, custom);

        let outcome = self
            .scheduling
            .create_secure_booking(SecureBookingInput {
                business_id,
                professional_id: request.professional_id,
                client_id: Some(client_id),
                client_name: None,
                client_phone: None,
                client_email: None,
                service: label.clone(),
                service_ids: services.iter().map(|s| s.id).collect(),
                start,
                duration_minutes: pricing::total_duration(&services, custom),
                price: pricing::final_price(price, discount),
                discount_percent: discount,
                status: AppointmentStatus::Confirmed,
                source: AppointmentSource::Internal,
                public_booking_id: None,
                payment_method: request.payment_method.clone(),
                notes: request.notes.clone(),
                custom_service_name: custom
                    .enabled
                    .then(|| pricing::custom_service_name(custom)),
            })
            .await?;

        let appointment_id = match outcome.appointment_id {
            Some(id) if outcome.success => id,
            _ => return Err(AppError::Conflict(outcome.message)),
        };
        let appointment = self.get(business_id, appointment_id).await?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Create, "appointments")
                    .resource(appointment.id)
                    .values(None, serde_json::to_value(&appointment).ok()),
            )
            .await;

        let confirmation_link = if request.send_whatsapp {
            let client: Option<(String, Option<String>)> =
                sqlx::query_as("SELECT name, phone FROM clients WHERE id = $1 AND user_id = $2")
                    .bind(client_id)
                    .bind(business_id)
                    .fetch_optional(&self.db)
                    .await?;
            client.and_then(|(name, phone)| {
                let phone = phone.filter(|p| !p.trim().is_empty())?;
                let message = booking_confirmation(
                    profile.kind(),
                    &name,
                    &profile.business_name,
                    &start.with_timezone(&offset),
                    &label,
                );
                Some(whatsapp_url(&phone, &urlencoding::encode(&message)))
            })
        } else {
            None
        };

        Ok(AppointmentCreated {
            appointment,
            whatsapp_url: confirmation_link,
        })
    }

    /// Edits an appointment. Switching to another service replaces the price
    /// with that service's price; moving it re-checks availability.
    #[tracing::instrument(skip(self, request, ctx))]
    pub async fn update(
        &self,
        business_id: Uuid,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        ctx: &AuditContext,
    ) -> Result<Appointment, AppError> {
        let before = self.get(business_id, appointment_id).await?;

        let selected = match request.service_id {
            Some(service_id) => Some(self.catalog.get_service(business_id, service_id).await?),
            None => None,
        };
        let (price, duration) = pricing::edited_price_and_duration(
            &before.service_ids,
            selected.as_ref(),
            request.price,
            request.duration_minutes,
        );
        let (service_name, service_ids) = match selected {
            Some(service) => (Some(service.name), Some(vec![service.id])),
            None => (None, None),
        };

        let mut tx = self.db.begin().await?;

        if let Some(professional_id) = request.professional_id {
            ensure_professional(&mut tx, business_id, professional_id, false).await?;
        }

        let moved = request.appointment_time.is_some_and(|t| t != before.appointment_time)
            || request.professional_id.is_some_and(|p| Some(p) != before.professional_id)
            || duration.is_some_and(|d| d != before.duration_minutes);
        let blocking = before.status().is_some_and(|s| s.blocks_slot());

        if moved && blocking {
            lock_business(&mut tx, business_id).await?;
            let start = request.appointment_time.unwrap_or(before.appointment_time);
            let end = start + Duration::minutes(duration.unwrap_or(before.duration_minutes) as i64);
            let busy = load_busy(&mut tx, business_id, start, end, None, Some(appointment_id)).await?;
            let professionals = active_professional_ids(&mut tx, business_id).await?;
            let professional = request.professional_id.or(before.professional_id);
            if !is_interval_free(start, end, professional, &professionals, &busy) {
                return Err(AppError::Conflict("This time slot is no longer available".into()));
            }
        }

        if let Some(client_id) = request.client_id {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM clients WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL)",
            )
            .bind(client_id)
            .bind(business_id)
            .fetch_one(&mut *tx)
            .await?;
            if !exists {
                return Err(AppError::not_found("Client"));
            }
        }

        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "UPDATE appointments SET
                client_id = COALESCE($3, client_id),
                professional_id = COALESCE($4, professional_id),
                service = COALESCE($5, service),
                service_ids = COALESCE($6, service_ids),
                appointment_time = COALESCE($7, appointment_time),
                price = COALESCE($8, price),
                duration_minutes = COALESCE($9, duration_minutes),
                payment_method = COALESCE($10, payment_method),
                notes = COALESCE($11, notes),
                updated_at = NOW()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(appointment_id)
        .bind(business_id)
        .bind(request.client_id)
        .bind(request.professional_id)
        .bind(service_name)
        .bind(service_ids)
        .bind(request.appointment_time)
        .bind(price)
        .bind(duration)
        .bind(&request.payment_method)
        .bind(&request.notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Appointment"))?;

        tx.commit().await?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Update, "appointments")
                    .resource(appointment.id)
                    .values(
                        serde_json::to_value(&before).ok(),
                        serde_json::to_value(&appointment).ok(),
                    ),
            )
            .await;

        Ok(appointment)
    }

    /// Appointments between two business-local dates; defaults to today.
    pub async fn agenda(&self, business_id: Uuid, query: &AgendaQuery) -> Result<Vec<AgendaEntry>, AppError> {
        let offset = self.business.get_profile(business_id).await?.region().offset();
        let today = local_date(Utc::now(), offset);
        let first = query.start.unwrap_or(today);
        let last = query.end.unwrap_or(first);
        if last < first {
            return Err(AppError::validation("end must not be before start"));
        }
        let capped = first
            .checked_add_signed(Duration::days(MAX_AGENDA_DAYS))
            .ok_or_else(|| AppError::validation("start is out of range"))?;
        let last = last.min(capped);
        let (start, _) = day_bounds(first, offset);
        let (_, end) = day_bounds(last, offset);

        let mut sql = format!(
            "{AGENDA_SELECT}
             WHERE a.user_id = $1 AND a.deleted_at IS NULL
               AND a.appointment_time >= $2 AND a.appointment_time < $3"
        );
        let mut param_count = 4;

        if query.professional_id.is_some() {
            sql.push_str(&format!(" AND a.professional_id = ${param_count}"));
            param_count += 1;
        }
        if query.status.is_some() {
            sql.push_str(&format!(" AND a.status = ${param_count}"));
        }
        sql.push_str(" ORDER BY a.appointment_time ASC");

        let mut builder = sqlx::query_as::<_, AgendaEntry>(&sql)
            .bind(business_id)
            .bind(start)
            .bind(end);
        if let Some(professional_id) = query.professional_id {
            builder = builder.bind(professional_id);
        }
        if let Some(status) = &query.status {
            builder = builder.bind(status);
        }

        Ok(builder.fetch_all(&self.db).await?)
    }

    /// Confirmed appointments whose time has already passed.
    pub async fn overdue(&self, business_id: Uuid) -> Result<Vec<AgendaEntry>, AppError> {
        let entries = sqlx::query_as::<_, AgendaEntry>(&format!(
            "{AGENDA_SELECT}
             WHERE a.user_id = $1 AND a.deleted_at IS NULL
               AND a.status = 'Confirmed'
               AND a.appointment_time + make_interval(mins => a.duration_minutes) < NOW()
             ORDER BY a.appointment_time DESC
             LIMIT 100"
        ))
        .bind(business_id)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Completes an appointment, books its revenue and commission, counts the
    /// visit and credits a recent reactivation campaign for the client.
    #[tracing::instrument(skip(self, request, ctx))]
    pub async fn complete(
        &self,
        business_id: Uuid,
        appointment_id: Uuid,
        request: CompleteAppointmentRequest,
        ctx: &AuditContext,
    ) -> Result<CompletionResult, AppError> {
        let mut tx = self.db.begin().await?;

        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
             FOR UPDATE"
        ))
        .bind(appointment_id)
        .bind(business_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Appointment"))?;

        match appointment.status() {
            Some(AppointmentStatus::Completed) => {
                return Err(AppError::Conflict("Appointment already completed".into()))
            }
            Some(status) if status.can_complete() => {}
            _ => {
                return Err(AppError::Conflict(format!(
                    "Appointment with status {} cannot be completed",
                    appointment.status
                )))
            }
        }

        sqlx::query(
            "UPDATE appointments SET
                status = 'Completed',
                completed_at = NOW(),
                payment_method = COALESCE($3, payment_method),
                updated_at = NOW()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(appointment_id)
        .bind(business_id)
        .bind(&request.payment_method)
        .execute(&mut *tx)
        .await?;

        let professional: Option<(String, f64)> = match appointment.professional_id {
            Some(id) => {
                sqlx::query_as("SELECT name, commission_rate FROM team_members WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(business_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };
        let client_name: Option<String> = match appointment.client_id {
            Some(id) => {
                sqlx::query_scalar("SELECT name FROM clients WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        let (professional_name, commission_rate) = match professional {
            Some((name, rate)) => (Some(name), rate),
            None => (None, 0.0),
        };

        let record = insert_revenue(
            &mut tx,
            NewRevenueRecord {
                business_id,
                appointment_id: Some(appointment.id),
                professional_id: appointment.professional_id,
                professional_name,
                client_name,
                service_name: appointment.service.clone(),
                revenue: appointment.price,
                commission_rate,
            },
        )
        .await?;

        let mut recovered_campaign_id = None;
        if let Some(client_id) = appointment.client_id {
            register_visit(&mut tx, client_id, appointment.appointment_time).await?;

            recovered_campaign_id = sqlx::query_scalar(
                "UPDATE aios_campaigns SET converted_appointment_id = $3, recovered_revenue = $4
                 WHERE id = (
                    SELECT id FROM aios_campaigns
                    WHERE user_id = $1 AND client_id = $2
                      AND converted_appointment_id IS NULL
                      AND sent_at >= NOW() - make_interval(days => $5)
                    ORDER BY sent_at DESC
                    LIMIT 1
                 )
                 RETURNING id",
            )
            .bind(business_id)
            .bind(client_id)
            .bind(appointment.id)
            .bind(appointment.price)
            .bind(CAMPAIGN_ATTRIBUTION_DAYS as i32)
            .fetch_optional(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        if let Some(campaign_id) = recovered_campaign_id {
            tracing::info!(%campaign_id, revenue = appointment.price, "campaign converted");
        }

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Complete, "appointments")
                    .resource(appointment.id)
                    .metadata(serde_json::json!({
                        "revenue": record.revenue,
                        "commission": record.commission_value,
                    })),
            )
            .await;

        Ok(CompletionResult {
            appointment_id: appointment.id,
            revenue: record.revenue,
            commission: record.commission_value,
            recovered_campaign_id,
        })
    }

    pub async fn cancel(&self, business_id: Uuid, appointment_id: Uuid, ctx: &AuditContext) -> Result<Appointment, AppError> {
        self.transition(business_id, appointment_id, AppointmentStatus::Cancelled, AuditAction::Cancel, ctx)
            .await
    }

    pub async fn mark_no_show(&self, business_id: Uuid, appointment_id: Uuid, ctx: &AuditContext) -> Result<Appointment, AppError> {
        self.transition(business_id, appointment_id, AppointmentStatus::NoShow, AuditAction::Update, ctx)
            .await
    }

    async fn transition(
        &self,
        business_id: Uuid,
        appointment_id: Uuid,
        next: AppointmentStatus,
        action: AuditAction,
        ctx: &AuditContext,
    ) -> Result<Appointment, AppError> {
        let before = self.get(business_id, appointment_id).await?;
        if before.status() == Some(AppointmentStatus::Completed) {
            return Err(AppError::Conflict("Completed appointments cannot change status".into()));
        }

        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "UPDATE appointments SET status = $3, updated_at = NOW()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL AND status <> 'Completed'
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(appointment_id)
        .bind(business_id)
        .bind(next.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Conflict("Completed appointments cannot change status".into()))?;

        self.audit
            .record_quietly(
                ctx.entry(action, "appointments")
                    .resource(appointment.id)
                    .values(
                        Some(serde_json::json!({ "status": before.status })),
                        Some(serde_json::json!({ "status": appointment.status })),
                    ),
            )
            .await;

        Ok(appointment)
    }

    pub async fn delete(&self, business_id: Uuid, appointment_id: Uuid, ctx: &AuditContext) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE appointments SET deleted_at = NOW()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(appointment_id)
        .bind(business_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Appointment"));
        }

        self.audit
            .record_quietly(ctx.entry(AuditAction::Delete, "appointments").resource(appointment_id))
            .await;
        Ok(())
    }
}
