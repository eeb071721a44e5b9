use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AgendaEntry, AppointmentSource, AppointmentStatus, AuditAction, AuditContext, BookingEvent,
    BusinessProfile, CustomService, FirstAvailableQuery, FullDatesQuery, PublicBooking,
    PublicBookingRequest, PublicBookingResult, PublicBookingStatus, PublicBusinessCard,
    PublicProfessional, RescheduleRequest, SecureBookingInput, ServiceQuery, SlotQuery,
};
use crate::services::audit_service::AuditService;
use crate::services::availability::is_interval_free;
use crate::services::business_service::BusinessService;
use crate::services::catalog_service::CatalogService;
use crate::services::event_hub::EventHub;
use crate::services::pricing;
use crate::services::scheduling_service::{
    active_professional_ids, ensure_professional, load_busy, lock_business, SchedulingService,
};
use crate::utils::dates::local_to_utc;
use crate::utils::formatters::digits_only;
use crate::utils::tokens::{reschedule_token, validate_reschedule_token};

pub(crate) const BOOKING_COLUMNS: &str = "id, business_id, customer_name, customer_phone, \
     phone_digits, customer_email, service_ids, professional_id, appointment_time, \
     duration_minutes, total_price, status, appointment_id, created_at, updated_at";

const MIN_PHONE_DIGITS: usize = 8;

/// Customer-facing booking flow and the staff review of its requests.
#[derive(Clone)]
pub struct PublicBookingService {
    db: PgPool,
    audit: AuditService,
    business: BusinessService,
    catalog: CatalogService,
    scheduling: SchedulingService,
    events: EventHub,
    reschedule_secret: String,
}

impl PublicBookingService {
    pub fn new(db: PgPool, events: EventHub, reschedule_secret: impl Into<String>) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            business: BusinessService::new(db.clone()),
            catalog: CatalogService::new(db.clone()),
            scheduling: SchedulingService::new(db.clone(), events.clone()),
            events,
            reschedule_secret: reschedule_secret.into(),
            db,
        }
    }

    /// Business behind a public link; disabled booking pages answer 403.
    async fn open_business(&self, slug: &str) -> Result<BusinessProfile, AppError> {
        let profile = self.business.get_by_slug(slug).await?;
        if !profile.public_booking_enabled {
            return Err(AppError::Forbidden("Online booking is disabled for this business".into()));
        }
        Ok(profile)
    }

    pub async fn card(&self, slug: &str) -> Result<PublicBusinessCard, AppError> {
        let profile = self.open_business(slug).await?;
        let services = self.catalog.list_services(profile.id, &ServiceQuery::default()).await?;
        let categories = self.catalog.list_categories(profile.id).await?;
        let team = sqlx::query_as::<_, PublicProfessional>(
            "SELECT id, name, photo_url, specialty FROM team_members
             WHERE user_id = $1 AND active = TRUE AND deleted_at IS NULL
             ORDER BY name",
        )
        .bind(profile.id)
        .fetch_all(&self.db)
        .await?;

        Ok(PublicBusinessCard {
            id: profile.id,
            business_type: profile.kind(),
            region: profile.region(),
            business_hours: profile.business_hours.0.clone(),
            business_name: profile.business_name,
            business_slug: profile.business_slug,
            phone: profile.phone,
            address: profile.address,
            instagram: profile.instagram,
            cancellation_policy: profile.cancellation_policy,
            services,
            categories,
            team,
        })
    }

    pub async fn slots(&self, slug: &str, query: SlotQuery) -> Result<Vec<String>, AppError> {
        let profile = self.open_business(slug).await?;
        let query = SlotQuery {
            is_professional: false,
            ..query
        };
        self.scheduling.get_available_slots(profile.id, &query).await
    }

    pub async fn full_dates(&self, slug: &str, query: &FullDatesQuery) -> Result<Vec<NaiveDate>, AppError> {
        let profile = self.open_business(slug).await?;
        self.scheduling.get_full_dates(profile.id, query).await
    }

    /// Latest pending request, or future confirmed one, made with this phone.
    pub async fn active_booking(&self, slug: &str, phone: &str) -> Result<Option<PublicBooking>, AppError> {
        let profile = self.open_business(slug).await?;
        self.find_active(profile.id, phone).await
    }

    async fn find_active(&self, business_id: Uuid, phone: &str) -> Result<Option<PublicBooking>, AppError> {
        self.find_by_phone(
            business_id,
            phone,
            "(status = 'pending' OR (status = 'confirmed' AND appointment_time > NOW()))",
        )
        .await
    }

    /// Latest pending request of this phone, whatever else it has booked since.
    async fn find_pending(&self, business_id: Uuid, phone: &str) -> Result<Option<PublicBooking>, AppError> {
        self.find_by_phone(business_id, phone, "status = 'pending'").await
    }

    async fn find_by_phone(
        &self,
        business_id: Uuid,
        phone: &str,
        status_filter: &str,
    ) -> Result<Option<PublicBooking>, AppError> {
        let digits = digits_only(phone);
        if digits.len() < MIN_PHONE_DIGITS {
            return Ok(None);
        }

        let booking = sqlx::query_as::<_, PublicBooking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM public_bookings
             WHERE business_id = $1 AND phone_digits = $2 AND {status_filter}
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(business_id)
        .bind(digits)
        .fetch_optional(&self.db)
        .await?;

        Ok(booking)
    }

    /// Stores a pending booking request. A customer with a pending request
    /// gets that request back instead of a duplicate.
    #[tracing::instrument(skip(self, request), fields(slug = %slug))]
    pub async fn submit(&self, slug: &str, request: PublicBookingRequest) -> Result<PublicBookingResult, AppError> {
        let profile = self.open_business(slug).await?;
        let time = request.time.ok_or_else(|| AppError::validation("select a time"))?;

        if let Some(existing) = self.find_pending(profile.id, &request.customer_phone).await? {
            return Ok(self.result(existing, true));
        }

        if let Some(professional_id) = request.professional_id {
            let mut conn = self.db.acquire().await?;
            ensure_professional(&mut conn, profile.id, professional_id, true).await?;
        }

        let services = self.catalog.services_by_ids(profile.id, &request.service_ids).await?;
        let none = CustomService::default();
        let duration = pricing::total_duration(&services, &none);
        let price = pricing::suggested_price(&services, &none);
        let start = local_to_utc(request.date, time, profile.region().offset());

        self.ensure_offered(
            profile.id,
            &request.date,
            time,
            request.professional_id,
            duration,
            None,
        )
        .await?;

        let professional_id = match request.professional_id {
            Some(id) => Some(id),
            None => self
                .scheduling
                .get_first_available_professional(
                    profile.id,
                    &FirstAvailableQuery {
                        time: start,
                        duration: Some(duration),
                    },
                )
                .await?,
        };

        let mut tx = self.db.begin().await?;
        lock_business(&mut tx, profile.id).await?;

        let end = start + Duration::minutes(duration as i64);
        let busy = load_busy(&mut tx, profile.id, start, end, None, None).await?;
        let professionals = active_professional_ids(&mut tx, profile.id).await?;
        if !is_interval_free(start, end, professional_id, &professionals, &busy) {
            return Err(AppError::Conflict("This time slot is no longer available".into()));
        }

        let booking = sqlx::query_as::<_, PublicBooking>(&format!(
            "INSERT INTO public_bookings (
                id, business_id, customer_name, customer_phone, phone_digits, customer_email,
                service_ids, professional_id, appointment_time, duration_minutes, total_price, status
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending')
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(profile.id)
        .bind(request.customer_name.trim())
        .bind(request.customer_phone.trim())
        .bind(digits_only(&request.customer_phone))
        .bind(&request.customer_email)
        .bind(&request.service_ids)
        .bind(professional_id)
        .bind(start)
        .bind(duration)
        .bind(price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(booking_id = %booking.id, "public booking received");
        self.events.publish(BookingEvent::BookingCreated {
            business_id: profile.id,
            booking_id: booking.id,
            customer_name: booking.customer_name.clone(),
            appointment_time: booking.appointment_time,
        });

        Ok(self.result(booking, false))
    }

    fn result(&self, booking: PublicBooking, existing: bool) -> PublicBookingResult {
        PublicBookingResult {
            reschedule_token: reschedule_token(booking.id, &self.reschedule_secret),
            booking,
            existing,
        }
    }

    /// The requested time must be one of the offered public slots. A booking
    /// being moved does not block its own new time.
    async fn ensure_offered(
        &self,
        business_id: Uuid,
        date: &NaiveDate,
        time: NaiveTime,
        professional_id: Option<Uuid>,
        duration: i32,
        moving: Option<&PublicBooking>,
    ) -> Result<(), AppError> {
        let offered = self
            .scheduling
            .slots_excluding(
                business_id,
                &SlotQuery {
                    date: *date,
                    professional_id,
                    duration: Some(duration),
                    is_professional: false,
                },
                moving.map(|b| b.id),
                moving.and_then(|b| b.appointment_id),
            )
            .await?;

        if offered.contains(&time.format("%H:%M").to_string()) {
            Ok(())
        } else {
            Err(AppError::Conflict("This time slot is not available".into()))
        }
    }

    async fn booking_with_token(&self, booking_id: Uuid, token: &str) -> Result<PublicBooking, AppError> {
        if !validate_reschedule_token(booking_id, token, &self.reschedule_secret) {
            return Err(AppError::Forbidden("Invalid booking link".into()));
        }
        sqlx::query_as::<_, PublicBooking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM public_bookings WHERE id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Booking"))
    }

    pub async fn get_with_token(&self, booking_id: Uuid, token: &str) -> Result<PublicBooking, AppError> {
        self.booking_with_token(booking_id, token).await
    }

    /// Moves a booking through its magic link. The booking goes back to
    /// `pending`; a linked appointment is cancelled.
    #[tracing::instrument(skip(self, request))]
    pub async fn reschedule(&self, booking_id: Uuid, request: RescheduleRequest) -> Result<PublicBooking, AppError> {
        let booking = self.booking_with_token(booking_id, &request.token).await?;
        if booking.status == PublicBookingStatus::Rejected.as_str()
            || booking.status == PublicBookingStatus::Cancelled.as_str()
        {
            return Err(AppError::Conflict(format!("Booking is {}", booking.status)));
        }
        let time = request.time.ok_or_else(|| AppError::validation("select a time"))?;

        let profile = self.business.get_profile(booking.business_id).await?;
        if !profile.public_booking_enabled {
            return Err(AppError::Forbidden("Online booking is disabled for this business".into()));
        }
        let start = local_to_utc(request.date, time, profile.region().offset());
        if start < Utc::now() {
            return Err(AppError::validation("cannot book in the past"));
        }
        let end = start + Duration::minutes(booking.duration_minutes as i64);
        let professional_id = request.professional_id.or(booking.professional_id);
        if let Some(id) = request.professional_id {
            let mut conn = self.db.acquire().await?;
            ensure_professional(&mut conn, booking.business_id, id, true).await?;
        }

        self.ensure_offered(
            booking.business_id,
            &request.date,
            time,
            professional_id,
            booking.duration_minutes,
            Some(&booking),
        )
        .await?;

        let mut tx = self.db.begin().await?;
        lock_business(&mut tx, booking.business_id).await?;

        let busy = load_busy(
            &mut tx,
            booking.business_id,
            start,
            end,
            Some(booking.id),
            booking.appointment_id,
        )
        .await?;
        let professionals = active_professional_ids(&mut tx, booking.business_id).await?;
        if !is_interval_free(start, end, professional_id, &professionals, &busy) {
            return Err(AppError::Conflict("This time slot is no longer available".into()));
        }

        if let Some(appointment_id) = booking.appointment_id {
            sqlx::query(
                "UPDATE appointments SET status = 'Cancelled', updated_at = NOW()
                 WHERE id = $1 AND user_id = $2 AND status <> 'Completed'",
            )
            .bind(appointment_id)
            .bind(booking.business_id)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query_as::<_, PublicBooking>(&format!(
            "UPDATE public_bookings SET
                appointment_time = $2,
                professional_id = $3,
                status = 'pending',
                appointment_id = NULL,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.id)
        .bind(start)
        .bind(professional_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.events.publish(BookingEvent::BookingCreated {
            business_id: updated.business_id,
            booking_id: updated.id,
            customer_name: updated.customer_name.clone(),
            appointment_time: updated.appointment_time,
        });

        Ok(updated)
    }

    /// Customer cancellation through the magic link.
    pub async fn cancel(&self, booking_id: Uuid, token: &str) -> Result<PublicBooking, AppError> {
        let booking = self.booking_with_token(booking_id, token).await?;
        if booking.status == PublicBookingStatus::Cancelled.as_str() {
            return Ok(booking);
        }
        if booking.status == PublicBookingStatus::Rejected.as_str() {
            return Err(AppError::Conflict("Booking was rejected".into()));
        }

        let mut tx = self.db.begin().await?;
        if let Some(appointment_id) = booking.appointment_id {
            sqlx::query(
                "UPDATE appointments SET status = 'Cancelled', updated_at = NOW()
                 WHERE id = $1 AND user_id = $2 AND status <> 'Completed'",
            )
            .bind(appointment_id)
            .bind(booking.business_id)
            .execute(&mut *tx)
            .await?;
        }
        let updated = sqlx::query_as::<_, PublicBooking>(&format!(
            "UPDATE public_bookings SET status = 'cancelled', updated_at = NOW()
             WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(updated)
    }

    pub async fn list_pending(&self, business_id: Uuid) -> Result<Vec<PublicBooking>, AppError> {
        let bookings = sqlx::query_as::<_, PublicBooking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM public_bookings
             WHERE business_id = $1 AND status = 'pending'
             ORDER BY appointment_time ASC"
        ))
        .bind(business_id)
        .fetch_all(&self.db)
        .await?;
        Ok(bookings)
    }

    async fn get_for_business(&self, business_id: Uuid, booking_id: Uuid) -> Result<PublicBooking, AppError> {
        sqlx::query_as::<_, PublicBooking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM public_bookings WHERE id = $1 AND business_id = $2"
        ))
        .bind(booking_id)
        .bind(business_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Booking"))
    }

    /// Turns a pending request into an appointment through the serialized
    /// booking path, creating or linking the client by phone.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn confirm(&self, business_id: Uuid, booking_id: Uuid, ctx: &AuditContext) -> Result<PublicBooking, AppError> {
        let booking = self.get_for_business(business_id, booking_id).await?;
        if booking.status != PublicBookingStatus::Pending.as_str() {
            return Err(AppError::Conflict(format!("Booking is already {}", booking.status)));
        }

        let services = self.catalog.services_by_ids(business_id, &booking.service_ids).await?;
        let outcome = self
            .scheduling
            .create_secure_booking(SecureBookingInput {
                business_id,
                professional_id: booking.professional_id,
                client_id: None,
                client_name: Some(booking.customer_name.clone()),
                client_phone: Some(booking.customer_phone.clone()),
                client_email: booking.customer_email.clone(),
                service: pricing::service_label(&services, &CustomService::default()),
                service_ids: booking.service_ids.clone(),
                start: booking.appointment_time,
                duration_minutes: booking.duration_minutes,
                price: booking.total_price,
                discount_percent: 0.0,
                status: AppointmentStatus::Confirmed,
                source: AppointmentSource::PublicBooking,
                public_booking_id: Some(booking.id),
                payment_method: None,
                notes: None,
                custom_service_name: None,
            })
            .await?;

        if !outcome.success {
            return Err(AppError::Conflict(outcome.message));
        }

        let confirmed = self.get_for_business(business_id, booking_id).await?;
        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Confirm, "public_bookings")
                    .resource(booking.id)
                    .values(
                        Some(serde_json::json!({ "status": booking.status })),
                        Some(serde_json::json!({
                            "status": confirmed.status,
                            "appointment_id": confirmed.appointment_id,
                        })),
                    ),
            )
            .await;

        Ok(confirmed)
    }

    pub async fn reject(&self, business_id: Uuid, booking_id: Uuid, ctx: &AuditContext) -> Result<PublicBooking, AppError> {
        let rejected = sqlx::query_as::<_, PublicBooking>(&format!(
            "UPDATE public_bookings SET status = 'rejected', updated_at = NOW()
             WHERE id = $1 AND business_id = $2 AND status = 'pending'
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .bind(business_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(rejected) = rejected else {
            let current = self.get_for_business(business_id, booking_id).await?;
            return Err(AppError::Conflict(format!("Booking is already {}", current.status)));
        };

        self.audit
            .record_quietly(ctx.entry(AuditAction::Reject, "public_bookings").resource(rejected.id))
            .await;

        Ok(rejected)
    }

    /// Upcoming appointments of the customer holding a client session.
    pub async fn client_appointments(&self, business_id: Uuid, client_id: Uuid) -> Result<Vec<AgendaEntry>, AppError> {
        let entries = sqlx::query_as::<_, AgendaEntry>(
            "SELECT a.id, a.client_id, c.name AS client_name, c.phone AS client_phone,
                    a.professional_id, t.name AS professional_name, a.service, a.appointment_time,
                    a.duration_minutes, a.price, a.status, a.source, a.notes
             FROM appointments a
             LEFT JOIN clients c ON c.id = a.client_id
             LEFT JOIN team_members t ON t.id = a.professional_id
             WHERE a.user_id = $1 AND a.client_id = $2 AND a.deleted_at IS NULL
               AND a.appointment_time >= NOW()
               AND a.status IN ('Pending', 'Confirmed')
             ORDER BY a.appointment_time ASC",
        )
        .bind(business_id)
        .bind(client_id)
        .fetch_all(&self.db)
        .await?;
        Ok(entries)
    }
}
