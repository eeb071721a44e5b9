mod common;

use agenx::models::{
    AppointmentSource, AppointmentStatus, CompleteAppointmentRequest, JoinQueueRequest,
    PublicBookingRequest, QueueStatus, Region, RescheduleRequest, SecureBookingInput,
    UpdateAppointmentRequest,
};
use agenx::services::{AppointmentService, EventHub, PublicBookingService, QueueService, SchedulingService};
use agenx::utils::dates::local_to_utc;
use agenx::AppError;
use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use pretty_assertions::assert_eq;
use sqlx::PgPool;
use uuid::Uuid;

use common::database::{
    insert_client, owner, seed_business, upcoming, SeededBusiness, TestDatabase, BEARD_PRICE,
    HAIRCUT_PRICE,
};

const CUSTOMER_PHONE: &str = "(11) 98765-4321";
const RESCHEDULE_SECRET: &str = "test_reschedule_secret";

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn local(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    local_to_utc(date, time, Region::Br.offset())
}

fn staff_booking(business: &SeededBusiness, client_id: Option<Uuid>, start: DateTime<Utc>) -> SecureBookingInput {
    SecureBookingInput {
        business_id: business.id,
        professional_id: Some(business.professional_id),
        client_id,
        client_name: client_id.is_none().then(|| "Carlos".to_string()),
        client_phone: client_id.is_none().then(|| CUSTOMER_PHONE.to_string()),
        client_email: None,
        service: "Corte".to_string(),
        service_ids: vec![business.haircut_id],
        start,
        duration_minutes: 30,
        price: HAIRCUT_PRICE,
        discount_percent: 0.0,
        status: AppointmentStatus::Confirmed,
        source: AppointmentSource::Internal,
        public_booking_id: None,
        payment_method: None,
        notes: None,
        custom_service_name: None,
    }
}

async fn book(pool: &PgPool, business: &SeededBusiness, client_id: Uuid, start: DateTime<Utc>) -> Uuid {
    let outcome = SchedulingService::new(pool.clone(), EventHub::new())
        .create_secure_booking(staff_booking(business, Some(client_id), start))
        .await
        .unwrap();
    assert!(outcome.success, "{}", outcome.message);
    outcome.appointment_id.unwrap()
}

fn booking_request(date: NaiveDate, time: NaiveTime, service_id: Uuid) -> PublicBookingRequest {
    PublicBookingRequest {
        customer_name: "Carlos Souza".to_string(),
        customer_phone: CUSTOMER_PHONE.to_string(),
        customer_email: None,
        service_ids: vec![service_id],
        professional_id: None,
        date,
        time: Some(time),
    }
}

fn no_changes() -> UpdateAppointmentRequest {
    UpdateAppointmentRequest {
        client_id: None,
        professional_id: None,
        service_id: None,
        appointment_time: None,
        price: None,
        duration_minutes: None,
        payment_method: None,
        notes: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_for_one_slot_book_it_once() {
    let Some(db) = TestDatabase::start().await else { return };
    let business = seed_business(&db.pool).await;
    let scheduling = SchedulingService::new(db.pool.clone(), EventHub::new());
    let start = local(upcoming(Weekday::Tue), at(10, 0));

    let (first, second) = tokio::join!(
        scheduling.create_secure_booking(staff_booking(&business, None, start)),
        scheduling.create_secure_booking(staff_booking(&business, None, start)),
    );
    let outcomes = [first.unwrap(), second.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.success).count(), 1);
    let rejected = outcomes.iter().find(|o| !o.success).unwrap();
    assert_eq!(rejected.message, "This time slot is no longer available");

    let booked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE user_id = $1")
        .bind(business.id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(booked, 1);
}

#[tokio::test]
async fn completing_twice_is_a_conflict_and_books_revenue_once() {
    let Some(db) = TestDatabase::start().await else { return };
    let business = seed_business(&db.pool).await;
    let client_id = insert_client(&db.pool, business.id, "Carlos", CUSTOMER_PHONE).await;
    let appointment_id = book(&db.pool, &business, client_id, local(upcoming(Weekday::Wed), at(9, 0))).await;
    let appointments = AppointmentService::new(db.pool.clone(), EventHub::new());
    let ctx = owner(&business);

    let completed = appointments
        .complete(business.id, appointment_id, CompleteAppointmentRequest::default(), &ctx)
        .await
        .unwrap();
    assert_eq!(completed.revenue, HAIRCUT_PRICE);
    assert_eq!(completed.commission, 20.0);

    let again = appointments
        .complete(business.id, appointment_id, CompleteAppointmentRequest::default(), &ctx)
        .await;
    assert_matches!(again, Err(AppError::Conflict(_)));

    let (records, visits): (i64, i32) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM finance_records WHERE appointment_id = $1),
                (SELECT total_visits FROM clients WHERE id = $2)",
    )
    .bind(appointment_id)
    .bind(client_id)
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(records, 1);
    assert_eq!(visits, 1);
}

#[tokio::test]
async fn completion_credits_only_a_campaign_from_the_last_thirty_days() {
    let Some(db) = TestDatabase::start().await else { return };
    let business = seed_business(&db.pool).await;
    let client_id = insert_client(&db.pool, business.id, "Marcos", "(11) 91234-5678").await;

    let mut campaign_ids = Vec::new();
    for days_ago in [40, 5] {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO aios_campaigns (id, user_id, client_id, agent_name, campaign_type, sent_at)
             VALUES ($1, $2, $3, 'Recuperador', 'reactivation', NOW() - make_interval(days => $4))",
        )
        .bind(id)
        .bind(business.id)
        .bind(client_id)
        .bind(days_ago)
        .execute(&db.pool)
        .await
        .unwrap();
        campaign_ids.push(id);
    }
    let (stale, recent) = (campaign_ids[0], campaign_ids[1]);

    let appointment_id = book(&db.pool, &business, client_id, local(upcoming(Weekday::Thu), at(15, 0))).await;
    let result = AppointmentService::new(db.pool.clone(), EventHub::new())
        .complete(business.id, appointment_id, CompleteAppointmentRequest::default(), &owner(&business))
        .await
        .unwrap();

    assert_eq!(result.recovered_campaign_id, Some(recent));
    let (converted, revenue): (Option<Uuid>, f64) = sqlx::query_as(
        "SELECT converted_appointment_id, recovered_revenue FROM aios_campaigns WHERE id = $1",
    )
    .bind(recent)
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(converted, Some(appointment_id));
    assert_eq!(revenue, HAIRCUT_PRICE);

    let stale_converted: Option<Uuid> =
        sqlx::query_scalar("SELECT converted_appointment_id FROM aios_campaigns WHERE id = $1")
            .bind(stale)
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert_eq!(stale_converted, None);
}

#[tokio::test]
async fn pending_request_is_returned_even_after_a_newer_confirmed_booking() {
    let Some(db) = TestDatabase::start().await else { return };
    let business = seed_business(&db.pool).await;
    let bookings = PublicBookingService::new(db.pool.clone(), EventHub::new(), RESCHEDULE_SECRET);
    let day = upcoming(Weekday::Tue);

    let first = bookings
        .submit(&business.slug, booking_request(day, at(10, 0), business.haircut_id))
        .await
        .unwrap();
    assert!(!first.existing);

    sqlx::query(
        "INSERT INTO public_bookings (id, business_id, customer_name, customer_phone, phone_digits,
            service_ids, appointment_time, status, created_at)
         VALUES ($1, $2, 'Carlos Souza', $3, '11987654321', $4, $5, 'confirmed', NOW() + INTERVAL '1 minute')",
    )
    .bind(Uuid::new_v4())
    .bind(business.id)
    .bind(CUSTOMER_PHONE)
    .bind(vec![business.beard_id])
    .bind(local(upcoming(Weekday::Fri), at(16, 0)))
    .execute(&db.pool)
    .await
    .unwrap();

    let second = bookings
        .submit(&business.slug, booking_request(day, at(11, 0), business.beard_id))
        .await
        .unwrap();
    assert!(second.existing);
    assert_eq!(second.booking.id, first.booking.id);

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM public_bookings WHERE business_id = $1 AND status = 'pending'",
    )
    .bind(business.id)
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn reschedule_only_accepts_offered_slots() {
    let Some(db) = TestDatabase::start().await else { return };
    let business = seed_business(&db.pool).await;
    let bookings = PublicBookingService::new(db.pool.clone(), EventHub::new(), RESCHEDULE_SECRET);
    let tuesday = upcoming(Weekday::Tue);
    let submitted = bookings
        .submit(&business.slug, booking_request(tuesday, at(10, 0), business.haircut_id))
        .await
        .unwrap();
    let move_to = |date: NaiveDate, time: NaiveTime| RescheduleRequest {
        token: submitted.reschedule_token.clone(),
        date,
        time: Some(time),
        professional_id: None,
    };

    let closed_day = bookings
        .reschedule(submitted.booking.id, move_to(upcoming(Weekday::Sun), at(10, 0)))
        .await;
    assert_matches!(closed_day, Err(AppError::Conflict(_)));

    let before_opening = bookings
        .reschedule(submitted.booking.id, move_to(tuesday, at(3, 0)))
        .await;
    assert_matches!(before_opening, Err(AppError::Conflict(_)));

    // Its own current slot does not count as taken.
    let same_slot = bookings
        .reschedule(submitted.booking.id, move_to(tuesday, at(10, 0)))
        .await
        .unwrap();
    assert_eq!(same_slot.appointment_time, local(tuesday, at(10, 0)));

    let wednesday = upcoming(Weekday::Wed);
    let moved = bookings
        .reschedule(submitted.booking.id, move_to(wednesday, at(14, 0)))
        .await
        .unwrap();
    assert_eq!(moved.appointment_time, local(wednesday, at(14, 0)));
    assert_eq!(moved.status, "pending");
}

#[tokio::test]
async fn another_tenants_professional_is_not_found() {
    let Some(db) = TestDatabase::start().await else { return };
    let business = seed_business(&db.pool).await;
    let other = seed_business(&db.pool).await;
    let client_id = insert_client(&db.pool, business.id, "Carlos", CUSTOMER_PHONE).await;
    let appointment_id = book(&db.pool, &business, client_id, local(upcoming(Weekday::Mon), at(11, 0))).await;

    let edit = AppointmentService::new(db.pool.clone(), EventHub::new())
        .update(
            business.id,
            appointment_id,
            UpdateAppointmentRequest {
                professional_id: Some(other.professional_id),
                ..no_changes()
            },
            &owner(&business),
        )
        .await;
    assert_matches!(edit, Err(AppError::NotFound(_)));

    let request = PublicBookingRequest {
        professional_id: Some(other.professional_id),
        ..booking_request(upcoming(Weekday::Tue), at(10, 0), business.haircut_id)
    };
    let submit = PublicBookingService::new(db.pool.clone(), EventHub::new(), RESCHEDULE_SECRET)
        .submit(&business.slug, request)
        .await;
    assert_matches!(submit, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn records_of_another_tenant_are_not_found() {
    let Some(db) = TestDatabase::start().await else { return };
    let business = seed_business(&db.pool).await;
    let other = seed_business(&db.pool).await;
    let client_id = insert_client(&db.pool, business.id, "Carlos", CUSTOMER_PHONE).await;
    let appointment_id = book(&db.pool, &business, client_id, local(upcoming(Weekday::Fri), at(9, 30))).await;
    let appointments = AppointmentService::new(db.pool.clone(), EventHub::new());
    let bookings = PublicBookingService::new(db.pool.clone(), EventHub::new(), RESCHEDULE_SECRET);
    let submitted = bookings
        .submit(&business.slug, booking_request(upcoming(Weekday::Sat), at(10, 0), business.haircut_id))
        .await
        .unwrap();

    assert_matches!(appointments.get(other.id, appointment_id).await, Err(AppError::NotFound(_)));
    assert_matches!(
        appointments
            .complete(other.id, appointment_id, CompleteAppointmentRequest::default(), &owner(&other))
            .await,
        Err(AppError::NotFound(_))
    );
    assert_matches!(
        bookings.confirm(other.id, submitted.booking.id, &owner(&other)).await,
        Err(AppError::NotFound(_))
    );

    let untouched = appointments.get(business.id, appointment_id).await.unwrap();
    assert_eq!(untouched.status, "Confirmed");
}

#[tokio::test]
async fn echoing_the_current_service_keeps_an_edited_price() {
    let Some(db) = TestDatabase::start().await else { return };
    let business = seed_business(&db.pool).await;
    let client_id = insert_client(&db.pool, business.id, "Carlos", CUSTOMER_PHONE).await;
    let appointment_id = book(&db.pool, &business, client_id, local(upcoming(Weekday::Thu), at(10, 0))).await;
    let appointments = AppointmentService::new(db.pool.clone(), EventHub::new());
    let ctx = owner(&business);

    let edited = appointments
        .update(business.id, appointment_id, UpdateAppointmentRequest { price: Some(70.0), ..no_changes() }, &ctx)
        .await
        .unwrap();
    assert_eq!(edited.price, 70.0);

    let echoed = appointments
        .update(
            business.id,
            appointment_id,
            UpdateAppointmentRequest {
                service_id: Some(business.haircut_id),
                notes: Some("cliente pediu máquina 2".to_string()),
                ..no_changes()
            },
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(echoed.price, 70.0);

    let switched = appointments
        .update(
            business.id,
            appointment_id,
            UpdateAppointmentRequest {
                service_id: Some(business.beard_id),
                ..no_changes()
            },
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(switched.price, BEARD_PRICE);
    assert_eq!(switched.service, "Barba");
}

#[tokio::test]
async fn completed_walk_in_becomes_an_appointment_with_revenue() {
    let Some(db) = TestDatabase::start().await else { return };
    let business = seed_business(&db.pool).await;
    let queue = QueueService::new(db.pool.clone());
    let ctx = owner(&business);
    let join = |name: &str, phone: &str| JoinQueueRequest {
        client_name: name.to_string(),
        client_phone: phone.to_string(),
        service_id: Some(business.haircut_id),
        professional_id: Some(business.professional_id),
    };

    let first = queue.join(&business.slug, join("Pedro", "(11) 90000-0001")).await.unwrap();
    let second = queue.join(&business.slug, join("João", "(11) 90000-0002")).await.unwrap();
    assert_eq!((first.position, second.position), (1, 2));
    assert!(second.estimated_wait_minutes > first.estimated_wait_minutes);

    for next in [QueueStatus::Calling, QueueStatus::Serving, QueueStatus::Completed] {
        queue.transition(business.id, first.entry_id, next, &ctx).await.unwrap();
    }

    assert_eq!(queue.position(second.entry_id).await.unwrap().position, 1);

    let (price, status, source, revenue, commission): (f64, String, String, f64, f64) = sqlx::query_as(
        "SELECT a.price, a.status, a.source, f.revenue, f.commission_value
         FROM appointments a
         JOIN finance_records f ON f.appointment_id = a.id
         WHERE a.user_id = $1",
    )
    .bind(business.id)
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(price, HAIRCUT_PRICE);
    assert_eq!(status, "Completed");
    assert_eq!(source, AppointmentSource::Queue.as_str());
    assert_eq!(revenue, HAIRCUT_PRICE);
    assert_eq!(commission, 20.0);

    let skip = queue.transition(business.id, second.entry_id, QueueStatus::Completed, &ctx).await;
    assert_matches!(skip, Err(AppError::Conflict(_)));
}
