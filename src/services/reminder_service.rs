use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Region;
use crate::services::mailer::{EmailMessage, Mailer};
use crate::utils::dates::{day_bounds, local_date};
use crate::utils::formatters::{format_date_long, format_time};

/// Appointment due for a reminder, with what the e-mail needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReminderCandidate {
    pub appointment_id: Uuid,
    pub client_name: String,
    pub client_email: String,
    pub service: String,
    pub appointment_time: DateTime<Utc>,
    pub professional_name: Option<String>,
    pub business_name: String,
    pub business_address: Option<String>,
    pub region: String,
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn reminder_email(candidate: &ReminderCandidate) -> EmailMessage {
    let local = candidate
        .appointment_time
        .with_timezone(&Region::from_str(&candidate.region).offset());
    let date = format_date_long(local.date_naive());
    let time = format_time(&local);
    let with = candidate
        .professional_name
        .as_deref()
        .map(|name| format!(" com {name}"))
        .unwrap_or_default();
    let address = candidate.business_address.as_deref().unwrap_or_default();

    let text_body = format!(
        "Olá {client}!\n\n\
         Passando para lembrar do seu horário amanhã na {business}:\n\
         {service}{with}\n\
         {date} às {time}\n\
         {address}\n\n\
         Se não puder comparecer, avise com antecedência.\n",
        client = candidate.client_name,
        business = candidate.business_name,
        service = candidate.service,
    );

    let html_body = format!(
        "<p>Olá <strong>{client}</strong>!</p>\
         <p>Passando para lembrar do seu horário amanhã na <strong>{business}</strong>:</p>\
         <ul><li>{service}{with}</li><li>{date} às {time}</li>{address}</ul>\
         <p>Se não puder comparecer, avise com antecedência.</p>",
        client = escape_html(&candidate.client_name),
        business = escape_html(&candidate.business_name),
        service = escape_html(&candidate.service),
        with = escape_html(&with),
        address = if address.is_empty() {
            String::new()
        } else {
            format!("<li>{}</li>", escape_html(address))
        },
    );

    EmailMessage {
        to: candidate.client_email.clone(),
        to_name: Some(candidate.client_name.clone()),
        subject: format!("Lembrete: seu horário amanhã na {}", candidate.business_name),
        text_body,
        html_body,
    }
}

/// Daily e-mail reminders for the next day's confirmed appointments.
#[derive(Clone)]
pub struct ReminderService {
    db: PgPool,
    mailer: Option<Arc<dyn Mailer>>,
}

impl ReminderService {
    pub fn new(db: PgPool, mailer: Option<Arc<dyn Mailer>>) -> Self {
        Self { db, mailer }
    }

    async fn candidates(&self, now: DateTime<Utc>) -> Result<Vec<ReminderCandidate>, AppError> {
        let regions: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, region FROM profiles WHERE email_reminders_enabled = TRUE")
                .fetch_all(&self.db)
                .await?;

        let mut due = Vec::new();
        for (business_id, region) in regions {
            let offset = Region::from_str(&region).offset();
            let tomorrow = local_date(now, offset) + Duration::days(1);
            let (start, end) = day_bounds(tomorrow, offset);

            let rows = sqlx::query_as::<_, ReminderCandidate>(
                "SELECT a.id AS appointment_id, c.name AS client_name, c.email AS client_email,
                        a.service, a.appointment_time, t.name AS professional_name,
                        p.business_name, p.address AS business_address, p.region
                 FROM appointments a
                 JOIN clients c ON c.id = a.client_id
                 JOIN profiles p ON p.id = a.user_id
                 LEFT JOIN team_members t ON t.id = a.professional_id
                 WHERE a.user_id = $1 AND a.deleted_at IS NULL
                   AND a.status = 'Confirmed' AND a.reminder_sent_at IS NULL
                   AND a.appointment_time >= $2 AND a.appointment_time < $3
                   AND c.email IS NOT NULL AND c.email <> ''",
            )
            .bind(business_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.db)
            .await?;
            due.extend(rows);
        }
        Ok(due)
    }

    /// Sends every due reminder and returns how many went out.
    #[tracing::instrument(skip(self))]
    pub async fn send_due_reminders(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let Some(mailer) = &self.mailer else {
            tracing::info!("SMTP not configured, skipping reminders");
            return Ok(0);
        };

        let mut sent = 0;
        for candidate in self.candidates(now).await? {
            // Claim first so two instances never mail the same client.
            let claimed = sqlx::query(
                "UPDATE appointments SET reminder_sent_at = NOW()
                 WHERE id = $1 AND reminder_sent_at IS NULL",
            )
            .bind(candidate.appointment_id)
            .execute(&self.db)
            .await?;
            if claimed.rows_affected() == 0 {
                continue;
            }

            match mailer.send(reminder_email(&candidate)).await {
                Ok(()) => sent += 1,
                Err(err) => {
                    tracing::warn!(appointment_id = %candidate.appointment_id, error = %err, "reminder not sent");
                    sqlx::query("UPDATE appointments SET reminder_sent_at = NULL WHERE id = $1")
                        .bind(candidate.appointment_id)
                        .execute(&self.db)
                        .await?;
                }
            }
        }

        tracing::info!(sent, "reminders processed");
        Ok(sent)
    }

    /// Registers the reminder job on a new scheduler and starts it.
    pub async fn start(self, cron: &str) -> Result<JobScheduler, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;
        let service = Arc::new(self);

        let job = Job::new_async(cron, move |_uuid, _lock| {
            let service = Arc::clone(&service);
            Box::pin(async move {
                if let Err(err) = service.send_due_reminders(Utc::now()).await {
                    tracing::error!(error = %err, "reminder job failed");
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;
        tracing::info!(cron, "reminder scheduler started");
        Ok(scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn candidate() -> ReminderCandidate {
        ReminderCandidate {
            appointment_id: Uuid::new_v4(),
            client_name: "Ana <Souza>".to_string(),
            client_email: "ana@example.com".to_string(),
            service: "Corte + Barba".to_string(),
            // 17:30 UTC is 14:30 in Brazil
            appointment_time: Utc.with_ymd_and_hms(2024, 3, 5, 17, 30, 0).unwrap(),
            professional_name: Some("Carlos".to_string()),
            business_name: "Barbearia Central".to_string(),
            business_address: None,
            region: "BR".to_string(),
        }
    }

    #[test]
    fn email_uses_local_time_and_escapes_html() {
        let email = reminder_email(&candidate());
        assert_eq!(email.to, "ana@example.com");
        assert_eq!(email.subject, "Lembrete: seu horário amanhã na Barbearia Central");
        assert!(email.text_body.contains("05 de março de 2024 às 14:30"));
        assert!(email.text_body.contains("Corte + Barba com Carlos"));
        assert!(email.html_body.contains("Ana &lt;Souza&gt;"));
        assert!(!email.html_body.contains("<Souza>"));
    }

    #[tokio::test]
    async fn skips_without_mailer() {
        let pool = PgPool::connect_lazy("postgres://localhost/agenx_unused").unwrap();
        let service = ReminderService::new(pool, None);
        assert_eq!(service.send_due_reminders(Utc::now()).await.unwrap(), 0);
    }
}
