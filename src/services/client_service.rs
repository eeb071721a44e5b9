use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Appointment, AuditAction, AuditContext, Client, ClientDetail, ClientQuery,
    CreateClientRequest, LoyaltyTier, NextVisitPrediction, UpdateClientRequest,
};
use crate::services::appointment_service::APPOINTMENT_COLUMNS;
use crate::services::audit_service::AuditService;
use crate::utils::formatters::digits_only;

pub(crate) const CLIENT_COLUMNS: &str = "id, user_id, name, email, phone, phone_digits, photo_url, \
     notes, birth_date, total_visits, last_visit, created_at, updated_at, deleted_at";

const DEFAULT_CLIENT_LIMIT: i64 = 100;
const MAX_CLIENT_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct ClientService {
    db: PgPool,
    audit: AuditService,
}

fn normalized_digits(phone: Option<&str>) -> Option<String> {
    phone.map(digits_only).filter(|d| !d.is_empty())
}

impl ClientService {
    pub fn new(db: PgPool) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            db,
        }
    }

    pub async fn list(&self, business_id: Uuid, query: &ClientQuery) -> Result<Vec<Client>, AppError> {
        let limit = query.limit.unwrap_or(DEFAULT_CLIENT_LIMIT).clamp(1, MAX_CLIENT_LIMIT);
        let offset = query.offset.unwrap_or(0).max(0);

        let mut sql = format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE user_id = $1 AND deleted_at IS NULL"
        );
        let mut param_count = 2;

        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let phone = query.phone.as_deref().map(digits_only).filter(|d| !d.is_empty());

        if search.is_some() {
            sql.push_str(&format!(" AND (name ILIKE ${param_count} OR email ILIKE ${param_count})"));
            param_count += 1;
        }
        if phone.is_some() {
            sql.push_str(&format!(" AND phone_digits LIKE ${param_count}"));
        }
        sql.push_str(&format!(" ORDER BY name LIMIT {limit} OFFSET {offset}"));

        let mut builder = sqlx::query_as::<_, Client>(&sql).bind(business_id);
        if let Some(search) = search {
            builder = builder.bind(format!("%{search}%"));
        }
        if let Some(phone) = phone {
            builder = builder.bind(format!("%{phone}%"));
        }

        Ok(builder.fetch_all(&self.db).await?)
    }

    pub async fn get(&self, business_id: Uuid, client_id: Uuid) -> Result<Client, AppError> {
        sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL"
        ))
        .bind(client_id)
        .bind(business_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Client"))
    }

    /// Client with loyalty tier, next-visit prediction and appointment history.
    pub async fn detail(&self, business_id: Uuid, client_id: Uuid) -> Result<ClientDetail, AppError> {
        let client = self.get(business_id, client_id).await?;

        let history = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE user_id = $1 AND client_id = $2 AND deleted_at IS NULL
             ORDER BY appointment_time DESC"
        ))
        .bind(business_id)
        .bind(client_id)
        .fetch_all(&self.db)
        .await?;

        let visits: Vec<DateTime<Utc>> = history
            .iter()
            .filter(|a| a.status == "Completed")
            .map(|a| a.appointment_time)
            .collect();
        let next_visit = NextVisitPrediction::from_history(&visits, Utc::now());

        Ok(ClientDetail {
            tier: LoyaltyTier::from_visits(client.total_visits),
            next_visit_label: next_visit.label(),
            next_visit,
            history,
            client,
        })
    }

    pub async fn find_by_phone(&self, business_id: Uuid, phone: &str) -> Result<Option<Client>, AppError> {
        let digits = digits_only(phone);
        if digits.is_empty() {
            return Ok(None);
        }

        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients
             WHERE user_id = $1 AND phone_digits = $2 AND deleted_at IS NULL
             ORDER BY created_at ASC
             LIMIT 1"
        ))
        .bind(business_id)
        .bind(digits)
        .fetch_optional(&self.db)
        .await?;

        Ok(client)
    }

    pub async fn create(
        &self,
        business_id: Uuid,
        request: CreateClientRequest,
        ctx: &AuditContext,
    ) -> Result<Client, AppError> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "INSERT INTO clients (id, user_id, name, email, phone, phone_digits, photo_url, notes, birth_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(business_id)
        .bind(request.name.trim())
        .bind(&request.email)
        .bind(&request.phone)
        .bind(normalized_digits(request.phone.as_deref()))
        .bind(&request.photo_url)
        .bind(&request.notes)
        .bind(request.birth_date)
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Create, "clients")
                    .resource(client.id)
                    .values(None, serde_json::to_value(&client).ok()),
            )
            .await;

        Ok(client)
    }

    pub async fn update(
        &self,
        business_id: Uuid,
        client_id: Uuid,
        request: UpdateClientRequest,
        ctx: &AuditContext,
    ) -> Result<Client, AppError> {
        let before = self.get(business_id, client_id).await?;

        let client = sqlx::query_as::<_, Client>(&format!(
            "UPDATE clients SET
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                phone_digits = COALESCE($6, phone_digits),
                photo_url = COALESCE($7, photo_url),
                notes = COALESCE($8, notes),
                birth_date = COALESCE($9, birth_date),
                updated_at = NOW()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
             RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(client_id)
        .bind(business_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.email)
        .bind(&request.phone)
        .bind(normalized_digits(request.phone.as_deref()))
        .bind(&request.photo_url)
        .bind(&request.notes)
        .bind(request.birth_date)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Client"))?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Update, "clients")
                    .resource(client.id)
                    .values(serde_json::to_value(&before).ok(), serde_json::to_value(&client).ok()),
            )
            .await;

        Ok(client)
    }

    pub async fn delete(&self, business_id: Uuid, client_id: Uuid, ctx: &AuditContext) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE clients SET deleted_at = NOW()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(client_id)
        .bind(business_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Client"));
        }

        self.audit
            .record_quietly(ctx.entry(AuditAction::Delete, "clients").resource(client_id))
            .await;
        Ok(())
    }
}

/// Finds the business client with this phone, or creates one, inside an open
/// transaction. Returns the client id and name.
pub(crate) async fn find_or_create_by_phone(
    conn: &mut PgConnection,
    business_id: Uuid,
    name: &str,
    phone: &str,
    email: Option<&str>,
) -> Result<(Uuid, String), AppError> {
    let digits = digits_only(phone);

    if !digits.is_empty() {
        let existing: Option<(Uuid, String)> = sqlx::query_as(
            "SELECT id, name FROM clients
             WHERE user_id = $1 AND phone_digits = $2 AND deleted_at IS NULL
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .bind(business_id)
        .bind(&digits)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(found) = existing {
            return Ok(found);
        }
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO clients (id, user_id, name, email, phone, phone_digits)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(business_id)
    .bind(name.trim())
    .bind(email)
    .bind(phone)
    .bind(Some(digits).filter(|d| !d.is_empty()))
    .execute(&mut *conn)
    .await?;

    Ok((id, name.trim().to_string()))
}

/// Counts a completed visit on the client record.
pub(crate) async fn register_visit(
    conn: &mut PgConnection,
    client_id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE clients SET
            total_visits = total_visits + 1,
            last_visit = GREATEST(COALESCE(last_visit, $2), $2),
            updated_at = NOW()
         WHERE id = $1",
    )
    .bind(client_id)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_digits_are_normalized() {
        assert_eq!(normalized_digits(Some("(11) 98765-4321")).as_deref(), Some("11987654321"));
        assert_eq!(normalized_digits(Some("---")), None);
        assert_eq!(normalized_digits(None), None);
    }
}
