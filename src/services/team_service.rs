use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AuditAction, AuditContext, CreateTeamMemberRequest, TeamMember, UpdateTeamMemberRequest,
};
use crate::services::audit_service::AuditService;

const TEAM_COLUMNS: &str = "id, user_id, name, email, phone, photo_url, specialty, commission_rate, \
     active, created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct TeamService {
    db: PgPool,
    audit: AuditService,
}

impl TeamService {
    pub fn new(db: PgPool) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            db,
        }
    }

    pub async fn list(&self, business_id: Uuid, active_only: bool) -> Result<Vec<TeamMember>, AppError> {
        let mut sql = format!(
            "SELECT {TEAM_COLUMNS} FROM team_members WHERE user_id = $1 AND deleted_at IS NULL"
        );
        if active_only {
            sql.push_str(" AND active");
        }
        sql.push_str(" ORDER BY name");

        let members = sqlx::query_as::<_, TeamMember>(&sql)
            .bind(business_id)
            .fetch_all(&self.db)
            .await?;

        Ok(members)
    }

    pub async fn get(&self, business_id: Uuid, member_id: Uuid) -> Result<TeamMember, AppError> {
        sqlx::query_as::<_, TeamMember>(&format!(
            "SELECT {TEAM_COLUMNS} FROM team_members
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL"
        ))
        .bind(member_id)
        .bind(business_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Professional"))
    }

    pub async fn create(
        &self,
        business_id: Uuid,
        request: CreateTeamMemberRequest,
        ctx: &AuditContext,
    ) -> Result<TeamMember, AppError> {
        let member = sqlx::query_as::<_, TeamMember>(&format!(
            "INSERT INTO team_members (id, user_id, name, email, phone, photo_url, specialty, commission_rate, active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {TEAM_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(business_id)
        .bind(request.name.trim())
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.photo_url)
        .bind(&request.specialty)
        .bind(request.commission_rate.unwrap_or(0.0))
        .bind(request.active.unwrap_or(true))
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Create, "team_members")
                    .resource(member.id)
                    .values(None, serde_json::to_value(&member).ok()),
            )
            .await;

        Ok(member)
    }

    pub async fn update(
        &self,
        business_id: Uuid,
        member_id: Uuid,
        request: UpdateTeamMemberRequest,
        ctx: &AuditContext,
    ) -> Result<TeamMember, AppError> {
        let before = self.get(business_id, member_id).await?;

        let member = sqlx::query_as::<_, TeamMember>(&format!(
            "UPDATE team_members SET
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                photo_url = COALESCE($6, photo_url),
                specialty = COALESCE($7, specialty),
                commission_rate = COALESCE($8, commission_rate),
                active = COALESCE($9, active),
                updated_at = NOW()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
             RETURNING {TEAM_COLUMNS}"
        ))
        .bind(member_id)
        .bind(business_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.photo_url)
        .bind(&request.specialty)
        .bind(request.commission_rate)
        .bind(request.active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Professional"))?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Update, "team_members")
                    .resource(member.id)
                    .values(serde_json::to_value(&before).ok(), serde_json::to_value(&member).ok()),
            )
            .await;

        Ok(member)
    }

    pub async fn delete(&self, business_id: Uuid, member_id: Uuid, ctx: &AuditContext) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE team_members SET deleted_at = NOW(), active = FALSE
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(member_id)
        .bind(business_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Professional"));
        }

        self.audit
            .record_quietly(ctx.entry(AuditAction::Delete, "team_members").resource(member_id))
            .await;
        Ok(())
    }
}
