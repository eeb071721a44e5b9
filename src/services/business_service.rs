use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AuditAction, AuditContext, BusinessHours, BusinessProfile, OnboardingStatus, OnboardingStep,
    UpdateBusinessRequest,
};
use crate::services::audit_service::AuditService;

pub(crate) const PROFILE_COLUMNS: &str = "id, business_name, business_type, region, business_slug, \
     phone, address, instagram, cancellation_policy, business_hours, monthly_goal, \
     public_booking_enabled, email_reminders_enabled, aios_enabled, onboarding_step, \
     onboarding_completed, created_at, updated_at";

/// Business profile, opening hours and onboarding progress.
#[derive(Clone)]
pub struct BusinessService {
    db: PgPool,
    audit: AuditService,
}

impl BusinessService {
    pub fn new(db: PgPool) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            db,
        }
    }

    pub async fn get_profile(&self, business_id: Uuid) -> Result<BusinessProfile, AppError> {
        sqlx::query_as::<_, BusinessProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(business_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Business"))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<BusinessProfile, AppError> {
        sqlx::query_as::<_, BusinessProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE business_slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Business"))
    }

    pub async fn update_profile(
        &self,
        business_id: Uuid,
        request: UpdateBusinessRequest,
        ctx: &AuditContext,
    ) -> Result<BusinessProfile, AppError> {
        let before = self.get_profile(business_id).await?;

        let updated = sqlx::query_as::<_, BusinessProfile>(&format!(
            "UPDATE profiles SET
                business_name = COALESCE($2, business_name),
                business_type = COALESCE($3, business_type),
                region = COALESCE($4, region),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address),
                instagram = COALESCE($7, instagram),
                cancellation_policy = COALESCE($8, cancellation_policy),
                monthly_goal = COALESCE($9, monthly_goal),
                public_booking_enabled = COALESCE($10, public_booking_enabled),
                email_reminders_enabled = COALESCE($11, email_reminders_enabled),
                aios_enabled = COALESCE($12, aios_enabled),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(business_id)
        .bind(request.business_name.as_deref().map(str::trim))
        .bind(request.business_type.map(|t| t.as_str()))
        .bind(request.region.map(|r| r.as_str()))
        .bind(&request.phone)
        .bind(&request.address)
        .bind(&request.instagram)
        .bind(&request.cancellation_policy)
        .bind(request.monthly_goal)
        .bind(request.public_booking_enabled)
        .bind(request.email_reminders_enabled)
        .bind(request.aios_enabled)
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Update, "profiles")
                    .resource(business_id)
                    .values(serde_json::to_value(&before).ok(), serde_json::to_value(&updated).ok()),
            )
            .await;

        Ok(updated)
    }

    /// Replaces the weekly hours after normalizing and validating them.
    pub async fn update_hours(
        &self,
        business_id: Uuid,
        hours: BusinessHours,
        ctx: &AuditContext,
    ) -> Result<BusinessHours, AppError> {
        let hours = hours.normalize().map_err(AppError::Validation)?;
        let before = self.get_profile(business_id).await?;

        sqlx::query("UPDATE profiles SET business_hours = $2, updated_at = NOW() WHERE id = $1")
            .bind(business_id)
            .bind(sqlx::types::Json(&hours))
            .execute(&self.db)
            .await?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Update, "profiles")
                    .resource(business_id)
                    .values(
                        Some(serde_json::json!({ "business_hours": before.hours() })),
                        Some(serde_json::json!({ "business_hours": &hours })),
                    ),
            )
            .await;

        Ok(hours)
    }

    /// Advances onboarding; earlier steps never overwrite later progress.
    pub async fn update_onboarding_step(
        &self,
        business_id: Uuid,
        step: OnboardingStep,
    ) -> Result<OnboardingStatus, AppError> {
        let row: (i32, bool) = sqlx::query_as(
            "UPDATE profiles SET
                onboarding_step = GREATEST(onboarding_step, $2),
                onboarding_completed = onboarding_completed OR $3,
                updated_at = NOW()
             WHERE id = $1
             RETURNING onboarding_step, onboarding_completed",
        )
        .bind(business_id)
        .bind(step.index())
        .bind(step == OnboardingStep::Success)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Business"))?;

        Ok(OnboardingStatus {
            step: row.0,
            completed: row.1,
        })
    }

    pub async fn onboarding_status(&self, business_id: Uuid) -> Result<OnboardingStatus, AppError> {
        let profile = self.get_profile(business_id).await?;
        Ok(OnboardingStatus {
            step: profile.onboarding_step,
            completed: profile.onboarding_completed,
        })
    }

    pub async fn update_goal(&self, business_id: Uuid, monthly_goal: f64) -> Result<f64, AppError> {
        if !monthly_goal.is_finite() || monthly_goal < 0.0 {
            return Err(AppError::validation("monthly goal cannot be negative"));
        }

        sqlx::query("UPDATE profiles SET monthly_goal = $2, updated_at = NOW() WHERE id = $1")
            .bind(business_id)
            .bind(monthly_goal)
            .execute(&self.db)
            .await?;

        Ok(monthly_goal)
    }
}
