use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AuditAction, AuditContext, CreateCategoryRequest, CreateServiceRequest, Service,
    ServiceCategory, ServiceQuery, UpdateCategoryRequest, UpdateServiceRequest,
    DEFAULT_SERVICE_DURATION,
};
use crate::services::audit_service::AuditService;

const SERVICE_COLUMNS: &str = "id, user_id, category_id, name, description, price, duration_minutes, \
     active, created_at, updated_at, deleted_at";
const CATEGORY_COLUMNS: &str = "id, user_id, name, position, created_at, deleted_at";

#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
    audit: AuditService,
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self {
            audit: AuditService::new(db.clone()),
            db,
        }
    }

    // Categories

    pub async fn list_categories(&self, business_id: Uuid) -> Result<Vec<ServiceCategory>, AppError> {
        let categories = sqlx::query_as::<_, ServiceCategory>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM service_categories
             WHERE user_id = $1 AND deleted_at IS NULL
             ORDER BY position, name"
        ))
        .bind(business_id)
        .fetch_all(&self.db)
        .await?;

        Ok(categories)
    }

    pub async fn create_category(
        &self,
        business_id: Uuid,
        request: CreateCategoryRequest,
        ctx: &AuditContext,
    ) -> Result<ServiceCategory, AppError> {
        let category = sqlx::query_as::<_, ServiceCategory>(&format!(
            "INSERT INTO service_categories (id, user_id, name, position)
             VALUES ($1, $2, $3, $4)
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(business_id)
        .bind(request.name.trim())
        .bind(request.position.unwrap_or(0))
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Create, "categories")
                    .resource(category.id)
                    .values(None, serde_json::to_value(&category).ok()),
            )
            .await;

        Ok(category)
    }

    pub async fn update_category(
        &self,
        business_id: Uuid,
        category_id: Uuid,
        request: UpdateCategoryRequest,
    ) -> Result<ServiceCategory, AppError> {
        sqlx::query_as::<_, ServiceCategory>(&format!(
            "UPDATE service_categories SET
                name = COALESCE($3, name),
                position = COALESCE($4, position)
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(category_id)
        .bind(business_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(request.position)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))
    }

    /// Soft-deletes a category and detaches its services.
    pub async fn delete_category(
        &self,
        business_id: Uuid,
        category_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "UPDATE service_categories SET deleted_at = NOW()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(category_id)
        .bind(business_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Category"));
        }

        sqlx::query("UPDATE services SET category_id = NULL WHERE category_id = $1 AND user_id = $2")
            .bind(category_id)
            .bind(business_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.audit
            .record_quietly(ctx.entry(AuditAction::Delete, "categories").resource(category_id))
            .await;
        Ok(())
    }

    // Services

    pub async fn list_services(&self, business_id: Uuid, query: &ServiceQuery) -> Result<Vec<Service>, AppError> {
        let mut sql = format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE user_id = $1 AND deleted_at IS NULL"
        );
        if !query.include_inactive {
            sql.push_str(" AND active");
        }
        if query.category_id.is_some() {
            sql.push_str(" AND category_id = $2");
        }
        sql.push_str(" ORDER BY name");

        let mut builder = sqlx::query_as::<_, Service>(&sql).bind(business_id);
        if let Some(category_id) = query.category_id {
            builder = builder.bind(category_id);
        }

        Ok(builder.fetch_all(&self.db).await?)
    }

    pub async fn get_service(&self, business_id: Uuid, service_id: Uuid) -> Result<Service, AppError> {
        sqlx::query_as::<_, Service>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL"
        ))
        .bind(service_id)
        .bind(business_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Service"))
    }

    /// Active services among `ids`, in the order requested. Unknown ids are an error.
    pub async fn services_by_ids(&self, business_id: Uuid, ids: &[Uuid]) -> Result<Vec<Service>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = sqlx::query_as::<_, Service>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services
             WHERE user_id = $1 AND id = ANY($2) AND deleted_at IS NULL"
        ))
        .bind(business_id)
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        ids.iter()
            .map(|id| {
                found
                    .iter()
                    .find(|s| s.id == *id)
                    .cloned()
                    .ok_or_else(|| AppError::not_found("Service"))
            })
            .collect()
    }

    pub async fn create_service(
        &self,
        business_id: Uuid,
        request: CreateServiceRequest,
        ctx: &AuditContext,
    ) -> Result<Service, AppError> {
        if let Some(category_id) = request.category_id {
            self.ensure_category(business_id, category_id).await?;
        }

        let service = sqlx::query_as::<_, Service>(&format!(
            "INSERT INTO services (id, user_id, category_id, name, description, price, duration_minutes, active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {SERVICE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(business_id)
        .bind(request.category_id)
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.price)
        .bind(request.duration_minutes.unwrap_or(DEFAULT_SERVICE_DURATION))
        .bind(request.active.unwrap_or(true))
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Create, "services")
                    .resource(service.id)
                    .values(None, serde_json::to_value(&service).ok()),
            )
            .await;

        Ok(service)
    }

    pub async fn update_service(
        &self,
        business_id: Uuid,
        service_id: Uuid,
        request: UpdateServiceRequest,
        ctx: &AuditContext,
    ) -> Result<Service, AppError> {
        let before = self.get_service(business_id, service_id).await?;
        if let Some(category_id) = request.category_id {
            self.ensure_category(business_id, category_id).await?;
        }

        let service = sqlx::query_as::<_, Service>(&format!(
            "UPDATE services SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                price = COALESCE($5, price),
                duration_minutes = COALESCE($6, duration_minutes),
                category_id = COALESCE($7, category_id),
                active = COALESCE($8, active),
                updated_at = NOW()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
             RETURNING {SERVICE_COLUMNS}"
        ))
        .bind(service_id)
        .bind(business_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(request.price)
        .bind(request.duration_minutes)
        .bind(request.category_id)
        .bind(request.active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Service"))?;

        self.audit
            .record_quietly(
                ctx.entry(AuditAction::Update, "services")
                    .resource(service.id)
                    .values(serde_json::to_value(&before).ok(), serde_json::to_value(&service).ok()),
            )
            .await;

        Ok(service)
    }

    pub async fn delete_service(
        &self,
        business_id: Uuid,
        service_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE services SET deleted_at = NOW()
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(service_id)
        .bind(business_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Service"));
        }

        self.audit
            .record_quietly(ctx.entry(AuditAction::Delete, "services").resource(service_id))
            .await;
        Ok(())
    }

    async fn ensure_category(&self, business_id: Uuid, category_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "SELECT 1 FROM service_categories WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(category_id)
        .bind(business_id)
        .fetch_optional(&self.db)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("Category"))
    }
}
