use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::password::{
    describe_password_errors, generate_reset_token, hash_password, hash_token,
    validate_password_strength, verify_password, PasswordPolicy,
};
use crate::auth::{
    AuthError, AuthResponse, ChangePasswordRequest, ClientSessionResponse, ForgotPasswordRequest,
    JwtService, LoginRequest, MessageResponse, RefreshTokenRequest, RegisterRequest,
    ResetPasswordRequest, TokenResponse, UserInfo, UserRole, UserSession,
};
use crate::models::{AuditAction, BusinessHours, NewAuditEntry, RequestOrigin};
use crate::services::audit_service::AuditService;
use crate::services::mailer::{EmailMessage, Mailer};
use crate::utils::formatters::digits_only;
use crate::utils::slug::{slug_candidate, slugify};

const RESET_TOKEN_LIFETIME_HOURS: i64 = 1;
const MAX_SLUG_ATTEMPTS: u32 = 100;

/// Simple user model for authentication
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    db: PgPool,
    audit: AuditService,
    mailer: Option<Arc<dyn Mailer>>,
    public_app_url: String,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("jwt_service", &self.jwt_service)
            .field("mailer", &self.mailer.is_some())
            .field("public_app_url", &self.public_app_url)
            .finish()
    }
}

impl AuthService {
    pub fn new(db: PgPool, jwt_secret: &str) -> Self {
        Self {
            jwt_service: JwtService::new(jwt_secret),
            audit: AuditService::new(db.clone()),
            db,
            mailer: None,
            public_app_url: String::new(),
        }
    }

    /// Enables delivery of password reset links.
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>, public_app_url: &str) -> Self {
        self.mailer = Some(mailer);
        self.public_app_url = public_app_url.trim_end_matches('/').to_string();
        self
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Register a business owner together with the business profile
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        use validator::Validate;
        request
            .validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        check_password_policy(&request.password)?;

        let email = request.email.trim().to_lowercase();
        if self.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = hash_password(&request.password)?;
        let role = UserRole::Owner;
        let user_id = Uuid::new_v4();
        let slug = self.unique_slug(&request.business_name).await?;

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, password_hash)
             VALUES ($1, $2, $3)
             RETURNING id, email, password_hash, created_at, updated_at",
        )
        .bind(user_id)
        .bind(&email)
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user.id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO profiles (id, business_name, business_type, region, business_slug, business_hours)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(request.business_name.trim())
        .bind(request.business_type.as_str())
        .bind(request.region.as_str())
        .bind(&slug)
        .bind(sqlx::types::Json(BusinessHours::default_week()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, slug = %slug, "business registered");

        self.issue_session(user, role, Some(slug)).await
    }

    /// Login user
    pub async fn login(
        &self,
        request: LoginRequest,
        origin: RequestOrigin,
    ) -> Result<AuthResponse, AuthError> {
        let email = request.email.trim().to_lowercase();
        let Some(user) = self.get_user_by_email(&email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(&request.password, &user.password_hash)? {
            self.audit
                .record_quietly(
                    NewAuditEntry::new(user.id, AuditAction::LoginFailed, "users")
                        .resource(user.id)
                        .user_name(user.email.clone())
                        .origin(origin),
                )
                .await;
            return Err(AuthError::InvalidCredentials);
        }

        let role = self.get_user_role(user.id).await?.unwrap_or(UserRole::Owner);
        let slug = self.get_business_slug(user.id).await?;

        self.audit
            .record_quietly(
                NewAuditEntry::new(user.id, AuditAction::Login, "users")
                    .resource(user.id)
                    .user_name(user.email.clone())
                    .origin(origin),
            )
            .await;

        self.issue_session(user, role, slug).await
    }

    /// Refresh access token
    pub async fn refresh_token(&self, request: RefreshTokenRequest) -> Result<TokenResponse, AuthError> {
        let claims = self.jwt_service.validate_refresh_token(&request.refresh_token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let business_id = Uuid::parse_str(&claims.bid).map_err(|_| AuthError::InvalidToken)?;
        if !self.is_refresh_token_valid(user_id, &request.refresh_token).await? {
            return Err(AuthError::InvalidToken);
        }

        let access_token = self.jwt_service.create_access_token(
            user_id,
            &claims.email,
            claims.role,
            business_id,
        )?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
        })
    }

    /// Logout user (blacklist token)
    pub async fn logout(&self, token: &str, origin: RequestOrigin) -> Result<MessageResponse, AuthError> {
        let claims = self.jwt_service.validate_token(token)?;
        if !claims.typ.opens_session() {
            return Err(AuthError::InvalidToken);
        }
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        self.blacklist_token(&claims.jti, claims.exp as i64).await?;
        self.revoke_user_refresh_tokens(user_id).await?;

        if claims.role != UserRole::Client {
            self.audit
                .record_quietly(
                    NewAuditEntry::new(user_id, AuditAction::Logout, "users")
                        .resource(user_id)
                        .user_name(claims.email.clone())
                        .origin(origin),
                )
                .await;
        }

        Ok(MessageResponse {
            message: "Successfully logged out".to_string(),
        })
    }

    /// Starts a password reset. The answer never reveals whether the e-mail exists.
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> Result<MessageResponse, AuthError> {
        let generic = MessageResponse {
            message: "If the e-mail is registered, a reset link has been sent".to_string(),
        };

        let email = request.email.trim().to_lowercase();
        let Some(user) = self.get_user_by_email(&email).await? else {
            return Ok(generic);
        };

        let token = generate_reset_token();
        sqlx::query(
            "INSERT INTO password_reset_tokens (token_hash, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(hash_token(&token))
        .bind(user.id)
        .bind(Utc::now() + Duration::hours(RESET_TOKEN_LIFETIME_HOURS))
        .execute(&self.db)
        .await?;

        match &self.mailer {
            Some(mailer) => {
                let link = format!("{}/reset-password?token={}", self.public_app_url, token);
                let message = EmailMessage {
                    to: user.email.clone(),
                    to_name: None,
                    subject: "Redefinição de senha".to_string(),
                    text_body: format!(
                        "Recebemos um pedido para redefinir sua senha.\n\nAcesse: {link}\n\nO link expira em 1 hora."
                    ),
                    html_body: format!(
                        "<p>Recebemos um pedido para redefinir sua senha.</p>\
                         <p><a href=\"{link}\">Redefinir senha</a></p>\
                         <p>O link expira em 1 hora.</p>"
                    ),
                };
                if let Err(err) = mailer.send(message).await {
                    tracing::error!(error = %err, user_id = %user.id, "failed to send reset e-mail");
                }
            }
            None => tracing::warn!(user_id = %user.id, "reset token created but no mailer is configured"),
        }

        Ok(generic)
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<MessageResponse, AuthError> {
        check_password_policy(&request.new_password)?;

        let row = sqlx::query(
            "SELECT user_id FROM password_reset_tokens
             WHERE token_hash = $1 AND NOT used AND expires_at > NOW()",
        )
        .bind(hash_token(&request.token))
        .fetch_optional(&self.db)
        .await?
        .ok_or(AuthError::InvalidToken)?;
        let user_id: Uuid = row.get("user_id");

        let password_hash = hash_password(&request.new_password)?;
        let mut tx = self.db.begin().await?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(&password_hash)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE password_reset_tokens SET used = TRUE WHERE token_hash = $1")
            .bind(hash_token(&request.token))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.revoke_user_refresh_tokens(user_id).await?;
        self.audit
            .record_quietly(
                NewAuditEntry::new(user_id, AuditAction::PasswordChange, "users")
                    .resource(user_id)
                    .metadata(json!({ "via": "reset" })),
            )
            .await;

        Ok(MessageResponse {
            message: "Password has been reset".to_string(),
        })
    }

    pub async fn change_password(
        &self,
        session: &UserSession,
        request: ChangePasswordRequest,
        origin: RequestOrigin,
    ) -> Result<MessageResponse, AuthError> {
        let user = self
            .get_user_by_id(session.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        check_password_policy(&request.new_password)?;

        let password_hash = hash_password(&request.new_password)?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user.id)
            .bind(&password_hash)
            .execute(&self.db)
            .await?;

        self.revoke_user_refresh_tokens(user.id).await?;
        self.audit
            .record_quietly(
                NewAuditEntry::new(user.id, AuditAction::PasswordChange, "users")
                    .resource(user.id)
                    .user_name(user.email.clone())
                    .origin(origin),
            )
            .await;

        Ok(MessageResponse {
            message: "Password changed successfully".to_string(),
        })
    }

    /// Identifies a public customer by phone within a business and opens a client session.
    pub async fn identify_public_client(
        &self,
        business_slug: &str,
        phone: &str,
    ) -> Result<ClientSessionResponse, AuthError> {
        let digits = digits_only(phone);
        if digits.len() < 8 {
            return Err(AuthError::Validation("phone must have at least 8 digits".to_string()));
        }

        let business_id: Uuid = sqlx::query("SELECT id FROM profiles WHERE business_slug = $1")
            .bind(business_slug)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AuthError::BusinessNotFound)?
            .get("id");

        let client = sqlx::query(
            "SELECT id, name FROM clients
             WHERE user_id = $1 AND phone_digits = $2 AND deleted_at IS NULL
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .bind(business_id)
        .bind(&digits)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AuthError::ClientNotFound)?;

        let client_id: Uuid = client.get("id");
        let client_name: String = client.get("name");
        let access_token = self.jwt_service.create_client_token(client_id, business_id)?;

        Ok(ClientSessionResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.client_token_expires_in_seconds(),
            client_id,
            client_name,
            business_id,
        })
    }

    /// Current account information for the session owner.
    pub async fn current_user(&self, session: &UserSession) -> Result<UserInfo, AuthError> {
        let user = self
            .get_user_by_id(session.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let business_slug = self.get_business_slug(session.business_id).await?;

        Ok(UserInfo {
            id: user.id,
            email: user.email,
            role: session.role.clone(),
            business_slug,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }

    /// Check if token is blacklisted
    pub async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("SELECT 1 FROM token_blacklist WHERE jti = $1 AND expires_at > NOW()")
            .bind(jti)
            .fetch_optional(&self.db)
            .await?;

        Ok(result.is_some())
    }

    /// Validate user session from token
    pub async fn validate_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let session = self.jwt_service.extract_user_session(token)?;

        if self.is_token_blacklisted(&session.jti).await? {
            return Err(AuthError::InvalidToken);
        }

        Ok(session)
    }

    /// Changes the role of an account (platform administration).
    pub async fn update_user_role(&self, user_id: Uuid, role: &UserRole) -> Result<(), AuthError> {
        let updated = sqlx::query(
            "INSERT INTO user_roles (user_id, role)
             SELECT id, $2 FROM users WHERE id = $1
             ON CONFLICT (user_id) DO UPDATE SET role = $2, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    // Private helper methods

    async fn issue_session(
        &self,
        user: User,
        role: UserRole,
        business_slug: Option<String>,
    ) -> Result<AuthResponse, AuthError> {
        // The owner's account id doubles as the business id.
        let (access_token, refresh_token) =
            self.jwt_service
                .create_token_pair(user.id, &user.email, role.clone(), user.id)?;

        self.store_refresh_token(user.id, &refresh_token).await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
            user: UserInfo {
                id: user.id,
                email: user.email,
                role,
                business_slug,
                created_at: user.created_at,
                updated_at: user.updated_at,
            },
        })
    }

    async fn unique_slug(&self, business_name: &str) -> Result<String, AuthError> {
        let base = slugify(business_name);
        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let candidate = slug_candidate(&base, attempt);
            let taken = sqlx::query("SELECT 1 FROM profiles WHERE business_slug = $1")
                .bind(&candidate)
                .fetch_optional(&self.db)
                .await?
                .is_some();
            if !taken {
                return Ok(candidate);
            }
        }
        Ok(format!("{base}-{}", &Uuid::new_v4().simple().to_string()[..8]))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn get_user_role(&self, user_id: Uuid) -> Result<Option<UserRole>, AuthError> {
        let result = sqlx::query("SELECT role FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(result.and_then(|row| {
            let role_str: String = row.get("role");
            UserRole::from_str(&role_str)
        }))
    }

    async fn get_business_slug(&self, business_id: Uuid) -> Result<Option<String>, AuthError> {
        let row = sqlx::query("SELECT business_slug FROM profiles WHERE id = $1")
            .bind(business_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|r| r.get("business_slug")))
    }

    async fn store_refresh_token(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.jwt_service.validate_refresh_token(refresh_token)?;
        let expires_at = DateTime::from_timestamp(claims.exp as i64, 0)
            .ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn is_refresh_token_valid(&self, user_id: Uuid, refresh_token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "SELECT 1 FROM refresh_tokens
             WHERE user_id = $1 AND token_hash = $2 AND expires_at > NOW() AND NOT revoked",
        )
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .fetch_optional(&self.db)
        .await?;

        Ok(result.is_some())
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn blacklist_token(&self, jti: &str, exp: i64) -> Result<(), AuthError> {
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO token_blacklist (jti, expires_at) VALUES ($1, $2)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

fn check_password_policy(password: &str) -> Result<(), AuthError> {
    validate_password_strength(password, &PasswordPolicy::default())
        .map_err(|errors| AuthError::PasswordValidation(describe_password_errors(&errors)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_passwords_report_every_rule() {
        let err = check_password_policy("abc").unwrap_err();
        match err {
            AuthError::PasswordValidation(message) => {
                assert!(message.contains("Mínimo de 8 caracteres"));
                assert!(message.contains("Pelo menos uma letra maiúscula"));
                assert!(message.contains("Pelo menos um número"));
                assert!(message.contains("símbolo especial"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(check_password_policy("Str0ng!pass").is_ok());
    }
}
