use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::auth::{request_origin, AuthError, UserSession};
use crate::models::AuditContext;

/// Authenticated caller of a business route: the tenant it acts on and the
/// audit context for any write it performs.
#[derive(Debug, Clone)]
pub struct Staff {
    pub business_id: Uuid,
    pub session: UserSession,
    pub audit: AuditContext,
}

#[async_trait]
impl<S> FromRequestParts<S> for Staff
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<UserSession>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)?;

        let audit = AuditContext {
            user_id: session.user_id,
            user_name: Some(session.email.clone()),
            origin: request_origin(&parts.headers),
        };

        Ok(Self {
            business_id: session.business_id,
            session,
            audit,
        })
    }
}

/// Public customer identified through a client session token.
#[derive(Debug, Clone)]
pub struct ClientCaller {
    pub business_id: Uuid,
    pub client_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientCaller
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<UserSession>()
            .ok_or(AuthError::MissingAuthHeader)?;

        Ok(Self {
            business_id: session.business_id,
            client_id: session.user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserRole;
    use axum::http::Request;

    fn session() -> UserSession {
        UserSession {
            user_id: Uuid::new_v4(),
            email: "dono@barbearia.com".into(),
            role: UserRole::Owner,
            business_id: Uuid::new_v4(),
            jti: "jti".into(),
        }
    }

    #[tokio::test]
    async fn staff_carries_session_and_origin() {
        let session = session();
        let (mut parts, _) = Request::builder()
            .header("x-real-ip", "192.168.0.9")
            .body(())
            .unwrap()
            .into_parts();
        parts.extensions.insert(session.clone());

        let staff = Staff::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(staff.business_id, session.business_id);
        assert_eq!(staff.audit.user_id, session.user_id);
        assert_eq!(staff.audit.user_name.as_deref(), Some("dono@barbearia.com"));
        assert_eq!(staff.audit.origin.ip_address.as_deref(), Some("192.168.0.9"));
    }

    #[tokio::test]
    async fn missing_session_is_rejected() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let err = Staff::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingAuthHeader));
    }
}
