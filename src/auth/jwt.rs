use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::{AuthError, Claims, TokenType, UserRole, UserSession};

/// JWT token service for creating and validating tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: Duration,
    refresh_token_expires_in: Duration,
    client_token_expires_in: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .field("access_token_expires_in", &self.access_token_expires_in)
            .field("refresh_token_expires_in", &self.refresh_token_expires_in)
            .field("client_token_expires_in", &self.client_token_expires_in)
            .finish()
    }
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: Duration::minutes(15),
            refresh_token_expires_in: Duration::days(30),
            client_token_expires_in: Duration::days(7),
        }
    }

    fn sign(
        &self,
        subject: Uuid,
        email: &str,
        role: UserRole,
        business_id: Uuid,
        typ: TokenType,
        lifetime: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + lifetime;

        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            role,
            bid: business_id.to_string(),
            typ,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Create an access token for a staff account
    pub fn create_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
        business_id: Uuid,
    ) -> Result<String, AuthError> {
        self.sign(user_id, email, role, business_id, TokenType::Access, self.access_token_expires_in)
    }

    /// Create a refresh token for a staff account
    pub fn create_refresh_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
        business_id: Uuid,
    ) -> Result<String, AuthError> {
        self.sign(user_id, email, role, business_id, TokenType::Refresh, self.refresh_token_expires_in)
    }

    /// Public customer session, scoped to one business.
    pub fn create_client_token(
        &self,
        client_id: Uuid,
        business_id: Uuid,
    ) -> Result<String, AuthError> {
        self.sign(
            client_id,
            "",
            UserRole::Client,
            business_id,
            TokenType::Client,
            self.client_token_expires_in,
        )
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Claims of a refresh token; access and client tokens are refused.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.validate_token(token)?;
        if claims.typ != TokenType::Refresh {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    /// Extract user session from token. Refresh tokens never open a session.
    pub fn extract_user_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let claims = self.validate_token(token)?;
        if !claims.typ.opens_session() {
            return Err(AuthError::InvalidToken);
        }
        UserSession::from_claims(&claims).map_err(|_| AuthError::InvalidToken)
    }

    pub fn access_token_expires_in_seconds(&self) -> usize {
        self.access_token_expires_in.num_seconds() as usize
    }

    pub fn client_token_expires_in_seconds(&self) -> usize {
        self.client_token_expires_in.num_seconds() as usize
    }

    /// Extract JWT ID from token (for blacklisting)
    pub fn extract_jti(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.validate_token(token)?;
        Ok(claims.jti)
    }

    /// Create token pair (access + refresh)
    pub fn create_token_pair(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
        business_id: Uuid,
    ) -> Result<(String, String), AuthError> {
        let access_token = self.create_access_token(user_id, email, role.clone(), business_id)?;
        let refresh_token = self.create_refresh_token(user_id, email, role, business_id)?;
        Ok((access_token, refresh_token))
    }
}

/// Extract bearer token from authorization header
pub fn extract_bearer_token(auth_header: &str) -> Result<&str, AuthError> {
    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::InvalidAuthHeaderFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_creation_and_validation() {
        let jwt_service = JwtService::new("test_secret");
        let user_id = Uuid::new_v4();
        let email = "owner@example.com";

        let token = jwt_service
            .create_access_token(user_id, email, UserRole::Owner, user_id)
            .unwrap();

        let claims = jwt_service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.bid, user_id.to_string());
        assert_eq!(claims.email, email);
        assert_eq!(claims.role, UserRole::Owner);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(extract_bearer_token("Bearer test_token").unwrap(), "test_token");

        assert!(extract_bearer_token("Invalid header").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
        assert!(extract_bearer_token("bearer token").is_err());
    }

    #[test]
    fn client_token_is_bound_to_business() {
        let jwt_service = JwtService::new("test_secret");
        let client_id = Uuid::new_v4();
        let business_id = Uuid::new_v4();

        let token = jwt_service.create_client_token(client_id, business_id).unwrap();
        let session = jwt_service.extract_user_session(&token).unwrap();

        assert_eq!(session.user_id, client_id);
        assert_eq!(session.business_id, business_id);
        assert_eq!(session.role, UserRole::Client);

        let claims = jwt_service.validate_token(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = JwtService::new("secret-a");
        let verifier = JwtService::new("secret-b");
        let id = Uuid::new_v4();
        let token = issuer.create_access_token(id, "a@b.c", UserRole::Owner, id).unwrap();

        assert!(matches!(verifier.validate_token(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_token_pair_creation() {
        let jwt_service = JwtService::new("test_secret");
        let user_id = Uuid::new_v4();

        let (access_token, refresh_token) = jwt_service
            .create_token_pair(user_id, "admin@example.com", UserRole::Admin, user_id)
            .unwrap();

        assert_eq!(jwt_service.validate_token(&access_token).unwrap().typ, TokenType::Access);
        assert_eq!(jwt_service.validate_token(&refresh_token).unwrap().typ, TokenType::Refresh);

        let access_jti = jwt_service.extract_jti(&access_token).unwrap();
        let refresh_jti = jwt_service.extract_jti(&refresh_token).unwrap();
        assert_ne!(access_jti, refresh_jti);
    }

    #[test]
    fn refresh_token_does_not_open_a_session() {
        let jwt_service = JwtService::new("test_secret");
        let user_id = Uuid::new_v4();
        let business_id = Uuid::new_v4();

        let refresh = jwt_service
            .create_refresh_token(user_id, "owner@example.com", UserRole::Owner, business_id)
            .unwrap();

        assert!(matches!(
            jwt_service.extract_user_session(&refresh),
            Err(AuthError::InvalidToken)
        ));
        assert!(jwt_service.validate_refresh_token(&refresh).is_ok());
    }

    #[test]
    fn session_tokens_cannot_be_used_to_refresh() {
        let jwt_service = JwtService::new("test_secret");
        let user_id = Uuid::new_v4();

        let access = jwt_service
            .create_access_token(user_id, "owner@example.com", UserRole::Owner, user_id)
            .unwrap();
        let client = jwt_service.create_client_token(Uuid::new_v4(), user_id).unwrap();

        assert!(jwt_service.extract_user_session(&access).is_ok());
        assert!(matches!(
            jwt_service.validate_refresh_token(&access),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            jwt_service.validate_refresh_token(&client),
            Err(AuthError::InvalidToken)
        ));
    }
}
