use bson::oid::ObjectId;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token expired")]
    TokenExpired,
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

#[derive(Debug, Deserialize)]
pub struct Claims {
    /// External identity id (hex ObjectId).
    pub sub: String,
    /// Display name as the identity service knows it.
    #[serde(default)]
    pub name: String,
    pub exp: i64,
}

/// Verified identity attached to a connection or request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: ObjectId,
    pub display_name: String,
}

/// Verifies access tokens minted by the external identity service.
/// This engine never issues tokens.
pub struct AuthService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let user_id = ObjectId::parse_str(&data.claims.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not an ObjectId".to_string()))?;

        let display_name = if data.claims.name.is_empty() {
            user_id.to_hex()[..8].to_string()
        } else {
            data.claims.name
        };

        Ok(Identity {
            user_id,
            display_name,
        })
    }
}
