use axum::{RequestPartsExt, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use db::models::user::User;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Validate an identity-provider bearer token and return its subject.
pub(crate) fn decode_subject(secret: &str, token: &str) -> Result<String, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| ApiError::Unauthenticated)?;
    Ok(data.claims.sub)
}

/// The authenticated caller, resolved from the bearer token to a local user
/// row. The manager never parses credentials beyond this extractor.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthenticated)?;

        let subject = decode_subject(&state.config.jwt_secret, bearer.token())?;

        let user = User::find_by_external_id(&state.db.pool, &subject)
            .await?
            .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: i64,
    }

    fn token(secret: &str, sub: &str, exp: i64) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                sub: sub.to_string(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_subject_roundtrip() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = token("secret", "idp_123", exp);
        assert_eq!(decode_subject("secret", &token).unwrap(), "idp_123");
    }

    #[test]
    fn test_decode_subject_rejects_bad_tokens() {
        let exp = chrono::Utc::now().timestamp() + 3600;

        // Wrong secret.
        let token_wrong = token("other", "idp_123", exp);
        assert!(matches!(
            decode_subject("secret", &token_wrong),
            Err(ApiError::Unauthenticated)
        ));

        // Expired.
        let token_expired = token("secret", "idp_123", chrono::Utc::now().timestamp() - 3600);
        assert!(matches!(
            decode_subject("secret", &token_expired),
            Err(ApiError::Unauthenticated)
        ));

        // Garbage.
        assert!(matches!(
            decode_subject("secret", "not-a-token"),
            Err(ApiError::Unauthenticated)
        ));
    }
}
