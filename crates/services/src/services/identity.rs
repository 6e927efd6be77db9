//! Verification and ingestion of identity-provider webhooks.
//!
//! The provider signs deliveries svix-style: HMAC-SHA256 over
//! `"{id}.{timestamp}.{payload}"` with a `whsec_`-prefixed base64 secret,
//! sent as space-separated `v1,<base64>` entries.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Duration, TimeZone, Utc};
use db::models::user::{CreateUser, User};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::Deserialize;
use sha2::Sha256;
use sqlx::SqlitePool;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::info;

type HmacSha256 = Hmac<Sha256>;

const SECRET_PREFIX: &str = "whsec_";
const TIMESTAMP_TOLERANCE_MINUTES: i64 = 5;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("malformed webhook secret")]
    MalformedSecret,
    #[error("malformed webhook timestamp")]
    MalformedTimestamp,
    #[error("webhook timestamp outside tolerance")]
    StaleTimestamp,
    #[error("webhook signature mismatch")]
    InvalidSignature,
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// `user.created` event payload, trimmed to the fields we persist.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: IdentityUserData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityUserData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<IdentityEmail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEmail {
    pub email_address: String,
}

pub struct IdentityWebhookVerifier {
    key: Vec<u8>,
}

impl IdentityWebhookVerifier {
    pub fn new(secret: &str) -> Result<Self, WebhookError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = BASE64
            .decode(encoded)
            .map_err(|_| WebhookError::MalformedSecret)?;
        Ok(Self { key })
    }

    /// Verify a delivery against its `webhook-id`, unix-seconds timestamp,
    /// and signature header.
    pub fn verify(
        &self,
        msg_id: &str,
        timestamp: &str,
        signatures: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let seconds: i64 = timestamp
            .parse()
            .map_err(|_| WebhookError::MalformedTimestamp)?;
        let sent_at = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or(WebhookError::MalformedTimestamp)?;

        let tolerance = Duration::minutes(TIMESTAMP_TOLERANCE_MINUTES);
        if sent_at < now - tolerance || sent_at > now + tolerance {
            return Err(WebhookError::StaleTimestamp);
        }

        let expected = self.sign(msg_id, timestamp, payload);

        // Header carries space-separated versioned entries; any matching v1
        // entry passes.
        for entry in signatures.split(' ') {
            let Some(candidate) = entry.strip_prefix("v1,") else {
                continue;
            };
            let Ok(candidate) = BASE64.decode(candidate) else {
                continue;
            };
            if candidate.ct_eq(&expected).into() {
                return Ok(());
            }
        }

        Err(WebhookError::InvalidSignature)
    }

    fn sign(&self, msg_id: &str, timestamp: &str, payload: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    /// Signature header value for a delivery, used by tests and tooling.
    pub fn signature_header(&self, msg_id: &str, timestamp: &str, payload: &[u8]) -> String {
        format!("v1,{}", BASE64.encode(self.sign(msg_id, timestamp, payload)))
    }
}

/// Provision the local user row for a `user.created` event. Idempotent:
/// redelivery of an already-ingested subject is a no-op.
pub async fn provision_user(
    pool: &SqlitePool,
    data: &IdentityUserData,
) -> Result<Option<User>, WebhookError> {
    if User::find_by_external_id(pool, &data.id).await?.is_some() {
        info!(external_id = %data.id, "user already provisioned, skipping");
        return Ok(None);
    }

    let email = data
        .email_addresses
        .first()
        .map(|e| e.email_address.clone())
        .unwrap_or_default();
    let anonymous_name = format!("User{}", rand::thread_rng().gen_range(1..=9999));

    let user = User::create(
        pool,
        &CreateUser {
            external_id: data.id.clone(),
            email,
            anonymous_name,
        },
    )
    .await?;

    info!(user_id = %user.id, external_id = %user.external_id, "provisioned new user");
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    fn verifier() -> IdentityWebhookVerifier {
        let secret = format!("whsec_{}", BASE64.encode(b"test-signing-key"));
        IdentityWebhookVerifier::new(&secret).unwrap()
    }

    #[test]
    fn test_verify_accepts_valid_signature() {
        let v = verifier();
        let now = Utc::now();
        let ts = now.timestamp().to_string();
        let payload = br#"{"type":"user.created","data":{"id":"idp_1"}}"#;

        let header = v.signature_header("msg_1", &ts, payload);
        v.verify("msg_1", &ts, &header, payload, now).unwrap();

        // Unknown versions alongside a valid v1 entry still pass.
        let header = format!("v2,garbage {header}");
        v.verify("msg_1", &ts, &header, payload, now).unwrap();
    }

    #[test]
    fn test_verify_rejects_wrong_key_and_tampered_payload() {
        let v = verifier();
        let other =
            IdentityWebhookVerifier::new(&format!("whsec_{}", BASE64.encode(b"other-key")))
                .unwrap();
        let now = Utc::now();
        let ts = now.timestamp().to_string();
        let payload = b"{}";

        let header = other.signature_header("msg_1", &ts, payload);
        assert!(matches!(
            v.verify("msg_1", &ts, &header, payload, now),
            Err(WebhookError::InvalidSignature)
        ));

        let header = v.signature_header("msg_1", &ts, payload);
        assert!(matches!(
            v.verify("msg_1", &ts, &header, b"{tampered}", now),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_rejects_stale_timestamp() {
        let v = verifier();
        let now = Utc::now();
        let old = now - Duration::minutes(10);
        let ts = old.timestamp().to_string();
        let payload = b"{}";

        let header = v.signature_header("msg_1", &ts, payload);
        assert!(matches!(
            v.verify("msg_1", &ts, &header, payload, now),
            Err(WebhookError::StaleTimestamp)
        ));

        assert!(matches!(
            v.verify("msg_1", "not-a-number", &header, payload, now),
            Err(WebhookError::MalformedTimestamp)
        ));
    }

    #[tokio::test]
    async fn test_provision_user_is_idempotent() {
        let db = DBService::new_in_memory().await.unwrap();
        let data = IdentityUserData {
            id: "idp_42".to_string(),
            email_addresses: vec![IdentityEmail {
                email_address: "learner@example.com".to_string(),
            }],
        };

        let user = provision_user(&db.pool, &data).await.unwrap().unwrap();
        assert_eq!(user.external_id, "idp_42");
        assert_eq!(user.email, "learner@example.com");
        assert!(user.anonymous_name.starts_with("User"));

        // Redelivery is a no-op.
        assert!(provision_user(&db.pool, &data).await.unwrap().is_none());
    }
}
