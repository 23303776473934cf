//! Webhook ingestion gate
//!
//! Wraps the reconciler with signature verification and idempotency-key
//! deduplication. Delivery from the provider is at-least-once; the unique
//! constraint on the ledger's idempotency key is what turns that into
//! exactly-once effect. The ledger row is appended in the same transaction
//! as the subscription mutation, so a crash between the two cannot let a
//! redelivery double-apply an event.

use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use sqlx::PgPool;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::reconcile::reconcile;

type HmacSha256 = Hmac<Sha256>;

/// Terminal state of one inbound webhook delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// The idempotency key was already in the ledger; nothing was re-applied
    Duplicate {
        idempotency_key: String,
        event_type: String,
    },
    /// Fresh delivery: reconciled and recorded
    Processed {
        idempotency_key: String,
        event_type: String,
        updated_subscription: bool,
        org_id: Option<Uuid>,
    },
}

/// Verify an HMAC-SHA256 hex signature over the exact raw request bytes
///
/// With no secret configured, verification is skipped entirely: explicit
/// permissive mode for environments without a shared secret. With a secret,
/// a missing signature is a rejection.
pub fn verify_signature(payload: &[u8], signature: Option<&str>, secret: Option<&str>) -> bool {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return true;
    };
    let Some(signature) = signature.filter(|s| !s.is_empty()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_compare(signature, &expected)
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        // Do a dummy comparison to avoid length-based timing attacks
        let dummy = vec![0u8; a.len()];
        let _ = a.as_bytes().ct_eq(&dummy);
        return false;
    }

    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Resolve the deduplication key for a delivery
///
/// The transport-level event-id header wins; the payload's `id` field is
/// the fallback.
pub fn resolve_idempotency_key(event_id_header: Option<&str>, payload: &Value) -> Option<String> {
    event_id_header
        .filter(|s| !s.is_empty())
        .or_else(|| payload.get("id").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

async fn ledger_event_type(pool: &PgPool, idempotency_key: &str) -> BillingResult<Option<String>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT event_type FROM billing_events WHERE idempotency_key = $1")
            .bind(idempotency_key)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|r| r.0))
}

/// Process one raw webhook delivery end to end
///
/// State machine: signature check -> JSON decode -> idempotency lookup ->
/// {Duplicate | reconcile + ledger append in one transaction}. Malformed
/// input is rejected before any persistence; unrecognized or unresolvable
/// events are still recorded in the ledger (with null org) for audit.
pub async fn ingest(
    pool: &PgPool,
    raw: &[u8],
    event_id_header: Option<&str>,
    signature: Option<&str>,
    secret: Option<&str>,
) -> BillingResult<IngestOutcome> {
    if !verify_signature(raw, signature, secret) {
        return Err(BillingError::SignatureInvalid);
    }

    let payload: Value =
        serde_json::from_slice(raw).map_err(|e| BillingError::InvalidPayload(e.to_string()))?;

    let idempotency_key = resolve_idempotency_key(event_id_header, &payload)
        .ok_or(BillingError::MissingIdempotencyKey)?;

    let event_type = payload
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    if let Some(existing_type) = ledger_event_type(pool, &idempotency_key).await? {
        tracing::info!(
            idempotency_key = %idempotency_key,
            event_type = %existing_type,
            "Duplicate webhook delivery short-circuited"
        );
        return Ok(IngestOutcome::Duplicate {
            idempotency_key,
            event_type: existing_type,
        });
    }

    let mut tx = pool.begin().await?;

    let outcome = reconcile(&mut *tx, &payload).await?;

    let insert_result = sqlx::query(
        r#"
        INSERT INTO billing_events (id, org_id, event_type, idempotency_key, payload)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(outcome.org_id)
    .bind(&event_type)
    .bind(&idempotency_key)
    .bind(&payload)
    .execute(&mut *tx)
    .await;

    match insert_result {
        Ok(_) => {
            tx.commit().await?;
        }
        Err(err) if is_unique_violation(&err) => {
            // Lost the race against a concurrent identical delivery: the
            // other request's ledger row is authoritative, ours rolls back.
            drop(tx);
            tracing::info!(
                idempotency_key = %idempotency_key,
                "Concurrent duplicate delivery lost the ledger race"
            );
            let event_type = ledger_event_type(pool, &idempotency_key)
                .await?
                .unwrap_or(event_type);
            return Ok(IngestOutcome::Duplicate {
                idempotency_key,
                event_type,
            });
        }
        Err(err) => return Err(err.into()),
    }

    tracing::info!(
        idempotency_key = %idempotency_key,
        event_type = %event_type,
        updated = outcome.updated,
        org_id = ?outcome.org_id,
        "Webhook event processed"
    );

    Ok(IngestOutcome::Processed {
        idempotency_key,
        event_type,
        updated_subscription: outcome.updated,
        org_id: outcome.org_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sign(payload: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    // =========================================================================
    // Signature verification
    // =========================================================================

    #[test]
    fn test_no_secret_skips_verification() {
        assert!(verify_signature(b"anything", None, None));
        assert!(verify_signature(b"anything", Some("garbage"), None));
        assert!(verify_signature(b"anything", None, Some("")));
    }

    #[test]
    fn test_secret_without_signature_rejects() {
        assert!(!verify_signature(b"payload", None, Some("secret")));
        assert!(!verify_signature(b"payload", Some(""), Some("secret")));
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"id":"evt_1","type":"customer.subscription.updated"}"#;
        let signature = sign(payload, "test-secret");
        assert!(verify_signature(
            payload,
            Some(&signature),
            Some("test-secret")
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        let signature = sign(payload, "test-secret");
        assert!(!verify_signature(
            br#"{"id":"evt_2"}"#,
            Some(&signature),
            Some("test-secret")
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        let signature = sign(payload, "other-secret");
        assert!(!verify_signature(
            payload,
            Some(&signature),
            Some("test-secret")
        ));
    }

    #[test]
    fn test_constant_time_compare_length_mismatch() {
        assert!(!constant_time_compare("abc", "abcd"));
        assert!(constant_time_compare("abcd", "abcd"));
        assert!(!constant_time_compare("abcd", "abce"));
    }

    // =========================================================================
    // Idempotency key resolution
    // =========================================================================

    #[test]
    fn test_header_wins_over_payload_id() {
        let payload = json!({"id": "evt_payload"});
        assert_eq!(
            resolve_idempotency_key(Some("evt_header"), &payload),
            Some("evt_header".to_string())
        );
    }

    #[test]
    fn test_payload_id_is_fallback() {
        let payload = json!({"id": "evt_payload"});
        assert_eq!(
            resolve_idempotency_key(None, &payload),
            Some("evt_payload".to_string())
        );
        // Empty header falls through to the payload
        assert_eq!(
            resolve_idempotency_key(Some(""), &payload),
            Some("evt_payload".to_string())
        );
    }

    #[test]
    fn test_missing_both_yields_none() {
        assert_eq!(resolve_idempotency_key(None, &json!({})), None);
        assert_eq!(resolve_idempotency_key(None, &json!({"id": ""})), None);
        assert_eq!(resolve_idempotency_key(None, &json!({"id": 42})), None);
    }
}
