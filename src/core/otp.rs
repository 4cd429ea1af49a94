//! One-time passcodes and pending registrations.
//!
//! Both live in the injected [`TtlStore`], keyed by normalized email. There is
//! at most one live OTP per email: issuing again overwrites. Verification
//! consumes the record whatever the outcome, so a code can never be replayed.

use crate::{
    cache::TtlStore,
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::{debug, warn};

const OTP_PREFIX: &str = "otp:";
const PENDING_PREFIX: &str = "pending_registration:";

#[derive(Debug, Serialize, Deserialize)]
struct OtpRecord {
    code: String,
    expires_at: DateTime<Utc>,
}

/// Issues and checks OTPs and holds registrations awaiting verification.
#[derive(Clone)]
pub struct OtpRegistry {
    store: Arc<dyn TtlStore>,
    otp_ttl: Duration,
    pending_ttl: Duration,
}

impl OtpRegistry {
    /// Creates a registry over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TtlStore>, otp_ttl: Duration, pending_ttl: Duration) -> Self {
        Self {
            store,
            otp_ttl,
            pending_ttl,
        }
    }

    /// How long an issued code stays valid.
    #[must_use]
    pub const fn otp_ttl(&self) -> Duration {
        self.otp_ttl
    }

    /// Generates a 6-digit code for `email`, replacing any live one.
    pub async fn issue(&self, email: &str) -> Result<String> {
        let code = rand::rng().random_range(100_000..=999_999).to_string();
        let record = OtpRecord {
            code: code.clone(),
            expires_at: Utc::now() + self.otp_ttl,
        };
        self.store
            .set(&otp_key(email), encode(&record)?, self.otp_ttl)
            .await?;
        debug!(email, "Issued OTP");
        Ok(code)
    }

    /// Consumes the OTP for `email` and checks it against `code`.
    ///
    /// Missing, expired and mismatched codes are indistinguishable to the caller.
    pub async fn verify(&self, email: &str, code: &str) -> Result<()> {
        let Some(raw) = self.store.take(&otp_key(email)).await? else {
            debug!(email, "No live OTP");
            return Err(Error::InvalidOtp);
        };
        let record: OtpRecord = serde_json::from_str(&raw).map_err(|e| {
            warn!(email, "Discarding unreadable OTP record: {}", e);
            Error::InvalidOtp
        })?;
        if Utc::now() >= record.expires_at || record.code != code.trim() {
            return Err(Error::InvalidOtp);
        }
        Ok(())
    }

    /// Drops any live OTP for `email`.
    pub async fn discard(&self, email: &str) -> Result<()> {
        self.store.delete(&otp_key(email)).await?;
        Ok(())
    }

    /// Parks a registration payload until its OTP is verified.
    pub async fn hold_registration<T: Serialize>(&self, email: &str, payload: &T) -> Result<()> {
        self.store
            .set(&pending_key(email), encode(payload)?, self.pending_ttl)
            .await
    }

    /// Removes and returns the parked payload, if it is still live.
    pub async fn take_registration<T: DeserializeOwned>(&self, email: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.take(&pending_key(email)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::DataIntegrity {
                message: format!("Pending registration for {email} is unreadable: {e}"),
            })
    }

    /// Whether a live payload is parked for `email`.
    pub async fn has_registration(&self, email: &str) -> Result<bool> {
        self.store.exists(&pending_key(email)).await
    }

    /// Drops the parked payload for `email`.
    pub async fn discard_registration(&self, email: &str) -> Result<()> {
        self.store.delete(&pending_key(email)).await?;
        Ok(())
    }
}

fn otp_key(email: &str) -> String {
    format!("{OTP_PREFIX}{email}")
}

fn pending_key(email: &str) -> String {
    format!("{PENDING_PREFIX}{email}")
}

fn encode<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::DataIntegrity {
        message: format!("Could not encode cache entry: {e}"),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::cache::InMemoryTtlStore;

    fn registry(store: Arc<InMemoryTtlStore>, otp_ttl: Duration) -> OtpRegistry {
        OtpRegistry::new(store, otp_ttl, Duration::minutes(30))
    }

    #[tokio::test]
    async fn test_issue_then_verify_once() -> Result<()> {
        let otp = registry(Arc::new(InMemoryTtlStore::new()), Duration::minutes(5));
        let code = otp.issue("a@x.com").await?;
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        otp.verify("a@x.com", &code).await?;
        assert!(matches!(
            otp.verify("a@x.com", &code).await,
            Err(Error::InvalidOtp)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_code_consumes_record() -> Result<()> {
        let otp = registry(Arc::new(InMemoryTtlStore::new()), Duration::minutes(5));
        let code = otp.issue("a@x.com").await?;
        let wrong = if code == "111111" { "222222" } else { "111111" };

        assert!(matches!(
            otp.verify("a@x.com", wrong).await,
            Err(Error::InvalidOtp)
        ));
        assert!(matches!(
            otp.verify("a@x.com", &code).await,
            Err(Error::InvalidOtp)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_reissue_overwrites_previous_code() -> Result<()> {
        let store = Arc::new(InMemoryTtlStore::new());
        let otp = registry(Arc::clone(&store), Duration::minutes(5));
        otp.issue("a@x.com").await?;
        let second = otp.issue("a@x.com").await?;
        assert_eq!(store.len(), 1);
        otp.verify("a@x.com", &second).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected() -> Result<()> {
        let otp = registry(Arc::new(InMemoryTtlStore::new()), Duration::zero());
        let code = otp.issue("a@x.com").await?;
        assert!(matches!(
            otp.verify("a@x.com", &code).await,
            Err(Error::InvalidOtp)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_email_is_rejected() {
        let otp = registry(Arc::new(InMemoryTtlStore::new()), Duration::minutes(5));
        assert!(matches!(
            otp.verify("nobody@x.com", "123456").await,
            Err(Error::InvalidOtp)
        ));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        name: String,
    }

    #[tokio::test]
    async fn test_pending_registration_is_taken_once() -> Result<()> {
        let otp = registry(Arc::new(InMemoryTtlStore::new()), Duration::minutes(5));
        let payload = Payload {
            name: "Asha".to_string(),
        };
        otp.hold_registration("a@x.com", &payload).await?;

        let taken: Option<Payload> = otp.take_registration("a@x.com").await?;
        assert_eq!(taken, Some(payload));
        let again: Option<Payload> = otp.take_registration("a@x.com").await?;
        assert!(again.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_pending_payload_is_integrity_error() -> Result<()> {
        let store = Arc::new(InMemoryTtlStore::new());
        store
            .set(
                "pending_registration:a@x.com",
                "{not json".to_string(),
                Duration::minutes(5),
            )
            .await?;
        let otp = registry(store, Duration::minutes(5));
        let result: Result<Option<Payload>> = otp.take_registration("a@x.com").await;
        assert!(matches!(result, Err(Error::DataIntegrity { .. })));
        Ok(())
    }
}
