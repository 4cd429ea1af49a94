//! Password hashing and signed token issuance.
//!
//! Passwords are hashed with bcrypt. bcrypt only looks at the first 72 bytes of
//! its input, so the hasher truncates explicitly before hashing and verifying:
//! two passwords sharing their first 72 bytes are interchangeable. Hashing
//! runs on the blocking pool so it never stalls the async executor.
//!
//! Tokens are HS256 JWTs signed with one shared secret. They are integrity
//! protected, not encrypted; every claim (role id included) is readable by the
//! holder.

use crate::{
    entities::user,
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// bcrypt ignores input beyond this many bytes.
pub const BCRYPT_MAX_PASSWORD_BYTES: usize = 72;

/// bcrypt wrapper with explicit 72-byte truncation.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// Creates a hasher with the given bcrypt cost.
    #[must_use]
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hashes `plaintext` (first 72 bytes only) on the blocking pool.
    pub async fn hash(&self, plaintext: &str) -> Result<String> {
        let input = truncate(plaintext).to_vec();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(input, cost))
            .await
            .map_err(|e| Error::internal(format!("Password hashing task failed: {e}")))?
            .map_err(|e| Error::internal(format!("Password hashing failed: {e}")))
    }

    /// Checks `plaintext` against a stored hash on the blocking pool. A
    /// malformed hash never verifies.
    pub async fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let input = truncate(plaintext).to_vec();
        let hash = hash.to_string();
        match tokio::task::spawn_blocking(move || bcrypt::verify(input, &hash)).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                warn!("Stored password hash could not be checked: {}", e);
                false
            }
            Err(e) => {
                warn!("Password check task failed: {}", e);
                false
            }
        }
    }
}

fn truncate(plaintext: &str) -> &[u8] {
    let bytes = plaintext.as_bytes();
    &bytes[..bytes.len().min(BCRYPT_MAX_PASSWORD_BYTES)]
}

/// Purpose of a token, carried in the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived API access
    Access,
    /// Long-lived, only exchangeable for a new access token
    Refresh,
    /// Single-purpose password reset link
    PasswordReset,
}

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// `inv_reg_id` for investors, numeric user id otherwise; email for reset tokens
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

/// Who a token subject refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// Bare integer subject: staff accounts
    UserId(i64),
    /// Anything else: investor registration id
    InvestorId(String),
}

impl Subject {
    /// Subject convention: registration id when present, else the numeric id.
    #[must_use]
    pub fn for_user(user: &user::Model) -> String {
        user.inv_reg_id
            .clone()
            .unwrap_or_else(|| user.id.to_string())
    }

    /// Splits a subject on whether it is a bare integer.
    #[must_use]
    pub fn parse(sub: &str) -> Self {
        if !sub.is_empty() && sub.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = sub.parse() {
                return Self::UserId(id);
            }
        }
        Self::InvestorId(sub.to_string())
    }
}

/// Access and refresh tokens issued at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Signs and checks tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    reset_ttl: Duration,
}

impl TokenService {
    /// Creates a token service from the shared secret and lifetimes.
    #[must_use]
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration, reset_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
            reset_ttl,
        }
    }

    fn sign(
        &self,
        sub: String,
        token_type: TokenType,
        role_id: Option<i32>,
        user_id: Option<i64>,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub,
            token_type,
            role_id,
            user_id,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::internal(format!("Token signing failed: {e}")))
    }

    /// Issues the access/refresh pair for a user.
    pub fn issue_pair(&self, user: &user::Model) -> Result<TokenPair> {
        let sub = Subject::for_user(user);
        let access_token = self.sign(
            sub.clone(),
            TokenType::Access,
            Some(user.role_id),
            Some(user.id),
            self.access_ttl,
        )?;
        let refresh_token = self.sign(
            sub,
            TokenType::Refresh,
            Some(user.role_id),
            Some(user.id),
            self.refresh_ttl,
        )?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        })
    }

    /// Mints a fresh access token carrying the subject and role of `claims`.
    pub fn reissue_access(&self, claims: &Claims) -> Result<String> {
        self.sign(
            claims.sub.clone(),
            TokenType::Access,
            claims.role_id,
            claims.user_id,
            self.access_ttl,
        )
    }

    /// Issues a password reset token whose subject is the account email.
    pub fn issue_reset(&self, email: &str) -> Result<String> {
        self.sign(
            email.to_string(),
            TokenType::PasswordReset,
            None,
            None,
            self.reset_ttl,
        )
    }

    /// Decodes a token and checks its type.
    ///
    /// Signature, expiry and type failures all become [`Error::InvalidToken`].
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| Error::InvalidToken)?
            .claims;
        if claims.token_type != expected {
            return Err(Error::InvalidToken);
        }
        Ok(claims)
    }

    /// Lifetime of reset tokens, shown in the reset email.
    #[must_use]
    pub const fn reset_ttl(&self) -> Duration {
        self.reset_ttl
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{TEST_BCRYPT_COST, test_user_model};

    fn service() -> TokenService {
        TokenService::new(
            "test-secret",
            Duration::minutes(15),
            Duration::days(7),
            Duration::minutes(15),
        )
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(TEST_BCRYPT_COST);
        let hash = hasher.hash("s3cret!").await.unwrap();
        assert_ne!(hash, "s3cret!");
        assert!(hasher.verify("s3cret!", &hash).await);
        assert!(!hasher.verify("wrong", &hash).await);
    }

    #[tokio::test]
    async fn test_passwords_are_truncated_to_72_bytes() {
        let hasher = PasswordHasher::new(TEST_BCRYPT_COST);
        let base = "a".repeat(BCRYPT_MAX_PASSWORD_BYTES);
        let hash = hasher.hash(&format!("{base}first-suffix")).await.unwrap();
        assert!(hasher.verify(&format!("{base}other-suffix"), &hash).await);
        assert!(!hasher.verify(&"a".repeat(71), &hash).await);
    }

    #[tokio::test]
    async fn test_malformed_hash_never_verifies() {
        let hasher = PasswordHasher::new(TEST_BCRYPT_COST);
        assert!(!hasher.verify("anything", "not-a-bcrypt-hash").await);
    }

    #[tokio::test]
    async fn test_invalid_cost_is_an_internal_fault() {
        // bcrypt rejects costs outside 4..=31.
        let err = PasswordHasher::new(3).hash("s3cret!").await.unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }

    #[test]
    fn test_subject_convention() {
        let investor = test_user_model(7, Some("I0003"), 1);
        let admin = test_user_model(8, None, 2);
        assert_eq!(Subject::for_user(&investor), "I0003");
        assert_eq!(Subject::for_user(&admin), "8");

        assert_eq!(Subject::parse("8"), Subject::UserId(8));
        assert_eq!(
            Subject::parse("I0003"),
            Subject::InvestorId("I0003".to_string())
        );
        assert_eq!(Subject::parse(""), Subject::InvestorId(String::new()));
    }

    #[test]
    fn test_pair_carries_role_and_type() {
        let tokens = service();
        let user = test_user_model(7, Some("I0003"), 1);
        let pair = tokens.issue_pair(&user).unwrap();

        let access = tokens.decode(&pair.access_token, TokenType::Access).unwrap();
        assert_eq!(access.sub, "I0003");
        assert_eq!(access.role_id, Some(1));
        assert_eq!(access.user_id, Some(7));

        let refresh = tokens
            .decode(&pair.refresh_token, TokenType::Refresh)
            .unwrap();
        assert_eq!(refresh.sub, "I0003");
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let tokens = service();
        let pair = tokens.issue_pair(&test_user_model(1, None, 2)).unwrap();
        assert!(matches!(
            tokens.decode(&pair.access_token, TokenType::Refresh),
            Err(Error::InvalidToken)
        ));
        let reset = tokens.issue_reset("a@x.com").unwrap();
        assert!(matches!(
            tokens.decode(&reset, TokenType::Access),
            Err(Error::InvalidToken)
        ));
        assert_eq!(
            tokens.decode(&reset, TokenType::PasswordReset).unwrap().sub,
            "a@x.com"
        );
    }

    #[test]
    fn test_expired_and_foreign_tokens_are_rejected() {
        let expired = TokenService::new(
            "test-secret",
            Duration::minutes(-10),
            Duration::minutes(-10),
            Duration::minutes(-10),
        );
        let token = expired.issue_reset("a@x.com").unwrap();
        assert!(matches!(
            service().decode(&token, TokenType::PasswordReset),
            Err(Error::InvalidToken)
        ));

        let other = TokenService::new(
            "other-secret",
            Duration::minutes(15),
            Duration::days(7),
            Duration::minutes(15),
        );
        let token = other.issue_reset("a@x.com").unwrap();
        assert!(matches!(
            service().decode(&token, TokenType::PasswordReset),
            Err(Error::InvalidToken)
        ));
        assert!(matches!(
            service().decode("garbage", TokenType::Access),
            Err(Error::InvalidToken)
        ));
    }
}
