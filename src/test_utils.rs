//! Shared test utilities.
//!
//! In-memory `SQLite` setup, row builders with sensible defaults, and
//! recording doubles for the email, file storage and payment collaborators.

#![allow(clippy::unwrap_used)]

use crate::{
    cache::InMemoryTtlStore,
    config::settings::{SecuritySettings, Settings, StorageSettings},
    context::{AppContext, Collaborators},
    core::auth::{self, RegistrationForm},
    entities::{User, investment, plan_type, user},
    errors::{Error, Result},
    services::{
        EmailMessage, EmailSender, FileStore, GatewayOrder, PaymentGateway, UploadedFile,
    },
};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal_macros::dec;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Set, prelude::*};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Lowest cost bcrypt accepts; keeps hashing fast in tests.
pub const TEST_BCRYPT_COST: u32 = 4;
/// Password used by [`investor_form`].
pub const TEST_PASSWORD: &str = "Secr3t!pass";
/// Key id reported by [`FakeGateway`].
pub const FAKE_GATEWAY_KEY: &str = "rzp_test_fake";
/// The only signature [`FakeGateway`] accepts.
pub const FAKE_GATEWAY_SIGNATURE: &str = "valid-signature";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Settings with short bcrypt cost and no outbound credentials.
#[must_use]
pub fn test_settings() -> Settings {
    Settings {
        database_url: "sqlite::memory:".to_string(),
        security: SecuritySettings {
            jwt_secret: "test-secret".to_string(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            reset_token_ttl: Duration::minutes(15),
            otp_ttl: Duration::minutes(5),
            pending_registration_ttl: Duration::minutes(30),
            bcrypt_cost: TEST_BCRYPT_COST,
        },
        frontend_base_url: "http://localhost:3000/".to_string(),
        smtp: None,
        storage: StorageSettings::Local {
            upload_dir: "uploads/bonds".to_string(),
            public_prefix: "/uploads/bonds".to_string(),
        },
        razorpay: None,
    }
}

/// Investor registration form with defaults for everything but email and mobile.
#[must_use]
pub fn investor_form(email: &str, mobile: &str) -> RegistrationForm {
    RegistrationForm {
        role_id: 1,
        first_name: "Asha".to_string(),
        last_name: "Rao".to_string(),
        email: email.to_string(),
        mobile: mobile.to_string(),
        password: TEST_PASSWORD.to_string(),
        gender_id: 1,
        age: 30,
        dob: NaiveDate::from_ymd_opt(1995, 1, 1).unwrap(),
    }
}

/// Unsaved user model, for code that never touches the store.
#[must_use]
pub fn test_user_model(id: i64, inv_reg_id: Option<&str>, role_id: i32) -> user::Model {
    user::Model {
        id,
        inv_reg_id: inv_reg_id.map(str::to_string),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: format!("user{id}@x.com"),
        mobile: format!("90000{id:05}"),
        password: "not-a-real-hash".to_string(),
        gender_id: 1,
        age: 30,
        dob: NaiveDate::from_ymd_opt(1995, 1, 1).unwrap(),
        role_id,
        is_verified: true,
        is_active: true,
        bank_id: None,
        bank_account_no: None,
        ifsc_code: None,
        created_by: None,
        created_date: Utc::now(),
        modified_by: None,
        modified_date: None,
    }
}

/// Inserts a verified, active user directly. The password is not a valid hash.
pub async fn insert_test_user(
    db: &DatabaseConnection,
    email: &str,
    mobile: &str,
    inv_reg_id: Option<&str>,
    role_id: i32,
) -> Result<user::Model> {
    user::ActiveModel {
        inv_reg_id: Set(inv_reg_id.map(str::to_string)),
        first_name: Set("Test".to_string()),
        last_name: Set("User".to_string()),
        email: Set(email.to_string()),
        mobile: Set(mobile.to_string()),
        password: Set("not-a-real-hash".to_string()),
        gender_id: Set(1),
        age: Set(30),
        dob: Set(NaiveDate::from_ymd_opt(1995, 1, 1).unwrap()),
        role_id: Set(role_id),
        is_verified: Set(true),
        is_active: Set(true),
        created_date: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Flips the verification and active flags of a stored user.
pub async fn set_user_flags(
    db: &DatabaseConnection,
    user_id: i64,
    is_verified: bool,
    is_active: bool,
) -> Result<user::Model> {
    let existing = User::find_by_id(user_id).one(db).await?.unwrap();
    let mut active: user::ActiveModel = existing.into();
    active.is_verified = Set(is_verified);
    active.is_active = Set(is_active);
    active.update(db).await.map_err(Into::into)
}

/// Inserts a plan type with a 365-day tenure.
pub async fn insert_test_plan(
    db: &DatabaseConnection,
    name: &str,
    percentage: &str,
    is_active: bool,
) -> Result<plan_type::Model> {
    plan_type::ActiveModel {
        plan_type: Set(name.to_string()),
        percentage: Set(percentage.to_string()),
        returns_in_days: Set("365".to_string()),
        is_active: Set(is_active),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts an active contract of 10000 at 10% maturing in a year.
pub async fn insert_test_investment(
    db: &DatabaseConnection,
    uk_inv_id: &str,
    plan_type_id: i32,
    created_by: i64,
) -> Result<investment::Model> {
    investment::ActiveModel {
        uk_inv_id: Set(uk_inv_id.to_string()),
        principal_amount: Set(dec!(10000)),
        plan_type_id: Set(plan_type_id),
        interest_amount: Set(dec!(1000)),
        maturity_amount: Set(dec!(11000)),
        maturity_date: Set(Utc::now().date_naive() + Duration::days(365)),
        is_active: Set(true),
        created_by: Set(created_by),
        created_date: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Captures every sent message; can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    /// Messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Makes later sends fail with [`Error::ExternalService`].
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Code from the most recent OTP mail.
    pub fn last_otp(&self) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .find(|m| m.subject.starts_with("OTP"))
            .and_then(|m| {
                m.body
                    .lines()
                    .map(str::trim)
                    .find(|line| line.len() == 6 && line.chars().all(|c| c.is_ascii_digit()))
                    .map(str::to_string)
            })
    }

    /// Token from the most recent reset link.
    pub fn last_reset_token(&self) -> Option<String> {
        self.sent().iter().rev().find_map(|m| {
            m.body
                .split_once("token=")
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .map(str::to_string)
        })
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::ExternalService {
                service: "email".to_string(),
                message: "recording mailer set to fail".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Keeps file names in memory and returns `/uploads/bonds/<name>`.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    stored: Mutex<Vec<String>>,
}

impl MemoryFileStore {
    /// Names stored so far.
    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn store(&self, file: UploadedFile) -> Result<String> {
        let reference = format!("/uploads/bonds/{}", file.file_name);
        self.stored.lock().unwrap().push(file.file_name);
        Ok(reference)
    }
}

/// Records orders and accepts only [`FAKE_GATEWAY_SIGNATURE`].
#[derive(Debug, Default)]
pub struct FakeGateway {
    orders: Mutex<Vec<GatewayOrder>>,
}

impl FakeGateway {
    /// Orders created so far.
    pub fn orders(&self) -> Vec<GatewayOrder> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn key_id(&self) -> &str {
        FAKE_GATEWAY_KEY
    }

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder> {
        let mut orders = self.orders.lock().unwrap();
        let order = GatewayOrder {
            id: format!("order_{}", orders.len() + 1),
            amount: amount_minor,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
        };
        orders.push(order.clone());
        Ok(order)
    }

    fn verify_signature(&self, _order_id: &str, _payment_id: &str, signature: &str) -> bool {
        signature == FAKE_GATEWAY_SIGNATURE
    }
}

/// An [`AppContext`] wired to test doubles, with handles to inspect them.
pub struct TestHarness {
    pub ctx: AppContext,
    pub mailer: Arc<RecordingMailer>,
    pub files: Arc<MemoryFileStore>,
    pub payments: Arc<FakeGateway>,
}

impl TestHarness {
    /// Harness over a fresh in-memory database.
    pub async fn new() -> Result<Self> {
        Self::with_db(setup_test_db().await?)
    }

    /// Harness over an empty mock connection; any query fails.
    pub fn with_mock_db() -> Result<Self> {
        Self::with_db(MockDatabase::new(DatabaseBackend::Sqlite).into_connection())
    }

    fn with_db(db: DatabaseConnection) -> Result<Self> {
        let mailer = Arc::new(RecordingMailer::default());
        let files = Arc::new(MemoryFileStore::default());
        let payments = Arc::new(FakeGateway::default());
        let collaborators = Collaborators {
            cache: Arc::new(InMemoryTtlStore::new()),
            mailer: Arc::clone(&mailer) as Arc<dyn EmailSender>,
            files: Arc::clone(&files) as Arc<dyn FileStore>,
            payments: Arc::clone(&payments) as Arc<dyn PaymentGateway>,
        };
        let ctx = AppContext::new(db, &test_settings(), collaborators)?;
        Ok(Self {
            ctx,
            mailer,
            files,
            payments,
        })
    }

    /// Runs the full register + verify flow and returns the stored investor.
    pub async fn register_investor(&self, email: &str, mobile: &str) -> Result<user::Model> {
        auth::register(&self.ctx, investor_form(email, mobile)).await?;
        let code = self.mailer.last_otp().unwrap();
        let verified = auth::verify_otp(&self.ctx, email, &code).await?;
        let stored = User::find_by_id(verified.user_id).one(&self.ctx.db).await?;
        Ok(stored.unwrap())
    }
}
