//! Shared application state handed to every core operation.

use crate::cache::{InMemoryTtlStore, TtlStore};
use crate::config::Settings;
use crate::core::credentials::{PasswordHasher, TokenService};
use crate::core::otp::OtpRegistry;
use crate::errors::Result;
use crate::services::storage::file_store_from_settings;
use crate::services::{
    DisabledGateway, DisabledMailer, EmailSender, EmailTemplates, FileStore, PaymentGateway,
    RazorpayClient, SmtpMailer,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::warn;

/// Pluggable collaborators. Tests swap these for in-memory doubles.
pub struct Collaborators {
    pub cache: Arc<dyn TtlStore>,
    pub mailer: Arc<dyn EmailSender>,
    pub files: Arc<dyn FileStore>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl Collaborators {
    /// Production collaborators for the given settings.
    ///
    /// Missing SMTP or gateway credentials downgrade to disabled stand-ins
    /// that fail each call.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mailer: Arc<dyn EmailSender> = match &settings.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                warn!("SMTP is not configured; outbound email is disabled");
                Arc::new(DisabledMailer)
            }
        };
        let payments: Arc<dyn PaymentGateway> = match &settings.razorpay {
            Some(razorpay) => Arc::new(RazorpayClient::new(razorpay)),
            None => {
                warn!("Payment gateway is not configured");
                Arc::new(DisabledGateway)
            }
        };
        Ok(Self {
            cache: Arc::new(InMemoryTtlStore::new()),
            mailer,
            files: file_store_from_settings(&settings.storage),
            payments,
        })
    }
}

/// Connection plus every service the core needs.
pub struct AppContext {
    pub db: DatabaseConnection,
    pub hasher: PasswordHasher,
    pub tokens: TokenService,
    pub otp: OtpRegistry,
    pub mailer: Arc<dyn EmailSender>,
    pub templates: Arc<EmailTemplates>,
    pub files: Arc<dyn FileStore>,
    pub payments: Arc<dyn PaymentGateway>,
    /// Base URL of the web frontend, used for reset links
    pub frontend_base_url: String,
}

impl AppContext {
    /// Assembles a context from settings and explicit collaborators.
    pub fn new(db: DatabaseConnection, settings: &Settings, collaborators: Collaborators) -> Result<Self> {
        let security = &settings.security;
        Ok(Self {
            db,
            hasher: PasswordHasher::new(security.bcrypt_cost),
            tokens: TokenService::new(
                &security.jwt_secret,
                security.access_token_ttl,
                security.refresh_token_ttl,
                security.reset_token_ttl,
            ),
            otp: OtpRegistry::new(
                collaborators.cache,
                security.otp_ttl,
                security.pending_registration_ttl,
            ),
            mailer: collaborators.mailer,
            templates: Arc::new(EmailTemplates::new()?),
            files: collaborators.files,
            payments: collaborators.payments,
            frontend_base_url: settings.frontend_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Context with the production collaborators.
    pub fn from_settings(db: DatabaseConnection, settings: &Settings) -> Result<Self> {
        let collaborators = Collaborators::from_settings(settings)?;
        Self::new(db, settings, collaborators)
    }
}
