//! Application settings loaded from environment variables.
//!
//! Values are read after `.env` has been loaded with `dotenvy`. Only
//! `JWT_SECRET` is mandatory; the SMTP and payment gateway sections are
//! optional so that a bootstrap run does not need outbound credentials.

use crate::config::database::get_database_url;
use crate::errors::{Error, Result};
use chrono::Duration;
use std::str::FromStr;

/// SMTP relay used for outbound email.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    /// Relay host, e.g. `smtp.gmail.com`
    pub host: String,
    /// Submission port (STARTTLS)
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address
    pub from: String,
}

/// Where uploaded evidence files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageSettings {
    /// Local directory, returned references look like `/uploads/bonds/<file>`
    Local {
        /// Directory files are written to
        upload_dir: String,
        /// URL path prefix returned to callers
        public_prefix: String,
    },
    /// HTTP object storage reached with authenticated `PUT` requests
    Object {
        /// Base URL objects are uploaded to
        endpoint: String,
        /// Base URL objects are served from
        public_base_url: String,
        /// Bearer token for uploads
        token: String,
    },
}

/// Razorpay credentials.
#[derive(Debug, Clone)]
pub struct RazorpaySettings {
    pub key_id: String,
    pub key_secret: String,
    /// API root, overridable for sandboxes
    pub base_url: String,
}

/// Token lifetimes and other security knobs.
#[derive(Debug, Clone)]
pub struct SecuritySettings {
    /// HS256 shared secret
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub reset_token_ttl: Duration,
    pub otp_ttl: Duration,
    pub pending_registration_ttl: Duration,
    pub bcrypt_cost: u32,
}

/// Complete application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub security: SecuritySettings,
    /// Base URL of the web frontend, used for reset links
    pub frontend_base_url: String,
    pub smtp: Option<SmtpSettings>,
    pub storage: StorageSettings,
    pub razorpay: Option<RazorpaySettings>,
}

impl Settings {
    /// Reads all settings from the process environment.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = required("JWT_SECRET")?;

        let security = SecuritySettings {
            jwt_secret,
            access_token_ttl: Duration::minutes(parse_or("ACCESS_TOKEN_TTL_MINUTES", 15)?),
            refresh_token_ttl: Duration::days(parse_or("REFRESH_TOKEN_TTL_DAYS", 7)?),
            reset_token_ttl: Duration::minutes(parse_or("RESET_TOKEN_TTL_MINUTES", 15)?),
            otp_ttl: Duration::seconds(parse_or("OTP_TTL_SECONDS", 300)?),
            pending_registration_ttl: Duration::seconds(parse_or(
                "PENDING_REGISTRATION_TTL_SECONDS",
                1800,
            )?),
            bcrypt_cost: parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
        };

        let smtp = match optional("SMTP_USERNAME") {
            Some(username) => Some(SmtpSettings {
                host: optional("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                port: parse_or("SMTP_PORT", 587)?,
                username,
                password: required("SMTP_PASSWORD")?,
                from: required("EMAIL_FROM")?,
            }),
            None => None,
        };

        let storage = if optional("APP_ENV").as_deref() == Some("production") {
            StorageSettings::Object {
                endpoint: required("OBJECT_STORE_URL")?,
                public_base_url: required("OBJECT_STORE_PUBLIC_URL")?,
                token: required("OBJECT_STORE_TOKEN")?,
            }
        } else {
            StorageSettings::Local {
                upload_dir: optional("UPLOAD_DIR").unwrap_or_else(|| "uploads/bonds".to_string()),
                public_prefix: "/uploads/bonds".to_string(),
            }
        };

        let razorpay = match optional("RAZORPAY_KEY_ID") {
            Some(key_id) => Some(RazorpaySettings {
                key_id,
                key_secret: required("RAZORPAY_KEY_SECRET")?,
                base_url: optional("RAZORPAY_BASE_URL")
                    .unwrap_or_else(|| "https://api.razorpay.com/v1".to_string()),
            }),
            None => None,
        };

        Ok(Self {
            database_url: get_database_url(),
            security,
            frontend_base_url: optional("FRONTEND_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            smtp,
            storage,
            razorpay,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| Error::Config {
        message: format!("{key} must be set"),
    })
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match optional(key) {
        Some(raw) => raw.trim().parse().map_err(|_| Error::Config {
            message: format!("{key} has an invalid value: {raw}"),
        }),
        None => Ok(default),
    }
}
