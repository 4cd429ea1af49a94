//! Unified error type for the investment backend.
//!
//! Every failure carries a stable machine-readable [`ErrorKind`] plus a
//! human-readable message. Credential failures are deliberately generic so that
//! callers cannot tell "no such user" apart from "wrong password".

use thiserror::Error;

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input. No state was changed.
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// A unique value (email, mobile, generated identifier) is already taken.
    #[error("Conflict: {field} '{value}' already exists")]
    Conflict {
        /// Name of the conflicting column
        field: String,
        /// The value that collided
        value: String,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind, e.g. "Investment"
        entity: String,
        /// Lookup key that matched nothing
        key: String,
    },

    /// Bad credentials. The message never says which part was wrong.
    #[error("Invalid credentials")]
    Auth,

    /// Authenticated, but the role may not perform the operation.
    #[error("Insufficient permissions")]
    Forbidden,

    /// Investor tried to log in before proving control of their email.
    #[error("Account verification required before login")]
    VerificationRequired,

    /// OTP missing, mismatched, expired or already used.
    #[error("Invalid or expired OTP")]
    InvalidOtp,

    /// The pending registration payload is gone by the time the OTP was verified.
    #[error("Registration data expired. Please register again.")]
    ExpiredRegistration,

    /// Signed token failed to decode, expired, or has the wrong type.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Plan type missing or inactive when creating a contract.
    #[error("Invalid plan type: {plan_type_id}")]
    InvalidPlan {
        /// Requested plan type id
        plan_type_id: i32,
    },

    /// Reference data in the store is corrupt (e.g. unparseable percentage).
    #[error("Data integrity error: {message}")]
    DataIntegrity {
        /// Description of the corrupt value
        message: String,
    },

    /// Email, storage or payment collaborator failed.
    #[error("External service error ({service}): {message}")]
    ExternalService {
        /// Which collaborator failed
        service: String,
        /// Failure detail
        message: String,
    },

    /// Gateway signature check failed. Gateway internals are never surfaced.
    #[error("Payment verification failed")]
    PaymentVerificationFailed,

    /// Missing or invalid configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Which setting is wrong
        message: String,
    },

    /// Runtime fault inside the crate, e.g. hashing or token signing.
    #[error("Internal error: {message}")]
    Internal {
        /// What failed
        message: String,
    },

    /// Template registration or rendering failed.
    #[error("Template error: {message}")]
    Template {
        /// Renderer message
        message: String,
    },

    /// Uncaught persistence error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable, machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::Validation`]
    Validation,
    /// See [`Error::Conflict`]
    Conflict,
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::Auth`]
    Auth,
    /// See [`Error::Forbidden`]
    Forbidden,
    /// See [`Error::VerificationRequired`]
    VerificationRequired,
    /// See [`Error::InvalidOtp`]
    InvalidOtp,
    /// See [`Error::ExpiredRegistration`]
    ExpiredRegistration,
    /// See [`Error::InvalidToken`]
    InvalidToken,
    /// See [`Error::InvalidPlan`]
    InvalidPlan,
    /// See [`Error::DataIntegrity`]
    DataIntegrity,
    /// See [`Error::ExternalService`]
    ExternalService,
    /// See [`Error::PaymentVerificationFailed`]
    PaymentVerificationFailed,
    /// Configuration, internal, template, database and I/O failures
    Internal,
}

impl ErrorKind {
    /// Snake-case code suitable for API payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Conflict => "conflict_error",
            Self::NotFound => "not_found_error",
            Self::Auth => "auth_error",
            Self::Forbidden => "forbidden_error",
            Self::VerificationRequired => "verification_required_error",
            Self::InvalidOtp => "invalid_otp_error",
            Self::ExpiredRegistration => "expired_registration_error",
            Self::InvalidToken => "invalid_token_error",
            Self::InvalidPlan => "invalid_plan_error",
            Self::DataIntegrity => "data_integrity_error",
            Self::ExternalService => "external_service_error",
            Self::PaymentVerificationFailed => "payment_verification_error",
            Self::Internal => "internal_error",
        }
    }
}

impl Error {
    /// Classifies this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Auth => ErrorKind::Auth,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::VerificationRequired => ErrorKind::VerificationRequired,
            Self::InvalidOtp => ErrorKind::InvalidOtp,
            Self::ExpiredRegistration => ErrorKind::ExpiredRegistration,
            Self::InvalidToken => ErrorKind::InvalidToken,
            Self::InvalidPlan { .. } => ErrorKind::InvalidPlan,
            Self::DataIntegrity { .. } => ErrorKind::DataIntegrity,
            Self::ExternalService { .. } => ErrorKind::ExternalService,
            Self::PaymentVerificationFailed => ErrorKind::PaymentVerificationFailed,
            Self::Config { .. }
            | Self::Internal { .. }
            | Self::Template { .. }
            | Self::Database(_)
            | Self::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Server faults are logged in detail and surfaced generically.
    #[must_use]
    pub const fn is_server_fault(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DataIntegrity | ErrorKind::ExternalService | ErrorKind::Internal
        )
    }

    /// Message safe to show an end user.
    #[must_use]
    pub fn public_message(&self) -> String {
        if matches!(self.kind(), ErrorKind::Internal | ErrorKind::DataIntegrity) {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity: &str, key: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub(crate) fn external(service: &str, message: impl ToString) -> Self {
        Self::ExternalService {
            service: service.to_string(),
            message: message.to_string(),
        }
    }

    /// Maps a unique-constraint violation on insert/update to [`Error::Conflict`].
    ///
    /// `candidates` lists the unique `(column, value)` pairs of the write. The
    /// column named in the driver message wins; otherwise the first candidate
    /// is reported.
    pub(crate) fn from_write(err: sea_orm::DbErr, candidates: &[(&str, &str)]) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(message)) => {
                let (field, value) = candidates
                    .iter()
                    .find(|(field, _)| message.contains(field))
                    .or_else(|| candidates.first())
                    .copied()
                    .unwrap_or(("unknown", ""));
                Self::Conflict {
                    field: field.to_string(),
                    value: value.to_string(),
                }
            }
            _ => Self::Database(err),
        }
    }
}

impl From<handlebars::RenderError> for Error {
    fn from(value: handlebars::RenderError) -> Self {
        Self::Template {
            message: value.to_string(),
        }
    }
}

impl From<handlebars::TemplateError> for Error {
    fn from(value: handlebars::TemplateError) -> Self {
        Self::Template {
            message: value.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
