//! Registration, OTP verification, login and password reset.
//!
//! Investors are not persisted until they prove control of their email: the
//! registration form is parked in the OTP registry and only written once the
//! emailed code comes back. Staff accounts are written immediately.
//!
//! ```text
//! investor:  register -> PENDING_OTP -> verify_otp -> VERIFIED_ACTIVE
//! staff:     register -> VERIFIED_ACTIVE
//! ```
//!
//! Deactivation (`is_active = false`) is an administrative action outside this
//! module; it blocks login and token use.

use crate::{
    context::AppContext,
    core::{
        credentials::{Subject, TokenPair, TokenType},
        identifier::{IdNamespace, next_id},
    },
    entities::{User, user},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Condition, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Account roles. Ids match the `role_id` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Investor,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Persisted role id.
    #[must_use]
    pub const fn id(self) -> i32 {
        match self {
            Self::Investor => 1,
            Self::Admin => 2,
            Self::SuperAdmin => 3,
        }
    }

    /// Admins and super admins.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl TryFrom<i32> for Role {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Self::Investor),
            2 => Ok(Self::Admin),
            3 => Ok(Self::SuperAdmin),
            other => Err(Error::validation(format!("Unknown role id: {other}"))),
        }
    }
}

/// Registration input. The password is plaintext until hashed at persist time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub role_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    pub gender_id: i32,
    pub age: i32,
    pub dob: NaiveDate,
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("role_id", &self.role_id)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("mobile", &self.mobile)
            .field("password", &"<redacted>")
            .field("gender_id", &self.gender_id)
            .field("age", &self.age)
            .field("dob", &self.dob)
            .finish()
    }
}

impl RegistrationForm {
    /// Trims text fields, lowercases the email and rejects blank or
    /// out-of-range values.
    fn normalized(mut self) -> Result<Self> {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.email = normalize_email(&self.email);
        self.mobile = self.mobile.trim().to_string();

        if self.first_name.is_empty() || self.last_name.is_empty() {
            return Err(Error::validation("First and last name are required"));
        }
        if !is_plausible_email(&self.email) {
            return Err(Error::validation("A valid email address is required"));
        }
        if self.mobile.is_empty() || !self.mobile.chars().all(|c| c.is_ascii_digit() || c == '+') {
            return Err(Error::validation("A valid mobile number is required"));
        }
        if self.password.is_empty() {
            return Err(Error::validation("Password cannot be empty"));
        }
        if self.age < 0 {
            return Err(Error::validation("Age cannot be negative"));
        }
        Ok(self)
    }
}

/// Result of [`register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Investor: OTP emailed, nothing persisted yet
    VerificationPending { email: String },
    /// Staff: persisted and active
    Registered { user_id: i64, role: Role },
}

/// Result of a successful [`verify_otp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRegistration {
    pub user_id: i64,
    pub inv_reg_id: String,
}

/// Login input. Exactly one of `email` and `inv_reg_id` must be given.
#[derive(Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub inv_reg_id: Option<String>,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("inv_reg_id", &self.inv_reg_id)
            .finish_non_exhaustive()
    }
}

enum LoginIdentifier {
    Email(String),
    InvestorId(String),
}

impl LoginRequest {
    fn identifier(&self) -> Result<LoginIdentifier> {
        let present = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        match (present(&self.email), present(&self.inv_reg_id)) {
            (Some(email), None) => Ok(LoginIdentifier::Email(normalize_email(&email))),
            (None, Some(id)) => Ok(LoginIdentifier::InvestorId(id)),
            _ => Err(Error::validation("supply exactly one identifier")),
        }
    }
}

/// The caller behind a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
    pub inv_reg_id: Option<String>,
}

impl Principal {
    /// Fails with [`Error::Forbidden`] unless the principal is staff.
    pub fn require_staff(&self) -> Result<()> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}

/// Lowercased, trimmed email.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
}

async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Fails with [`Error::Conflict`] if the email or mobile is already persisted.
async fn ensure_unused<C: ConnectionTrait>(db: &C, email: &str, mobile: &str) -> Result<()> {
    let existing = User::find()
        .filter(
            Condition::any()
                .add(user::Column::Email.eq(email))
                .add(user::Column::Mobile.eq(mobile)),
        )
        .one(db)
        .await?;
    match existing {
        Some(u) if u.email == email => Err(Error::Conflict {
            field: "email".to_string(),
            value: email.to_string(),
        }),
        Some(_) => Err(Error::Conflict {
            field: "mobile".to_string(),
            value: mobile.to_string(),
        }),
        None => Ok(()),
    }
}

/// Registers a user, dispatching on role.
#[instrument(skip(ctx))]
pub async fn register(ctx: &AppContext, form: RegistrationForm) -> Result<RegistrationOutcome> {
    let role = Role::try_from(form.role_id)?;
    let form = form.normalized()?;
    ensure_unused(&ctx.db, &form.email, &form.mobile).await?;

    match role {
        Role::Investor => register_investor(ctx, form).await,
        Role::Admin | Role::SuperAdmin => register_staff(ctx, form, role).await,
    }
}

/// Parks the form and emails an OTP. Nothing is persisted.
///
/// If the OTP cannot be delivered the code and the parked form are dropped so
/// the caller can simply register again.
async fn register_investor(ctx: &AppContext, form: RegistrationForm) -> Result<RegistrationOutcome> {
    let email = form.email.clone();
    ctx.otp.hold_registration(&email, &form).await?;

    let delivery = async {
        let code = ctx.otp.issue(&email).await?;
        let message = ctx
            .templates
            .otp(&email, &code, ctx.otp.otp_ttl().num_minutes())?;
        ctx.mailer.send(message).await
    }
    .await;

    if let Err(e) = delivery {
        warn!(%email, "OTP delivery failed: {}", e);
        ctx.otp.discard(&email).await?;
        ctx.otp.discard_registration(&email).await?;
        return Err(e);
    }

    info!(%email, "Investor registration pending OTP verification");
    Ok(RegistrationOutcome::VerificationPending { email })
}

/// Emails a fresh OTP for a registration that is still parked.
///
/// The new code replaces any live one. Without a parked form there is nothing
/// to verify against, so the call fails with [`Error::ExpiredRegistration`].
#[instrument(skip(ctx))]
pub async fn resend_otp(ctx: &AppContext, email: &str) -> Result<()> {
    let email = normalize_email(email);
    if !ctx.otp.has_registration(&email).await? {
        debug!(%email, "No parked registration to resend for");
        return Err(Error::ExpiredRegistration);
    }

    let code = ctx.otp.issue(&email).await?;
    let message = ctx
        .templates
        .otp(&email, &code, ctx.otp.otp_ttl().num_minutes())?;
    if let Err(e) = ctx.mailer.send(message).await {
        warn!(%email, "OTP resend failed: {}", e);
        ctx.otp.discard(&email).await?;
        return Err(e);
    }

    info!(%email, "OTP resent");
    Ok(())
}

/// Persists an admin or super admin immediately.
async fn register_staff(
    ctx: &AppContext,
    form: RegistrationForm,
    role: Role,
) -> Result<RegistrationOutcome> {
    if !role.is_staff() {
        return Err(Error::validation("Investors must register through OTP verification"));
    }
    let password = ctx.hasher.hash(&form.password).await?;

    let created = user::ActiveModel {
        inv_reg_id: Set(None),
        first_name: Set(form.first_name),
        last_name: Set(form.last_name),
        email: Set(form.email.clone()),
        mobile: Set(form.mobile.clone()),
        password: Set(password),
        gender_id: Set(form.gender_id),
        age: Set(form.age),
        dob: Set(form.dob),
        role_id: Set(role.id()),
        is_verified: Set(true),
        is_active: Set(true),
        created_date: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&ctx.db)
    .await
    .map_err(|e| {
        Error::from_write(
            e,
            &[("email", form.email.as_str()), ("mobile", form.mobile.as_str())],
        )
    })?;

    info!(user_id = created.id, ?role, "Registered staff account");
    Ok(RegistrationOutcome::Registered {
        user_id: created.id,
        role,
    })
}

/// Checks the OTP and persists the parked investor registration.
///
/// The OTP is consumed whatever the outcome. A [`Error::Conflict`] on
/// `inv_reg_id` means a concurrent registration took the identifier; the
/// parked form is gone by then, so the investor has to register again.
#[instrument(skip(ctx, code))]
pub async fn verify_otp(ctx: &AppContext, email: &str, code: &str) -> Result<VerifiedRegistration> {
    let email = normalize_email(email);
    ctx.otp.verify(&email, code).await?;

    let form: RegistrationForm = ctx
        .otp
        .take_registration(&email)
        .await?
        .ok_or(Error::ExpiredRegistration)?;
    ensure_unused(&ctx.db, &form.email, &form.mobile).await?;

    let password = ctx.hasher.hash(&form.password).await?;
    let inv_reg_id = next_id(&ctx.db, IdNamespace::InvestorRegistration).await?;

    let created = user::ActiveModel {
        inv_reg_id: Set(Some(inv_reg_id.clone())),
        first_name: Set(form.first_name.clone()),
        last_name: Set(form.last_name),
        email: Set(form.email.clone()),
        mobile: Set(form.mobile.clone()),
        password: Set(password),
        gender_id: Set(form.gender_id),
        age: Set(form.age),
        dob: Set(form.dob),
        role_id: Set(Role::Investor.id()),
        is_verified: Set(true),
        is_active: Set(true),
        created_date: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&ctx.db)
    .await
    .map_err(|e| {
        Error::from_write(
            e,
            &[
                ("inv_reg_id", inv_reg_id.as_str()),
                ("email", form.email.as_str()),
                ("mobile", form.mobile.as_str()),
            ],
        )
    })?;

    info!(user_id = created.id, %inv_reg_id, "Investor registered");

    let confirmation = ctx
        .templates
        .registered(&created.email, &created.first_name, &inv_reg_id);
    match confirmation {
        Ok(message) => {
            if let Err(e) = ctx.mailer.send(message).await {
                warn!(user_id = created.id, "Registration confirmation not sent: {}", e);
            }
        }
        Err(e) => warn!("Registration confirmation not rendered: {}", e),
    }

    Ok(VerifiedRegistration {
        user_id: created.id,
        inv_reg_id,
    })
}

/// Checks credentials and issues an access/refresh token pair.
///
/// Unknown users, deactivated accounts and wrong passwords all fail with the
/// same [`Error::Auth`]. Unverified investors get
/// [`Error::VerificationRequired`] before the password is looked at.
#[instrument(skip(ctx))]
pub async fn login(ctx: &AppContext, request: LoginRequest) -> Result<TokenPair> {
    let lookup = match request.identifier()? {
        LoginIdentifier::Email(email) => find_by_email(&ctx.db, &email).await?,
        LoginIdentifier::InvestorId(id) => {
            User::find()
                .filter(user::Column::InvRegId.eq(id))
                .one(&ctx.db)
                .await?
        }
    };

    let Some(user) = lookup else {
        debug!("Login for unknown identifier");
        return Err(Error::Auth);
    };
    if !user.is_active {
        debug!(user_id = user.id, "Login for deactivated account");
        return Err(Error::Auth);
    }
    if user.role_id == Role::Investor.id() && !user.is_verified {
        return Err(Error::VerificationRequired);
    }
    if !ctx.hasher.verify(&request.password, &user.password).await {
        debug!(user_id = user.id, "Password mismatch");
        return Err(Error::Auth);
    }

    info!(user_id = user.id, role_id = user.role_id, "Login succeeded");
    ctx.tokens.issue_pair(&user)
}

/// Exchanges a refresh token for a new access token.
pub fn refresh(ctx: &AppContext, refresh_token: &str) -> Result<String> {
    let claims = ctx
        .tokens
        .decode(refresh_token, TokenType::Refresh)
        .map_err(|_| Error::Auth)?;
    ctx.tokens.reissue_access(&claims)
}

/// Emails a reset link when the account exists and is active.
///
/// Returns `Ok(())` for unknown emails too, so callers cannot probe for
/// accounts. A failed send of a real reset link does propagate.
#[instrument(skip(ctx))]
pub async fn forgot_password(ctx: &AppContext, email: &str) -> Result<()> {
    let email = normalize_email(email);
    let Some(user) = find_by_email(&ctx.db, &email).await? else {
        debug!("Reset requested for unknown email");
        return Ok(());
    };
    if !user.is_active {
        debug!(user_id = user.id, "Reset requested for deactivated account");
        return Ok(());
    }

    let token = ctx.tokens.issue_reset(&user.email)?;
    let link = format!("{}/reset-password?token={token}", ctx.frontend_base_url);
    let message = ctx.templates.password_reset(
        &user.email,
        &user.first_name,
        &link,
        ctx.tokens.reset_ttl().num_minutes(),
    )?;
    ctx.mailer.send(message).await?;

    info!(user_id = user.id, "Password reset link sent");
    Ok(())
}

/// Sets a new password using a reset token.
///
/// Investors resetting their password are marked verified: receiving the link
/// proves control of the email.
#[instrument(skip(ctx, token, new_password))]
pub async fn reset_password(ctx: &AppContext, token: &str, new_password: &str) -> Result<()> {
    if new_password.is_empty() {
        return Err(Error::validation("Password cannot be empty"));
    }
    let claims = ctx.tokens.decode(token, TokenType::PasswordReset)?;
    let user = find_by_email(&ctx.db, &claims.sub)
        .await?
        .ok_or_else(|| Error::not_found("User", &claims.sub))?;

    let is_investor = user.role_id == Role::Investor.id();
    let user_id = user.id;
    let mut active: user::ActiveModel = user.into();
    active.password = Set(ctx.hasher.hash(new_password).await?);
    active.modified_by = Set(Some(user_id));
    active.modified_date = Set(Some(Utc::now()));
    if is_investor {
        active.is_verified = Set(true);
    }
    active.update(&ctx.db).await?;

    info!(user_id, "Password reset");
    Ok(())
}

/// Resolves the active user behind an access token.
///
/// Bare integer subjects are staff ids; anything else is an investor
/// registration id.
pub async fn authenticate(ctx: &AppContext, access_token: &str) -> Result<Principal> {
    let claims = ctx.tokens.decode(access_token, TokenType::Access)?;
    let user = match Subject::parse(&claims.sub) {
        Subject::UserId(id) => User::find_by_id(id).one(&ctx.db).await?,
        Subject::InvestorId(inv_reg_id) => {
            User::find()
                .filter(user::Column::InvRegId.eq(inv_reg_id))
                .one(&ctx.db)
                .await?
        }
    };

    let user = user.filter(|u| u.is_active).ok_or(Error::Auth)?;
    let role = Role::try_from(user.role_id).map_err(|_| Error::DataIntegrity {
        message: format!("User {} has unknown role id {}", user.id, user.role_id),
    })?;

    Ok(Principal {
        user_id: user.id,
        role,
        inv_reg_id: user.inv_reg_id,
    })
}
