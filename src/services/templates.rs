//! Plain-text email bodies rendered with handlebars.

use crate::errors::Result;
use crate::services::email::EmailMessage;
use handlebars::{Handlebars, no_escape};
use serde_json::json;

const OTP: &str = "otp";
const REGISTERED: &str = "registered";
const RESET: &str = "password_reset";
const INVESTMENT_CREATED: &str = "investment_created";

const OTP_BODY: &str = "Your OTP for email verification is:

{{otp}}

This OTP is valid for {{minutes}} minutes.

Regards,
INRFS Team
";

const REGISTERED_BODY: &str = "Dear {{first_name}},

Your registration is complete.

Customer-ID: {{inv_reg_id}}

You can now login.

Regards,
INRFS Team
";

const RESET_BODY: &str = "Dear {{first_name}},

Click the link below to reset your password:

{{link}}

This link is valid for {{minutes}} minutes.

If you did not request this, please ignore this email.

Regards,
INRFS Team
";

const INVESTMENT_CREATED_BODY: &str = "Hi {{name}},

Your investment has been successfully created.

Investment ID   : {{uk_inv_id}}
Investment Date : {{date}}
Investment Time : {{time}}
Tenure          : {{tenure_days}} days

Thank you for investing with us.

Regards,
Investment Team
";

/// Details printed in the investment confirmation mail.
#[derive(Debug, Clone)]
pub struct InvestmentCreatedMail<'a> {
    pub to: &'a str,
    pub name: &'a str,
    pub uk_inv_id: &'a str,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`
    pub time: String,
    pub tenure_days: i64,
}

/// Registry of the outbound email templates.
pub struct EmailTemplates {
    registry: Handlebars<'static>,
}

impl EmailTemplates {
    /// Registers every template. Fails only if a template does not compile.
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        // Bodies are plain text.
        registry.register_escape_fn(no_escape);
        registry.register_template_string(OTP, OTP_BODY)?;
        registry.register_template_string(REGISTERED, REGISTERED_BODY)?;
        registry.register_template_string(RESET, RESET_BODY)?;
        registry.register_template_string(INVESTMENT_CREATED, INVESTMENT_CREATED_BODY)?;
        Ok(Self { registry })
    }

    /// Verification code mail.
    pub fn otp(&self, to: &str, otp: &str, minutes: i64) -> Result<EmailMessage> {
        let body = self
            .registry
            .render(OTP, &json!({ "otp": otp, "minutes": minutes }))?;
        Ok(plain(to, "OTP Verification - INRFS", body))
    }

    /// Sent once an investor is persisted.
    pub fn registered(&self, to: &str, first_name: &str, inv_reg_id: &str) -> Result<EmailMessage> {
        let body = self.registry.render(
            REGISTERED,
            &json!({ "first_name": first_name, "inv_reg_id": inv_reg_id }),
        )?;
        Ok(plain(to, "Registration Successful - INRFS", body))
    }

    /// Reset link mail.
    pub fn password_reset(
        &self,
        to: &str,
        first_name: &str,
        link: &str,
        minutes: i64,
    ) -> Result<EmailMessage> {
        let body = self.registry.render(
            RESET,
            &json!({ "first_name": first_name, "link": link, "minutes": minutes }),
        )?;
        Ok(plain(to, "Reset Your Password - INRFS", body))
    }

    /// Contract confirmation mail.
    pub fn investment_created(&self, mail: &InvestmentCreatedMail<'_>) -> Result<EmailMessage> {
        let body = self.registry.render(
            INVESTMENT_CREATED,
            &json!({
                "name": mail.name,
                "uk_inv_id": mail.uk_inv_id,
                "date": mail.date,
                "time": mail.time,
                "tenure_days": mail.tenure_days,
            }),
        )?;
        Ok(plain(
            mail.to,
            "Your Investment Has Been Successfully Created",
            body,
        ))
    }
}

fn plain(to: &str, subject: &str, body: String) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        body,
        is_html: false,
    }
}
