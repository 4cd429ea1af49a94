//! Sequential human-readable identifiers.
//!
//! Investors get `I0001`, `I0002`, ... and contracts get `INV0001`, `INV0002`, ...
//! The next value is derived from the most recently inserted identifier in the
//! namespace. This is a read-then-write sequence: two concurrent creations can
//! compute the same value. The unique constraints on `inv_reg_id` and
//! `uk_inv_id` make the loser fail with [`crate::errors::Error::Conflict`], and
//! the caller retries with a freshly computed identifier.

use crate::{
    entities::{Investment, User, investment, user},
    errors::Result,
};
use sea_orm::{QueryOrder, prelude::*};
use tracing::debug;

/// Zero-padded width of the numeric suffix.
pub const ID_WIDTH: usize = 4;

/// Identifier namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdNamespace {
    /// Investor registration ids on `user_registration.inv_reg_id`
    InvestorRegistration,
    /// Contract ids on `inv_config.uk_inv_id`
    InvestmentContract,
}

impl IdNamespace {
    /// Fixed prefix of every identifier in the namespace.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::InvestorRegistration => "I",
            Self::InvestmentContract => "INV",
        }
    }
}

/// Computes the identifier following `last` in the namespace with `prefix`.
///
/// Restarts at 1 when there is no previous identifier, when it lacks the
/// prefix, or when its digits cannot be parsed. Non-digit characters in the
/// suffix are ignored.
#[must_use]
pub fn next_in_sequence(prefix: &str, last: Option<&str>) -> String {
    let next = last
        .and_then(|last| last.strip_prefix(prefix))
        .and_then(|suffix| {
            let digits: String = suffix.chars().filter(char::is_ascii_digit).collect();
            digits.parse::<u64>().ok()
        })
        .and_then(|value| value.checked_add(1))
        .unwrap_or(1);

    format!("{prefix}{next:0width$}", width = ID_WIDTH)
}

/// Most recently inserted identifier in the namespace, by primary key.
pub async fn latest_id<C>(db: &C, namespace: IdNamespace) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let latest = match namespace {
        IdNamespace::InvestorRegistration => User::find()
            .filter(user::Column::InvRegId.is_not_null())
            .order_by_desc(user::Column::Id)
            .one(db)
            .await?
            .and_then(|u| u.inv_reg_id),
        IdNamespace::InvestmentContract => Investment::find()
            .order_by_desc(investment::Column::Id)
            .one(db)
            .await?
            .map(|inv| inv.uk_inv_id),
    };
    Ok(latest)
}

/// Returns the next identifier for the namespace. Performs no writes.
pub async fn next_id<C>(db: &C, namespace: IdNamespace) -> Result<String>
where
    C: ConnectionTrait,
{
    let last = latest_id(db, namespace).await?;
    let next = next_in_sequence(namespace.prefix(), last.as_deref());
    debug!(?namespace, ?last, %next, "Allocated identifier");
    Ok(next)
}
