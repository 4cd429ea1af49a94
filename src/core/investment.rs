//! Investment contract business logic.
//!
//! Creation computes interest and maturity amount once from the plan's
//! percentage. Later updates never recompute them, even when the principal or
//! plan changes. Deletion only clears `is_active`.

use crate::{
    context::AppContext,
    core::{
        auth::Principal,
        identifier::{IdNamespace, next_id},
    },
    entities::{Investment, PlanType, User, investment},
    errors::{Error, Result},
    services::{storage::UploadedFile, templates::InvestmentCreatedMail},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::RoundingStrategy;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, instrument, warn};

/// Scale of every persisted amount.
pub const AMOUNT_SCALE: u32 = 2;

/// Stored amounts must fit `NUMERIC(10, 2)`.
const MAX_AMOUNT_EXCLUSIVE: i64 = 100_000_000;

/// Derived lifecycle status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Completed,
    Inactive,
}

impl ContractStatus {
    /// Lowercase status label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for [`create_investment`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewInvestment {
    pub principal_amount: Decimal,
    pub plan_type_id: i32,
    pub maturity_date: NaiveDate,
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InvestmentUpdate {
    pub principal_amount: Option<Decimal>,
    pub plan_type_id: Option<i32>,
    pub maturity_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

/// What [`create_investment`] reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSummary {
    /// Creator's user id
    pub customer_id: i64,
    pub investment_id: i64,
    pub uk_inv_id: String,
    pub status: ContractStatus,
    pub interest_amount: Decimal,
    pub maturity_amount: Decimal,
}

/// A stored contract with its status derived at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractView {
    #[serde(flatten)]
    pub contract: investment::Model,
    pub status: ContractStatus,
}

impl From<investment::Model> for ContractView {
    fn from(contract: investment::Model) -> Self {
        let status = status(&contract);
        Self { contract, status }
    }
}

/// Parses a plan percentage such as `"10%"`, `" 7.5 "` or `"12"`.
///
/// Failure means the reference data is corrupt, so it is reported as
/// [`Error::DataIntegrity`] rather than a caller error.
pub fn parse_percentage(raw: &str) -> Result<Decimal> {
    let clean = raw.replace('%', "");
    clean.trim().parse::<Decimal>().map_err(|e| Error::DataIntegrity {
        message: format!("Invalid percentage value in plan data '{raw}': {e}"),
    })
}

/// Returns `(interest, maturity_amount)` for `principal` at `percentage`.
///
/// Interest is rounded half away from zero to two decimals.
#[must_use]
pub fn calculate_returns(principal: Decimal, percentage: Decimal) -> (Decimal, Decimal) {
    let interest = (principal * percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    (interest, principal + interest)
}

/// Status as of `today`. An inactive contract is never reported as completed.
#[must_use]
pub fn status_on(contract: &investment::Model, today: NaiveDate) -> ContractStatus {
    if !contract.is_active {
        ContractStatus::Inactive
    } else if contract.maturity_date < today {
        ContractStatus::Completed
    } else {
        ContractStatus::Active
    }
}

/// Status as of the current UTC date.
#[must_use]
pub fn status(contract: &investment::Model) -> ContractStatus {
    status_on(contract, Utc::now().date_naive())
}

fn validate_principal(principal: Decimal) -> Result<()> {
    if principal <= Decimal::ZERO {
        return Err(Error::validation("Principal amount must be positive"));
    }
    if principal.normalize().scale() > AMOUNT_SCALE {
        return Err(Error::validation(
            "Principal amount cannot have more than two decimal places",
        ));
    }
    if principal >= Decimal::from(MAX_AMOUNT_EXCLUSIVE) {
        return Err(Error::validation("Principal amount is too large"));
    }
    Ok(())
}

/// Creates a contract for `creator_user_id`.
///
/// The evidence file, if any, is stored before the row is written. A
/// [`Error::Conflict`] on `uk_inv_id` means a concurrent creation took the
/// identifier and the call can be retried as is.
#[instrument(skip(ctx, evidence), fields(has_evidence = evidence.is_some()))]
pub async fn create_investment(
    ctx: &AppContext,
    new: NewInvestment,
    creator_user_id: i64,
    evidence: Option<UploadedFile>,
) -> Result<ContractSummary> {
    validate_principal(new.principal_amount)?;

    let plan = PlanType::find_by_id(new.plan_type_id)
        .one(&ctx.db)
        .await?
        .filter(|p| p.is_active)
        .ok_or(Error::InvalidPlan {
            plan_type_id: new.plan_type_id,
        })?;
    let percentage = parse_percentage(&plan.percentage)?;
    let (interest, maturity) = calculate_returns(new.principal_amount, percentage);
    if maturity >= Decimal::from(MAX_AMOUNT_EXCLUSIVE) {
        return Err(Error::validation("Maturity amount is too large for this plan"));
    }

    let creator = User::find_by_id(creator_user_id)
        .one(&ctx.db)
        .await?
        .ok_or_else(|| Error::not_found("User", creator_user_id))?;

    let upload_file = match evidence {
        Some(file) => Some(ctx.files.store(file).await?),
        None => None,
    };

    let uk_inv_id = next_id(&ctx.db, IdNamespace::InvestmentContract).await?;
    let now = Utc::now();

    let contract = investment::ActiveModel {
        uk_inv_id: Set(uk_inv_id.clone()),
        principal_amount: Set(new.principal_amount),
        plan_type_id: Set(plan.id),
        interest_amount: Set(interest),
        maturity_amount: Set(maturity),
        maturity_date: Set(new.maturity_date),
        is_active: Set(true),
        upload_file: Set(upload_file),
        created_by: Set(creator.id),
        created_date: Set(now),
        ..Default::default()
    }
    .insert(&ctx.db)
    .await
    .map_err(|e| Error::from_write(e, &[("uk_inv_id", uk_inv_id.as_str())]))?;

    info!(
        investment_id = contract.id,
        uk_inv_id = %contract.uk_inv_id,
        %interest,
        %maturity,
        "Created investment"
    );

    let mail = InvestmentCreatedMail {
        to: &creator.email,
        name: &creator.first_name,
        uk_inv_id: &contract.uk_inv_id,
        date: now.format("%Y-%m-%d").to_string(),
        time: now.format("%H:%M:%S").to_string(),
        tenure_days: (contract.maturity_date - now.date_naive()).num_days(),
    };
    match ctx.templates.investment_created(&mail) {
        Ok(message) => {
            if let Err(e) = ctx.mailer.send(message).await {
                warn!(investment_id = contract.id, "Investment confirmation not sent: {}", e);
            }
        }
        Err(e) => warn!("Investment confirmation not rendered: {}", e),
    }

    Ok(ContractSummary {
        customer_id: creator.id,
        investment_id: contract.id,
        status: status(&contract),
        uk_inv_id: contract.uk_inv_id,
        interest_amount: interest,
        maturity_amount: maturity,
    })
}

/// Every contract, any owner, ordered by id. For administrators.
pub async fn get_all_investments(db: &DatabaseConnection) -> Result<Vec<ContractView>> {
    let contracts = Investment::find()
        .order_by_asc(investment::Column::Id)
        .all(db)
        .await?;
    Ok(contracts.into_iter().map(ContractView::from).collect())
}

/// [`get_all_investments`] for an authenticated staff member.
pub async fn list_all_investments_for(
    db: &DatabaseConnection,
    principal: &Principal,
) -> Result<Vec<ContractView>> {
    principal.require_staff()?;
    get_all_investments(db).await
}

/// Contracts created by `user_id`, ordered by ascending id.
pub async fn get_my_investments(db: &DatabaseConnection, user_id: i64) -> Result<Vec<ContractView>> {
    let contracts = Investment::find()
        .filter(investment::Column::CreatedBy.eq(user_id))
        .order_by_asc(investment::Column::Id)
        .all(db)
        .await?;
    Ok(contracts.into_iter().map(ContractView::from).collect())
}

/// Finds a contract by numeric id.
pub async fn get_investment_by_id(db: &DatabaseConnection, investment_id: i64) -> Result<ContractView> {
    Investment::find_by_id(investment_id)
        .one(db)
        .await?
        .map(ContractView::from)
        .ok_or_else(|| Error::not_found("Investment", investment_id))
}

/// Finds a contract by its `INV####` id.
pub async fn get_investment_by_uk_id(db: &DatabaseConnection, uk_inv_id: &str) -> Result<ContractView> {
    Investment::find()
        .filter(investment::Column::UkInvId.eq(uk_inv_id))
        .one(db)
        .await?
        .map(ContractView::from)
        .ok_or_else(|| Error::not_found("Investment", uk_inv_id))
}

async fn find_contract(db: &DatabaseConnection, investment_id: i64) -> Result<investment::Model> {
    Investment::find_by_id(investment_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Investment", investment_id))
}

/// Applies a partial update and stamps the modification audit fields.
///
/// Interest and maturity amount keep their creation-time values.
#[instrument(skip(db))]
pub async fn update_investment(
    db: &DatabaseConnection,
    investment_id: i64,
    update: InvestmentUpdate,
    modified_by: i64,
) -> Result<ContractView> {
    let existing = find_contract(db, investment_id).await?;

    if let Some(principal) = update.principal_amount {
        validate_principal(principal)?;
    }
    if let Some(plan_type_id) = update.plan_type_id {
        PlanType::find_by_id(plan_type_id)
            .one(db)
            .await?
            .ok_or(Error::InvalidPlan { plan_type_id })?;
    }

    let principal_changed = update
        .principal_amount
        .is_some_and(|p| p != existing.principal_amount);
    let plan_changed = update
        .plan_type_id
        .is_some_and(|p| p != existing.plan_type_id);
    if principal_changed || plan_changed {
        warn!(
            investment_id,
            "Principal or plan changed; interest and maturity amount are not recomputed"
        );
    }

    let mut active: investment::ActiveModel = existing.into();
    if let Some(principal) = update.principal_amount {
        active.principal_amount = Set(principal);
    }
    if let Some(plan_type_id) = update.plan_type_id {
        active.plan_type_id = Set(plan_type_id);
    }
    if let Some(maturity_date) = update.maturity_date {
        active.maturity_date = Set(maturity_date);
    }
    if let Some(is_active) = update.is_active {
        active.is_active = Set(is_active);
    }
    active.modified_by = Set(Some(modified_by));
    active.modified_date = Set(Some(Utc::now()));

    let updated = active.update(db).await?;
    info!(investment_id, "Updated investment");
    Ok(updated.into())
}

/// Soft-deletes a contract. Deleting an inactive contract only refreshes the
/// modification stamp.
#[instrument(skip(db))]
pub async fn delete_investment(
    db: &DatabaseConnection,
    investment_id: i64,
    modified_by: i64,
) -> Result<ContractView> {
    let existing = find_contract(db, investment_id).await?;

    let mut active: investment::ActiveModel = existing.into();
    active.is_active = Set(false);
    active.modified_by = Set(Some(modified_by));
    active.modified_date = Set(Some(Utc::now()));

    let updated = active.update(db).await?;
    info!(investment_id, "Deactivated investment");
    Ok(updated.into())
}
