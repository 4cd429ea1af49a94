//! Payment orders for investment contracts.

use crate::{
    context::AppContext,
    core::investment::get_investment_by_id,
    errors::{Error, Result},
};
use rust_decimal::prelude::ToPrimitive;
use sea_orm::prelude::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Orders are always taken in rupees.
pub const CURRENCY: &str = "INR";

/// What the client checkout needs to open the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentOrder {
    pub investment_id: i64,
    pub order_id: String,
    /// Principal in rupees
    pub amount: Decimal,
    pub currency: String,
    /// Public gateway key id
    pub key_id: String,
}

/// Gateway callback after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentConfirmation {
    pub investment_id: i64,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Result of a verified payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub investment_id: i64,
    pub payment_id: String,
}

/// Converts rupees to paise.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| Error::validation(format!("Amount {amount} cannot be charged")))
}

/// Opens a gateway order for the contract's principal.
#[instrument(skip(ctx))]
pub async fn create_order(ctx: &AppContext, investment_id: i64) -> Result<PaymentOrder> {
    let view = get_investment_by_id(&ctx.db, investment_id).await?;
    if !view.contract.is_active {
        return Err(Error::validation("Cannot take payment for an inactive investment"));
    }

    let amount = view.contract.principal_amount;
    let order = ctx
        .payments
        .create_order(
            to_minor_units(amount)?,
            CURRENCY,
            &format!("investment_{investment_id}"),
        )
        .await?;

    info!(investment_id, order_id = %order.id, "Payment order created");
    Ok(PaymentOrder {
        investment_id,
        order_id: order.id,
        amount,
        currency: CURRENCY.to_string(),
        key_id: ctx.payments.key_id().to_string(),
    })
}

/// Checks the gateway signature for a completed checkout.
///
/// Any mismatch surfaces as [`Error::PaymentVerificationFailed`] only.
#[instrument(skip(ctx, confirmation), fields(investment_id = confirmation.investment_id))]
pub fn verify_payment(ctx: &AppContext, confirmation: &PaymentConfirmation) -> Result<PaymentReceipt> {
    let valid = ctx.payments.verify_signature(
        &confirmation.order_id,
        &confirmation.payment_id,
        &confirmation.signature,
    );
    if !valid {
        warn!(order_id = %confirmation.order_id, "Payment signature rejected");
        return Err(Error::PaymentVerificationFailed);
    }

    info!(payment_id = %confirmation.payment_id, "Payment verified");
    Ok(PaymentReceipt {
        investment_id: confirmation.investment_id,
        payment_id: confirmation.payment_id.clone(),
    })
}
