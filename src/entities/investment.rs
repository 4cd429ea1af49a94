//! Investment contract entity - One fixed-tenure investment instance.
//!
//! Amounts are fixed-point with scale 2. `interest_amount` and `maturity_amount`
//! are computed once from the plan percentage when the contract is created.
//! Deleting a contract only clears `is_active`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Investment contract database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inv_config")]
pub struct Model {
    /// Numeric primary key
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable contract id (`INV####`)
    #[sea_orm(unique)]
    pub uk_inv_id: String,
    /// Invested principal
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub principal_amount: Decimal,
    /// Plan type the rate was taken from
    pub plan_type_id: i32,
    /// `principal * percentage / 100` at creation time
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub interest_amount: Decimal,
    /// `principal + interest` at creation time
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub maturity_amount: Decimal,
    /// Date the contract matures
    pub maturity_date: Date,
    /// Soft delete flag - false once deleted
    pub is_active: bool,
    /// Reference returned by the file store for the uploaded evidence
    pub upload_file: Option<String>,
    /// User id of the creator
    pub created_by: i64,
    pub created_date: DateTimeUtc,
    pub modified_by: Option<i64>,
    pub modified_date: Option<DateTimeUtc>,
}

/// Defines relationships between Investment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each contract references one plan type
    #[sea_orm(
        belongs_to = "super::plan_type::Entity",
        from = "Column::PlanTypeId",
        to = "super::plan_type::Column::Id"
    )]
    PlanType,
    /// Each contract is created by one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id"
    )]
    Creator,
}

impl Related<super::plan_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlanType.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
