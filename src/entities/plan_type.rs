//! Plan type entity - Reference data for investment products.
//!
//! The percentage is stored as text exactly as operators enter it, with or
//! without a trailing `%` (e.g. `"10%"`, `" 7.5 "`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Plan type database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "master_plan_type")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Product name (e.g. "Gold 12M")
    #[sea_orm(unique)]
    pub plan_type: String,
    /// Return rate as entered, e.g. `"10%"`
    pub percentage: String,
    /// Tenure description, e.g. `"365"`
    pub returns_in_days: String,
    /// Only active plans accept new contracts
    pub is_active: bool,
}

/// Defines relationships between `PlanType` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One plan type backs many contracts
    #[sea_orm(has_many = "super::investment::Entity")]
    Investments,
}

impl Related<super::investment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Investments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
