//! User entity - Represents investors and staff accounts.
//!
//! Investors carry a sequential `inv_reg_id` (`I0001`, `I0002`, ...) assigned only
//! after OTP verification. Admin and super-admin rows leave it null. Rows are
//! never hard-deleted; deactivation flips `is_active`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_registration")]
pub struct Model {
    /// Numeric primary key
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Investor registration id (`I####`), null for staff
    #[sea_orm(unique, nullable)]
    pub inv_reg_id: Option<String>,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Login email
    #[sea_orm(unique)]
    pub email: String,
    /// Mobile number
    #[sea_orm(unique)]
    pub mobile: String,
    /// Bcrypt hash, never the plaintext
    #[serde(skip_serializing)]
    pub password: String,
    /// Gender reference id
    pub gender_id: i32,
    /// Age in years at registration
    pub age: i32,
    /// Date of birth
    pub dob: Date,
    /// Role id (1 investor, 2 admin, 3 super admin)
    pub role_id: i32,
    /// Email ownership proven
    pub is_verified: bool,
    /// Cleared by administrators to block login
    pub is_active: bool,
    /// Linked bank reference id
    pub bank_id: Option<i32>,
    /// Linked bank account number
    pub bank_account_no: Option<String>,
    /// Linked bank branch IFSC code
    pub ifsc_code: Option<String>,
    pub created_by: Option<i64>,
    pub created_date: DateTimeUtc,
    pub modified_by: Option<i64>,
    pub modified_date: Option<DateTimeUtc>,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user creates many investment contracts
    #[sea_orm(has_many = "super::investment::Entity")]
    Investments,
}

impl Related<super::investment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Investments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
