//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the persisted tables: users, investment contracts
//! and the plan type reference data. Each entity has a Model struct for data
//! and an Entity struct for operations.

pub mod investment;
pub mod plan_type;
pub mod user;

// Re-export specific types to avoid conflicts
pub use investment::{
    Column as InvestmentColumn, Entity as Investment, Model as InvestmentModel,
};
pub use plan_type::{Column as PlanTypeColumn, Entity as PlanType, Model as PlanTypeModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
