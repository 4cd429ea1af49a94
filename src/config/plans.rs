//! Plan type configuration loading from config.toml
//!
//! Plan types are reference data. The ones listed in config.toml are seeded on
//! startup; existing rows (matched by name) are left as operators edited them.

use crate::entities::{PlanType, plan_type};
use crate::errors::{Error, Result};
use sea_orm::{ConnectionTrait, Set, prelude::*};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Plan types to seed
    #[serde(default)]
    pub plan_types: Vec<PlanTypeConfig>,
}

/// Configuration for a single plan type
#[derive(Debug, Deserialize, Clone)]
pub struct PlanTypeConfig {
    /// Product name
    pub plan_type: String,
    /// Return rate as text, e.g. `"10%"`
    pub percentage: String,
    /// Tenure description
    pub returns_in_days: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Loads plan configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Inserts every configured plan type that is not present yet.
///
/// Returns the number of rows inserted.
pub async fn seed_plan_types<C>(db: &C, plans: &[PlanTypeConfig]) -> Result<usize>
where
    C: ConnectionTrait,
{
    let mut inserted = 0;
    for plan in plans {
        let existing = PlanType::find()
            .filter(plan_type::Column::PlanType.eq(plan.plan_type.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            debug!(plan_type = %plan.plan_type, "Plan type already present");
            continue;
        }

        plan_type::ActiveModel {
            plan_type: Set(plan.plan_type.clone()),
            percentage: Set(plan.percentage.clone()),
            returns_in_days: Set(plan.returns_in_days.clone()),
            is_active: Set(plan.is_active),
            ..Default::default()
        }
        .insert(db)
        .await?;
        inserted += 1;
    }

    info!("Seeded {} plan types", inserted);
    Ok(inserted)
}
