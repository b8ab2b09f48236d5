//! Product entity - Represents one catalog row of tracked merchandise.
//!
//! Each product carries a display name plus a normalized `name_key` that is
//! the sole identity key: two spellings that normalize identically are the
//! same product. Stock quantity and the weighted-average cost basis live
//! here and are only ever changed inside ledger transactions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name as last written by a purchase or rename (trimmed)
    pub name: String,
    /// Normalized form of `name`; unique, and the only identity key
    #[sea_orm(unique)]
    pub name_key: String,
    /// Units on hand; may go negative when sales outrun recorded purchases
    pub quantity: i64,
    /// Weighted-average buy price per unit
    pub avg_buy_price: f64,
    /// Buy price on the most recent purchase line
    pub last_buy_price: f64,
    /// Default sell price used when a sales line omits one
    pub sell_price: f64,
    /// Low-stock alarm threshold; None falls back to the configured default
    pub alarm: Option<i32>,
    /// Free-form origin tag (e.g. which import created the row)
    pub source: Option<String>,
    /// When the row was first created
    pub created_at: DateTimeUtc,
    /// When the row was last modified
    pub updated_at: DateTimeUtc,
}

/// Products stand alone; invoice lines reference them by name snapshot only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
