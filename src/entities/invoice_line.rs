//! Invoice line entity - One product row on an invoice.
//!
//! Lines snapshot the product name as written at entry time; they carry no
//! foreign key into `products`, so renaming or deleting a product never
//! rewrites history. `cost_price` records the cost basis at application
//! time: on purchase lines it always equals `price`, on sales lines it is
//! the product's weighted-average cost when the sale was applied.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invoice line database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoice_lines")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the invoice this line belongs to
    #[sea_orm(indexed)]
    pub invoice_id: i64,
    /// Product name exactly as entered (normalized only for matching)
    #[sea_orm(indexed)]
    pub product_name: String,
    /// Unit price on the line
    pub price: f64,
    /// Units bought or sold
    pub quantity: i64,
    /// price * quantity, stored for reporting
    pub line_total: f64,
    /// Cost basis per unit at application time
    pub cost_price: f64,
}

/// Defines relationships between InvoiceLine and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one invoice; deleting the invoice removes it
    #[sea_orm(
        belongs_to = "super::invoice::Entity",
        from = "Column::InvoiceId",
        to = "super::invoice::Column::Id",
        on_delete = "Cascade"
    )]
    Invoice,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
