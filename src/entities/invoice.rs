//! Invoice entity - Header row for one purchase or sales document.
//!
//! The `kind` column stores the canonical tag string of an
//! [`InvoiceKind`](crate::core::ledger::InvoiceKind); reconciliation always
//! dispatches on the parsed tag, never on the raw string. The three totals
//! are denormalized from the invoice's current lines and are rewritten
//! whenever the lines change.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invoice database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    /// Unique identifier for the invoice
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Canonical kind tag: `"purchase"`, `"sales"`, `"sales_marketplace"`,
    /// `"sales_site"`, or `"sales_other"`
    pub kind: String,
    /// When the invoice was recorded
    pub created_at: DateTimeUtc,
    /// Number of lines currently on the invoice
    pub total_lines: i32,
    /// Sum of line quantities
    pub total_qty: i64,
    /// Sum of line totals
    pub total_amount: f64,
    /// Optional caller-supplied display label
    pub name: Option<String>,
    /// Operator who recorded the invoice, when known
    pub admin: Option<String>,
}

/// Defines relationships between Invoice and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One invoice has many lines
    #[sea_orm(has_many = "super::invoice_line::Entity")]
    Lines,
}

impl Related<super::invoice_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
