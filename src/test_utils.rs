//! Shared test utilities for `Stockbook`.
//!
//! This module provides common helper functions for setting up test databases
//! and recording test invoices with sensible defaults.

use crate::{
    core::{
        catalog::{self, InventoryRow},
        ledger::{self, EditLine, NewLine, SalesChannel},
    },
    entities,
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Builds a catalog row with sensible defaults.
///
/// # Arguments
/// * `name` - Product name
/// * `quantity` - Units on hand
/// * `price` - Used for both the average and last buy price
///
/// # Defaults
/// * `sell_price`: 0.0
/// * `alarm`: None
/// * `source`: None
#[must_use]
pub fn inventory_row(name: &str, quantity: i64, price: f64) -> InventoryRow {
    InventoryRow {
        product_name: name.to_string(),
        quantity,
        avg_buy_price: price,
        last_buy_price: price,
        sell_price: 0.0,
        alarm: None,
        source: None,
    }
}

/// Builds an invoice line as (name, quantity, price).
#[must_use]
pub fn line(name: &str, quantity: i64, price: f64) -> NewLine {
    NewLine {
        product_name: name.to_string(),
        price,
        quantity,
    }
}

/// Builds an invoice edit line as (name, price, quantity, `cost_price`),
/// mirroring the field order of [`EditLine`].
#[must_use]
pub fn edit_line(name: &str, price: f64, quantity: i64, cost_price: f64) -> EditLine {
    EditLine {
        product_name: name.to_string(),
        price,
        quantity,
        cost_price,
    }
}

/// Records a purchase invoice from (name, quantity, price) tuples with no
/// label or admin.
pub async fn seed_purchase(
    db: &DatabaseConnection,
    lines: &[(&str, i64, f64)],
) -> Result<entities::invoice::Model> {
    let lines = lines
        .iter()
        .map(|&(name, quantity, price)| line(name, quantity, price))
        .collect();
    ledger::create_purchase_invoice(db, None, None, lines).await
}

/// Records a manual sales invoice from (name, quantity, price) tuples with no
/// label or admin.
pub async fn seed_sales(
    db: &DatabaseConnection,
    lines: &[(&str, i64, f64)],
) -> Result<entities::invoice::Model> {
    let lines = lines
        .iter()
        .map(|&(name, quantity, price)| line(name, quantity, price))
        .collect();
    ledger::create_sales_invoice(db, None, None, SalesChannel::Manual, lines).await
}

/// Fetches a product by name, treating absence as an error.
/// Use this when the test has already created the product.
pub async fn get_product_named(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::product::Model> {
    catalog::get_product_by_name(db, name)
        .await?
        .ok_or_else(|| Error::ProductNotFound {
            name: name.to_string(),
        })
}
