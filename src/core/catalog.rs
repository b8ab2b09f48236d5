//! Product catalog business logic - Handles all product-related operations.
//!
//! Products are identified by their normalized name key: every lookup, upsert,
//! and rename goes through [`crate::text::normalize`] so that script variants
//! of the same name land on one row. Stock-mutating callers must hold the row
//! lock for the duration of their transaction, which is what
//! [`find_for_update`]/[`get_for_update`] provide; the atomic writers here are
//! only ever called on rows locked that way.

use crate::{
    entities::{InvoiceLine, Product, invoice_line, product},
    errors::{Error, Result},
    text,
};
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// One full catalog row as supplied by imports and product creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRow {
    /// Display name; identity is its normalized form
    pub product_name: String,
    /// Units on hand
    pub quantity: i64,
    /// Weighted-average buy price per unit
    pub avg_buy_price: f64,
    /// Most recent buy price per unit
    pub last_buy_price: f64,
    /// Default sell price
    pub sell_price: f64,
    /// Optional low-stock alarm threshold
    pub alarm: Option<i32>,
    /// Optional origin tag
    pub source: Option<String>,
}

/// Partial update for [`update_product`]. `None` fields are left unchanged;
/// there is no way to clear `alarm` or `source` back to null through a patch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    /// New display name; recomputes the normalized key
    pub name: Option<String>,
    /// Absolute replacement quantity
    pub quantity: Option<i64>,
    /// Absolute replacement average buy price
    pub avg_buy_price: Option<f64>,
    /// Absolute replacement last buy price
    pub last_buy_price: Option<f64>,
    /// Absolute replacement sell price
    pub sell_price: Option<f64>,
    /// New alarm threshold
    pub alarm: Option<i32>,
    /// New origin tag
    pub source: Option<String>,
}

/// Result of [`rename_products`]: how many invoice lines were rewritten and
/// which invoices they belong to, so callers can refresh anything cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameOutcome {
    /// Number of invoice lines whose product name was rewritten
    pub updated_line_count: u64,
    /// Distinct ids of invoices owning a rewritten line, ascending
    pub affected_invoice_ids: Vec<i64>,
}

/// Finds a product by name and locks its row for the enclosing transaction,
/// returning None when no product exists under the normalized name.
///
/// The lock is a `SELECT .. FOR UPDATE` on backends that support it; `SQLite`
/// serializes through its single-writer transaction instead. Callers that
/// require the product to exist should use [`get_for_update`].
pub async fn find_for_update<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<product::Model>> {
    Product::find()
        .filter(product::Column::NameKey.eq(text::normalize(name)))
        .lock_exclusive()
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`find_for_update`] but treats a missing product as an error,
/// aborting the caller's transaction.
pub async fn get_for_update<C: ConnectionTrait>(db: &C, name: &str) -> Result<product::Model> {
    find_for_update(db, name)
        .await?
        .ok_or_else(|| Error::ProductNotFound {
            name: name.to_string(),
        })
}

/// Finds a product by its unique ID, used for direct product lookups.
pub async fn get_product(db: &DatabaseConnection, id: i64) -> Result<Option<product::Model>> {
    Product::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Finds a product by any spelling of its name, without locking.
pub async fn get_product_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<product::Model>> {
    Product::find()
        .filter(product::Column::NameKey.eq(text::normalize(name)))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves every catalog row ordered by id. Used by the simulator and the
/// sell-price import to build their in-memory lookup maps.
pub async fn list_all_products<C: ConnectionTrait>(db: &C) -> Result<Vec<product::Model>> {
    Product::find()
        .order_by_asc(product::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists catalog rows with an optional substring filter on the normalized
/// name, paged by `limit`/`offset`.
///
/// A `limit` of 0 falls back to 200 rows and anything above 1000 is clamped,
/// matching what list endpoints are willing to serve in one page.
pub async fn list_products(
    db: &DatabaseConnection,
    search: Option<&str>,
    limit: u64,
    offset: u64,
) -> Result<Vec<product::Model>> {
    let limit = match limit {
        0 => 200,
        l => l.min(1000),
    };

    let mut query = Product::find();
    if let Some(raw) = search {
        let needle = text::normalize(raw);
        if !needle.is_empty() {
            query = query.filter(product::Column::NameKey.contains(&needle));
        }
    }

    query
        .order_by_asc(product::Column::Id)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Inserts or replaces one catalog row keyed by normalized name and bumps
/// the update timestamp. Rows whose name normalizes to nothing are skipped.
///
/// Returns whether a row was written. This is the raw upsert used by the
/// import reconciler; it performs no validation beyond the name check.
pub async fn upsert_inventory_row<C: ConnectionTrait>(
    db: &C,
    row: &InventoryRow,
) -> Result<bool> {
    let name = row.product_name.trim();
    let key = text::normalize(name);
    if key.is_empty() {
        return Ok(false);
    }

    let now = Utc::now();
    let model = product::ActiveModel {
        name: Set(name.to_string()),
        name_key: Set(key),
        quantity: Set(row.quantity),
        avg_buy_price: Set(row.avg_buy_price),
        last_buy_price: Set(row.last_buy_price),
        sell_price: Set(row.sell_price),
        alarm: Set(row.alarm),
        source: Set(row.source.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    Product::insert(model)
        .on_conflict(
            OnConflict::column(product::Column::NameKey)
                .update_columns([
                    product::Column::Name,
                    product::Column::Quantity,
                    product::Column::AvgBuyPrice,
                    product::Column::LastBuyPrice,
                    product::Column::SellPrice,
                    product::Column::Alarm,
                    product::Column::Source,
                    product::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;

    Ok(true)
}

/// Creates (or replaces, when the normalized name already exists) a catalog
/// row in one transaction, performing input validation, and returns the
/// stored row.
pub async fn create_product(db: &DatabaseConnection, row: InventoryRow) -> Result<product::Model> {
    let name = row.product_name.trim().to_string();
    if text::is_blank(&name) {
        return Err(Error::Validation {
            message: "product name is required".to_string(),
        });
    }
    if row.quantity < 0 {
        return Err(Error::Validation {
            message: format!("quantity cannot be negative for {name:?}"),
        });
    }
    if row.avg_buy_price < 0.0 || row.last_buy_price < 0.0 || row.sell_price < 0.0 {
        return Err(Error::Validation {
            message: format!("prices cannot be negative for {name:?}"),
        });
    }

    let txn = db.begin().await?;
    upsert_inventory_row(&txn, &row).await?;
    let stored = get_product_by_name(&txn, &name)
        .await?
        .ok_or_else(|| Error::ProductNotFound { name })?;
    txn.commit().await?;

    info!("Created product '{}' (id {})", stored.name, stored.id);
    Ok(stored)
}

/// Applies a partial update to a product while holding its row lock, and
/// returns the updated row.
///
/// Renames recompute the normalized key, so the product stays reachable
/// under every spelling of its new name. A rename that collides with a
/// different product's key fails on the unique constraint and nothing is
/// applied.
pub async fn update_product(
    db: &DatabaseConnection,
    id: i64,
    patch: ProductPatch,
) -> Result<product::Model> {
    let txn = db.begin().await?;

    let existing = Product::find_by_id(id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| Error::ProductNotFound {
            name: id.to_string(),
        })?;

    let mut active: product::ActiveModel = existing.into();

    if let Some(raw) = patch.name {
        let name = raw.trim().to_string();
        if text::is_blank(&name) {
            return Err(Error::Validation {
                message: "product name cannot be empty".to_string(),
            });
        }
        active.name_key = Set(text::normalize(&name));
        active.name = Set(name);
    }
    if let Some(quantity) = patch.quantity {
        if quantity < 0 {
            return Err(Error::Validation {
                message: "quantity cannot be negative".to_string(),
            });
        }
        active.quantity = Set(quantity);
    }
    if let Some(avg) = patch.avg_buy_price {
        if avg < 0.0 {
            return Err(Error::Validation {
                message: "avg_buy_price cannot be negative".to_string(),
            });
        }
        active.avg_buy_price = Set(avg);
    }
    if let Some(last) = patch.last_buy_price {
        if last < 0.0 {
            return Err(Error::Validation {
                message: "last_buy_price cannot be negative".to_string(),
            });
        }
        active.last_buy_price = Set(last);
    }
    if let Some(sell) = patch.sell_price {
        if sell < 0.0 {
            return Err(Error::Validation {
                message: "sell_price cannot be negative".to_string(),
            });
        }
        active.sell_price = Set(sell);
    }
    if let Some(alarm) = patch.alarm {
        active.alarm = Set(Some(alarm));
    }
    if let Some(source) = patch.source {
        active.source = Set(Some(source));
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&txn).await?;
    txn.commit().await?;
    info!("Updated product {} ('{}')", id, updated.name);
    Ok(updated)
}

/// Deletes a product row by id.
pub async fn delete_product(db: &DatabaseConnection, id: i64) -> Result<()> {
    let outcome = Product::delete_by_id(id).exec(db).await?;
    if outcome.rows_affected == 0 {
        return Err(Error::ProductNotFound {
            name: id.to_string(),
        });
    }
    info!("Deleted product {}", id);
    Ok(())
}

/// Rewrites a product name across all invoice lines, by exact string
/// equality, in one transaction.
///
/// Lines snapshot names without a foreign key, so a catalog rename leaves
/// history untouched until this is called. Pairs with an empty side or
/// identical sides are skipped. Returns the rewritten line count and the
/// distinct, ascending ids of every invoice that owned one.
pub async fn rename_products(
    db: &DatabaseConnection,
    pairs: &[(String, String)],
) -> Result<RenameOutcome> {
    if pairs.is_empty() {
        return Ok(RenameOutcome::default());
    }

    let txn = db.begin().await?;

    let mut updated_line_count = 0u64;
    let mut invoice_ids = BTreeSet::new();
    for (old, new) in pairs {
        let old = old.trim();
        let new = new.trim();
        if old.is_empty() || new.is_empty() || old == new {
            continue;
        }

        let ids: Vec<i64> = InvoiceLine::find()
            .select_only()
            .column(invoice_line::Column::InvoiceId)
            .distinct()
            .filter(invoice_line::Column::ProductName.eq(old))
            .into_tuple()
            .all(&txn)
            .await?;
        invoice_ids.extend(ids);

        let result = InvoiceLine::update_many()
            .col_expr(invoice_line::Column::ProductName, Expr::value(new))
            .filter(invoice_line::Column::ProductName.eq(old))
            .exec(&txn)
            .await?;
        updated_line_count += result.rows_affected;
    }

    txn.commit().await?;
    info!(
        "Renamed products on {} invoice lines across {} invoices",
        updated_line_count,
        invoice_ids.len()
    );

    Ok(RenameOutcome {
        updated_line_count,
        affected_invoice_ids: invoice_ids.into_iter().collect(),
    })
}

/// Atomically overwrites a product's quantity. Only called on rows locked by
/// [`find_for_update`]/[`get_for_update`] in the same transaction.
pub async fn update_quantity_atomic<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
    quantity: i64,
) -> Result<()> {
    Product::update_many()
        .col_expr(product::Column::Quantity, Expr::value(quantity))
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Atomically overwrites a product's quantity and cost basis. Only called on
/// rows locked by [`find_for_update`]/[`get_for_update`] in the same
/// transaction.
pub async fn update_stock_atomic<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
    quantity: i64,
    avg_buy_price: f64,
    last_buy_price: f64,
) -> Result<()> {
    Product::update_many()
        .col_expr(product::Column::Quantity, Expr::value(quantity))
        .col_expr(product::Column::AvgBuyPrice, Expr::value(avg_buy_price))
        .col_expr(product::Column::LastBuyPrice, Expr::value(last_buy_price))
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .exec(db)
        .await?;
    Ok(())
}
