//! Sales simulator - Projects a sales batch against the catalog without
//! writing anything.
//!
//! Used to vet a batch before [`crate::core::ledger::create_sales_invoice`]
//! commits it. Rows are checked in order and availability is tracked
//! cumulatively across the batch, so two rows selling the same product see
//! each other's effect. Price resolution matches the real sales path exactly.

use crate::{
    core::{
        catalog,
        ledger::{self, NewLine},
    },
    entities::product,
    errors::Result,
    text,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Whether a previewed row would apply or be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewStatus {
    /// The row would update stock
    Ok,
    /// The row would be rejected
    Error,
}

/// The projected outcome of one sales row.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewRow {
    /// Name as submitted
    pub product_name: String,
    /// Catalog spelling of the matched product
    pub resolved_name: Option<String>,
    /// Units to sell, as submitted
    pub quantity: i64,
    /// Unit sell price the sale would store
    pub sell_price: f64,
    /// Unit cost the sale would snapshot
    pub cost_price: f64,
    /// Projected on-hand units after this row, cumulative within the batch;
    /// may be negative
    pub remaining_quantity: Option<i64>,
    /// Whether the row would apply
    pub status: PreviewStatus,
    /// Human-readable reason or confirmation
    pub message: String,
}

impl PreviewRow {
    fn rejected(row: &NewLine, message: &str) -> Self {
        Self {
            product_name: row.product_name.clone(),
            resolved_name: None,
            quantity: row.quantity,
            sell_price: 0.0,
            cost_price: 0.0,
            remaining_quantity: None,
            status: PreviewStatus::Error,
            message: message.to_string(),
        }
    }
}

/// A full batch projection.
#[derive(Debug, Clone, Serialize)]
pub struct SalesPreview {
    /// One entry per input row, in input order
    pub rows: Vec<PreviewRow>,
    /// Rows that would apply
    pub success_count: usize,
    /// Rows that would be rejected
    pub error_count: usize,
}

/// Running availability for one product while walking a batch.
struct Projection<'a> {
    product: &'a product::Model,
    remaining: i64,
}

/// Projects what a sales invoice built from `rows` would do, row by row.
///
/// Reads the catalog once up front and never writes. Rejected rows carry a
/// short reason; accepted rows carry the resolved product, the price the sale
/// would store, and the projected remaining quantity.
pub async fn preview_sales(db: &DatabaseConnection, rows: &[NewLine]) -> Result<SalesPreview> {
    let products = catalog::list_all_products(db).await?;
    let mut state: HashMap<&str, Projection> = products
        .iter()
        .map(|product| {
            (
                product.name_key.as_str(),
                Projection {
                    product,
                    remaining: product.quantity,
                },
            )
        })
        .collect();

    let mut preview_rows = Vec::with_capacity(rows.len());
    let mut success_count = 0;
    let mut error_count = 0;

    for row in rows {
        let name = row.product_name.trim();
        if text::is_blank(name) {
            error_count += 1;
            preview_rows.push(PreviewRow::rejected(row, "Missing product name"));
            continue;
        }
        if row.quantity <= 0 {
            error_count += 1;
            preview_rows.push(PreviewRow::rejected(row, "Invalid quantity"));
            continue;
        }

        let key = text::normalize(name);
        let Some(projection) = state.get_mut(key.as_str()) else {
            error_count += 1;
            preview_rows.push(PreviewRow::rejected(row, "Product not found"));
            continue;
        };

        projection.remaining -= row.quantity;
        success_count += 1;
        preview_rows.push(PreviewRow {
            product_name: row.product_name.clone(),
            resolved_name: Some(projection.product.name.clone()),
            quantity: row.quantity,
            sell_price: ledger::resolve_sell_price(row.price, projection.product),
            cost_price: projection.product.avg_buy_price,
            remaining_quantity: Some(projection.remaining),
            status: PreviewStatus::Ok,
            message: "Will update stock".to_string(),
        });
    }

    debug!(
        "Previewed {} sales rows: {} ok, {} rejected",
        rows.len(),
        success_count,
        error_count
    );
    Ok(SalesPreview {
        rows: preview_rows,
        success_count,
        error_count,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::entities::{Invoice, Product};
    use crate::test_utils::*;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn test_preview_never_writes() -> Result<()> {
        let db = setup_test_db().await?;
        seed_purchase(&db, &[("کفش", 10, 100.0)]).await?;

        let before = Product::find().all(&db).await?;
        let preview = preview_sales(
            &db,
            &[line("کفش", 7, 0.0), line("ناموجود", 1, 0.0), line("", 1, 0.0)],
        )
        .await?;
        assert_eq!(preview.success_count, 1);
        assert_eq!(preview.error_count, 2);

        let after = Product::find().all(&db).await?;
        assert_eq!(before, after);
        // Only the seeding purchase exists
        assert_eq!(Invoice::find().all(&db).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_preview_tracks_availability_across_batch() -> Result<()> {
        let db = setup_test_db().await?;
        seed_purchase(&db, &[("کفش", 10, 100.0)]).await?;

        let preview =
            preview_sales(&db, &[line("کفش", 6, 0.0), line("كفش", 6, 0.0)]).await?;

        assert_eq!(preview.rows[0].status, PreviewStatus::Ok);
        assert_eq!(preview.rows[0].remaining_quantity, Some(4));
        // Second row sees the first one's effect and may go negative
        assert_eq!(preview.rows[1].status, PreviewStatus::Ok);
        assert_eq!(preview.rows[1].remaining_quantity, Some(-2));
        assert_eq!(preview.rows[1].resolved_name.as_deref(), Some("کفش"));

        Ok(())
    }

    #[tokio::test]
    async fn test_preview_rejection_reasons() -> Result<()> {
        let db = setup_test_db().await?;
        seed_purchase(&db, &[("کفش", 10, 100.0)]).await?;

        let preview = preview_sales(
            &db,
            &[line("  ", 2, 0.0), line("کفش", 0, 0.0), line("چتر", 1, 0.0)],
        )
        .await?;

        assert_eq!(preview.success_count, 0);
        assert_eq!(preview.error_count, 3);
        assert_eq!(preview.rows[0].message, "Missing product name");
        assert_eq!(preview.rows[1].message, "Invalid quantity");
        assert_eq!(preview.rows[2].message, "Product not found");
        assert!(preview.rows.iter().all(|r| r.resolved_name.is_none()));

        Ok(())
    }

    #[tokio::test]
    async fn test_preview_prices_match_real_sale() -> Result<()> {
        let db = setup_test_db().await?;
        seed_purchase(&db, &[("کفش", 10, 100.0)]).await?;

        let preview = preview_sales(&db, &[line("کفش", 2, 0.0)]).await?;
        assert_eq!(preview.rows[0].sell_price, 100.0);
        assert_eq!(preview.rows[0].cost_price, 100.0);

        let sale = seed_sales(&db, &[("کفش", 2, 0.0)]).await?;
        let lines = crate::core::ledger::get_invoice_lines(&db, sale.id).await?;
        assert_eq!(lines[0].price, preview.rows[0].sell_price);
        assert_eq!(lines[0].cost_price, preview.rows[0].cost_price);

        Ok(())
    }
}
