//! Bulk import business logic - Reconciles the catalog against external
//! sheets.
//!
//! Three entry points, all transactional: [`sync_inventory`] applies an
//! upsert/delete batch, [`replace_inventory`] rebuilds the catalog from
//! scratch, and [`import_sell_prices`] resolves a legacy price sheet against
//! the catalog by normalized name, falling back to bounded fuzzy matching for
//! spellings normalization alone cannot reconcile.

use crate::{
    core::catalog::{self, InventoryRow},
    entities::{Product, product},
    errors::{Error, Result},
    matcher::MatchPool,
    text,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::info;

/// Counts reported by [`sync_inventory`] and [`replace_inventory`].
///
/// `upserted` counts rows written, not distinct products: two input rows that
/// collapse onto one normalized name both count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Catalog rows written
    pub upserted: usize,
    /// Catalog rows removed
    pub deleted: u64,
}

/// One row of a sell-price sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    /// Name as it appears in the sheet
    pub product_name: String,
    /// New sell price
    pub price: f64,
}

/// Counts and leftovers reported by [`import_sell_prices`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellPriceImportOutcome {
    /// Rows in the input sheet, including blank and duplicate ones
    pub total_rows: usize,
    /// Rows resolved by normalized-name equality
    pub exact_matched: usize,
    /// Rows resolved by fuzzy matching
    pub fuzzy_matched: usize,
    /// Distinct products whose sell price was written
    pub updated_products: usize,
    /// Total names no product could be found for
    pub unmatched_count: usize,
    /// Unmatched names, sorted, truncated to the report cap
    pub unmatched_names: Vec<String>,
}

/// Applies a batch of catalog upserts and deletes in one transaction.
///
/// Deletes run first and are matched by normalized name, so removing a
/// product under any spelling works; a name that is also upserted in the same
/// batch comes back. Upserts collapse per normalized name with the last row
/// winning, and apply in sorted key order.
pub async fn sync_inventory(
    db: &DatabaseConnection,
    upserts: Vec<InventoryRow>,
    deletes: Vec<String>,
) -> Result<SyncOutcome> {
    let txn = db.begin().await?;

    let mut seen = HashSet::new();
    let mut deleted = 0u64;
    for name in &deletes {
        let key = text::normalize(name);
        if key.is_empty() || !seen.insert(key.clone()) {
            continue;
        }
        let outcome = Product::delete_many()
            .filter(product::Column::NameKey.eq(key))
            .exec(&txn)
            .await?;
        deleted += outcome.rows_affected;
    }

    let mut rows_by_key: BTreeMap<String, InventoryRow> = BTreeMap::new();
    for row in upserts {
        let key = text::normalize(&row.product_name);
        if key.is_empty() {
            continue;
        }
        rows_by_key.insert(key, row);
    }

    let mut upserted = 0;
    for row in rows_by_key.values() {
        if catalog::upsert_inventory_row(&txn, row).await? {
            upserted += 1;
        }
    }

    txn.commit().await?;
    info!("Inventory sync: {} upserted, {} deleted", upserted, deleted);
    Ok(SyncOutcome { upserted, deleted })
}

/// Wipes the catalog and rebuilds it from `rows` in one transaction.
///
/// Rows that collapse onto one normalized name overwrite each other, last
/// one winning. `deleted` reports the size of the wiped catalog.
pub async fn replace_inventory(
    db: &DatabaseConnection,
    rows: Vec<InventoryRow>,
) -> Result<SyncOutcome> {
    let txn = db.begin().await?;

    let deleted = Product::delete_many().exec(&txn).await?.rows_affected;

    let mut upserted = 0;
    for row in &rows {
        if catalog::upsert_inventory_row(&txn, row).await? {
            upserted += 1;
        }
    }

    txn.commit().await?;
    info!(
        "Inventory replace: wiped {} rows, inserted {}",
        deleted, upserted
    );
    Ok(SyncOutcome { upserted, deleted })
}

/// Resolves a sell-price sheet against the catalog and writes the matched
/// prices, in one transaction.
///
/// Resolution is normalized-name equality first, then fuzzy matching at
/// `threshold` percent over the whole catalog. Duplicate rows for one product
/// collapse with the last price winning. Blank names are skipped; a negative
/// price aborts the whole import. Unmatched names come back sorted, truncated
/// to `report_cap`, with the untruncated count alongside.
pub async fn import_sell_prices(
    db: &DatabaseConnection,
    rows: Vec<PriceRow>,
    threshold: f64,
    report_cap: usize,
) -> Result<SellPriceImportOutcome> {
    if rows.is_empty() {
        return Err(Error::Validation {
            message: "price rows are required".to_string(),
        });
    }

    let txn = db.begin().await?;

    let products = catalog::list_all_products(&txn).await?;
    let mut ids_by_key: HashMap<&str, i64> = HashMap::new();
    let mut pool = MatchPool::new();
    for product in &products {
        ids_by_key.insert(product.name_key.as_str(), product.id);
        pool.insert(product.name_key.clone(), product.id);
    }

    let total_rows = rows.len();
    let mut exact_matched = 0;
    let mut fuzzy_matched = 0;
    let mut price_by_id: BTreeMap<i64, f64> = BTreeMap::new();
    let mut unmatched: BTreeSet<String> = BTreeSet::new();

    for row in &rows {
        let key = text::normalize(&row.product_name);
        if key.is_empty() {
            continue;
        }
        if row.price < 0.0 {
            return Err(Error::Validation {
                message: format!(
                    "sell price cannot be negative for {:?}",
                    row.product_name.trim()
                ),
            });
        }

        if let Some(&id) = ids_by_key.get(key.as_str()) {
            exact_matched += 1;
            price_by_id.insert(id, row.price);
        } else if let Some(found) = pool.best_match(&key, threshold) {
            fuzzy_matched += 1;
            price_by_id.insert(*found.payload, row.price);
        } else {
            unmatched.insert(row.product_name.trim().to_string());
        }
    }

    for (&product_id, &price) in &price_by_id {
        Product::update_many()
            .col_expr(product::Column::SellPrice, Expr::value(price))
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;
    info!(
        "Sell-price import: {} rows, {} exact, {} fuzzy, {} unmatched",
        total_rows,
        exact_matched,
        fuzzy_matched,
        unmatched.len()
    );

    let unmatched_count = unmatched.len();
    let unmatched_names: Vec<String> = unmatched.into_iter().take(report_cap).collect();
    Ok(SellPriceImportOutcome {
        total_rows,
        exact_matched,
        fuzzy_matched,
        updated_products: price_by_id.len(),
        unmatched_count,
        unmatched_names,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::catalog::list_all_products;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_sync_applies_upserts_and_deletes() -> Result<()> {
        let db = setup_test_db().await?;
        catalog::create_product(&db, inventory_row("کفش", 5, 100.0)).await?;
        catalog::create_product(&db, inventory_row("شال", 3, 50.0)).await?;

        let outcome = sync_inventory(
            &db,
            vec![inventory_row("کیف", 7, 80.0), inventory_row("شال", 9, 60.0)],
            vec![
                // Arabic spelling deletes the Persian row
                "كفش".to_string(),
                "ناموجود".to_string(),
                "کفش".to_string(),
            ],
        )
        .await?;

        assert_eq!(outcome, SyncOutcome { upserted: 2, deleted: 1 });

        let names: Vec<String> = list_all_products(&db)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert!(names.contains(&"کیف".to_string()));
        assert!(names.contains(&"شال".to_string()));
        assert!(!names.contains(&"کفش".to_string()));

        let updated = get_product_named(&db, "شال").await?;
        assert_eq!(updated.quantity, 9);
        assert_eq!(updated.avg_buy_price, 60.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_sync_collapses_duplicate_upserts_last_wins() -> Result<()> {
        let db = setup_test_db().await?;

        let outcome = sync_inventory(
            &db,
            vec![
                inventory_row("كفش مشكي", 4, 100.0),
                inventory_row("کفش مشکی", 11, 130.0),
                inventory_row("   ", 1, 1.0),
            ],
            vec![],
        )
        .await?;
        assert_eq!(outcome.upserted, 1);

        let all = list_all_products(&db).await?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].quantity, 11);
        assert_eq!(all[0].avg_buy_price, 130.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_sync_delete_then_upsert_recreates() -> Result<()> {
        let db = setup_test_db().await?;
        catalog::create_product(&db, inventory_row("کفش", 5, 100.0)).await?;

        let outcome = sync_inventory(
            &db,
            vec![inventory_row("کفش", 2, 140.0)],
            vec!["کفش".to_string()],
        )
        .await?;
        assert_eq!(outcome, SyncOutcome { upserted: 1, deleted: 1 });

        let row = get_product_named(&db, "کفش").await?;
        assert_eq!(row.quantity, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_replace_inventory_rebuilds_catalog() -> Result<()> {
        let db = setup_test_db().await?;
        catalog::create_product(&db, inventory_row("کفش", 5, 100.0)).await?;
        catalog::create_product(&db, inventory_row("شال", 3, 50.0)).await?;

        let outcome = replace_inventory(
            &db,
            vec![inventory_row("کیف", 1, 10.0), inventory_row("چتر", 2, 20.0)],
        )
        .await?;
        assert_eq!(outcome, SyncOutcome { upserted: 2, deleted: 2 });

        let names: Vec<String> = list_all_products(&db)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"کیف".to_string()));
        assert!(!names.contains(&"کفش".to_string()));

        Ok(())
    }

    #[tokio::test]
    async fn test_import_sell_prices_exact_and_fuzzy() -> Result<()> {
        let db = setup_test_db().await?;
        catalog::create_product(&db, inventory_row("کفش مشکی", 5, 100.0)).await?;
        catalog::create_product(&db, inventory_row("شال گردن", 3, 50.0)).await?;

        let rows = vec![
            // Arabic spelling is exact after normalization
            PriceRow {
                product_name: "كفش مشكي".to_string(),
                price: 250.0,
            },
            // Dropped letter needs the fuzzy pass
            PriceRow {
                product_name: "شال گرد".to_string(),
                price: 90.0,
            },
            PriceRow {
                product_name: "ناموجود".to_string(),
                price: 10.0,
            },
        ];
        let outcome = import_sell_prices(&db, rows, 80.0, 50).await?;

        assert_eq!(outcome.total_rows, 3);
        assert_eq!(outcome.exact_matched, 1);
        assert_eq!(outcome.fuzzy_matched, 1);
        assert_eq!(outcome.updated_products, 2);
        assert_eq!(outcome.unmatched_count, 1);
        assert_eq!(outcome.unmatched_names, vec!["ناموجود".to_string()]);

        assert_eq!(get_product_named(&db, "کفش مشکی").await?.sell_price, 250.0);
        assert_eq!(get_product_named(&db, "شال گردن").await?.sell_price, 90.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_import_sell_prices_strict_threshold_rejects_typo() -> Result<()> {
        let db = setup_test_db().await?;
        catalog::create_product(&db, inventory_row("شال گردن", 3, 50.0)).await?;

        // distance 1 on 8 chars scores 87.5, under the default 96
        let rows = vec![PriceRow {
            product_name: "شال گرد".to_string(),
            price: 90.0,
        }];
        let outcome = import_sell_prices(&db, rows, 96.0, 50).await?;

        assert_eq!(outcome.fuzzy_matched, 0);
        assert_eq!(outcome.unmatched_count, 1);
        assert_eq!(get_product_named(&db, "شال گردن").await?.sell_price, 0.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_import_sell_prices_duplicate_rows_last_wins() -> Result<()> {
        let db = setup_test_db().await?;
        catalog::create_product(&db, inventory_row("کفش", 5, 100.0)).await?;

        let rows = vec![
            PriceRow {
                product_name: "کفش".to_string(),
                price: 200.0,
            },
            PriceRow {
                product_name: "كفش".to_string(),
                price: 300.0,
            },
        ];
        let outcome = import_sell_prices(&db, rows, 96.0, 50).await?;

        assert_eq!(outcome.exact_matched, 2);
        assert_eq!(outcome.updated_products, 1);
        assert_eq!(get_product_named(&db, "کفش").await?.sell_price, 300.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_import_sell_prices_unmatched_capped_and_sorted() -> Result<()> {
        let db = setup_test_db().await?;
        catalog::create_product(&db, inventory_row("کفش", 5, 100.0)).await?;

        let rows = vec![
            PriceRow {
                product_name: "cc".to_string(),
                price: 1.0,
            },
            PriceRow {
                product_name: "aa".to_string(),
                price: 1.0,
            },
            PriceRow {
                product_name: "bb".to_string(),
                price: 1.0,
            },
        ];
        let outcome = import_sell_prices(&db, rows, 96.0, 2).await?;

        assert_eq!(outcome.unmatched_count, 3);
        assert_eq!(
            outcome.unmatched_names,
            vec!["aa".to_string(), "bb".to_string()]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_import_sell_prices_negative_price_aborts() -> Result<()> {
        let db = setup_test_db().await?;
        catalog::create_product(&db, inventory_row("کفش", 5, 100.0)).await?;
        catalog::create_product(&db, inventory_row("شال", 3, 50.0)).await?;

        let rows = vec![
            PriceRow {
                product_name: "کفش".to_string(),
                price: 200.0,
            },
            PriceRow {
                product_name: "شال".to_string(),
                price: -5.0,
            },
        ];
        let err = import_sell_prices(&db, rows, 96.0, 50).await.unwrap_err();
        assert!(matches!(err, Error::Validation { message: _ }));

        // First row's write must not have survived the abort
        assert_eq!(get_product_named(&db, "کفش").await?.sell_price, 0.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_import_sell_prices_requires_rows() -> Result<()> {
        let db = setup_test_db().await?;
        let err = import_sell_prices(&db, vec![], 96.0, 50).await.unwrap_err();
        assert!(matches!(err, Error::Validation { message: _ }));
        Ok(())
    }
}
