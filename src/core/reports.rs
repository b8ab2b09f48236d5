//! Reporting business logic - Read-only aggregates over the catalog and
//! ledger.
//!
//! Everything here fetches rows and folds them in Rust; nothing writes.
//! Profit is computed from the cost snapshots on sales lines, so later
//! purchases never rewrite the margin of an earlier sale.

use crate::{
    core::catalog,
    entities::{Invoice, InvoiceLine, invoice, invoice_line},
    errors::Result,
};
use sea_orm::{DatabaseConnection, prelude::*};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Whole-catalog totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventorySummary {
    /// Catalog rows
    pub product_count: usize,
    /// Net units on hand; oversold products subtract
    pub total_quantity: i64,
    /// Units valued at their weighted-average cost
    pub total_stock_value: f64,
}

/// One product sitting below its restock threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowStockRow {
    /// Display name
    pub product_name: String,
    /// Units on hand
    pub quantity: i64,
    /// Effective threshold: the product's alarm, or the default
    pub threshold: i32,
    /// Units needed to get back to the threshold
    pub needed: i64,
}

/// Count and volume of a slice of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvoiceStats {
    /// Invoices matching the filter
    pub invoice_count: usize,
    /// Sum of their quantities
    pub total_qty: i64,
    /// Sum of their amounts
    pub total_amount: f64,
}

/// One month of ledger activity, keyed `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummaryRow {
    /// Month key, `YYYY-MM`
    pub month: String,
    /// Purchase volume recorded in the month
    pub purchase_total: f64,
    /// Sales volume recorded in the month
    pub sales_total: f64,
    /// Sales revenue minus the cost snapshotted on each sales line
    pub profit: f64,
    /// All invoices recorded in the month, any kind
    pub invoice_count: usize,
}

#[derive(Default)]
struct MonthAccumulator {
    purchase_total: f64,
    sales_total: f64,
    profit: f64,
    invoice_count: usize,
}

/// Totals the catalog: row count, net quantity, and stock value at average
/// cost.
pub async fn inventory_summary(db: &DatabaseConnection) -> Result<InventorySummary> {
    let products = catalog::list_all_products(db).await?;

    let total_quantity = products.iter().map(|p| p.quantity).sum();
    let total_stock_value = products
        .iter()
        .map(|p| p.quantity as f64 * p.avg_buy_price)
        .sum();

    Ok(InventorySummary {
        product_count: products.len(),
        total_quantity,
        total_stock_value,
    })
}

/// Lists products below their restock threshold, most urgent first.
///
/// A product's own alarm beats `default_threshold`; a non-positive default
/// falls back to 5. Rows order by units needed descending, then name, so the
/// worst gaps surface first and ties are stable.
pub async fn low_stock(
    db: &DatabaseConnection,
    default_threshold: i32,
) -> Result<Vec<LowStockRow>> {
    let default_threshold = if default_threshold <= 0 {
        5
    } else {
        default_threshold
    };

    let products = catalog::list_all_products(db).await?;
    let mut rows: Vec<LowStockRow> = products
        .into_iter()
        .filter_map(|product| {
            let threshold = product.alarm.unwrap_or(default_threshold);
            if product.quantity < i64::from(threshold) {
                Some(LowStockRow {
                    product_name: product.name,
                    quantity: product.quantity,
                    threshold,
                    needed: i64::from(threshold) - product.quantity,
                })
            } else {
                None
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.needed
            .cmp(&a.needed)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    Ok(rows)
}

/// Counts invoices and sums their volume, optionally filtered by kind.
///
/// A missing or blank filter covers everything; the literal `"sales"` covers
/// the whole sales family; any other string matches exactly, so
/// `"sales_site"` selects just that channel.
pub async fn invoice_stats(
    db: &DatabaseConnection,
    kind_filter: Option<&str>,
) -> Result<InvoiceStats> {
    let mut query = Invoice::find();
    match kind_filter.map(str::trim) {
        None | Some("") => {}
        Some("sales") => {
            query = query.filter(invoice::Column::Kind.starts_with("sales"));
        }
        Some(kind) => {
            query = query.filter(invoice::Column::Kind.eq(kind));
        }
    }

    let invoices = query.all(db).await?;
    Ok(InvoiceStats {
        invoice_count: invoices.len(),
        total_qty: invoices.iter().map(|i| i.total_qty).sum(),
        total_amount: invoices.iter().map(|i| i.total_amount).sum(),
    })
}

/// Summarizes ledger activity per month, newest month first.
///
/// `limit` caps how many months come back: non-positive means 12, anything
/// over 120 is clamped. Months with no invoices simply do not appear.
pub async fn monthly_summary(
    db: &DatabaseConnection,
    limit: i64,
) -> Result<Vec<MonthlySummaryRow>> {
    let limit = if limit <= 0 { 12 } else { limit.min(120) };

    let invoices = Invoice::find().all(db).await?;

    let mut by_month: BTreeMap<String, MonthAccumulator> = BTreeMap::new();
    let mut sales_month_by_invoice: HashMap<i64, String> = HashMap::new();
    for entry in &invoices {
        let month = entry.created_at.format("%Y-%m").to_string();
        let acc = by_month.entry(month.clone()).or_default();
        acc.invoice_count += 1;
        if entry.kind == "purchase" {
            acc.purchase_total += entry.total_amount;
        } else if entry.kind.starts_with("sales") {
            acc.sales_total += entry.total_amount;
            sales_month_by_invoice.insert(entry.id, month);
        }
    }

    if !sales_month_by_invoice.is_empty() {
        let lines = InvoiceLine::find()
            .filter(
                invoice_line::Column::InvoiceId
                    .is_in(sales_month_by_invoice.keys().copied()),
            )
            .all(db)
            .await?;
        for line in lines {
            if let Some(month) = sales_month_by_invoice.get(&line.invoice_id) {
                if let Some(acc) = by_month.get_mut(month) {
                    acc.profit += line.line_total - line.cost_price * line.quantity as f64;
                }
            }
        }
    }

    let mut rows: Vec<MonthlySummaryRow> = by_month
        .into_iter()
        .rev()
        .map(|(month, acc)| MonthlySummaryRow {
            month,
            purchase_total: acc.purchase_total,
            sales_total: acc.sales_total,
            profit: acc.profit,
            invoice_count: acc.invoice_count,
        })
        .collect();
    rows.truncate(limit as usize);
    Ok(rows)
}
