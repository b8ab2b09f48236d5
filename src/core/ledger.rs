//! Invoice ledger business logic - Creates, edits, and deletes invoices while
//! keeping product stock and cost basis consistent.
//!
//! Purchases raise stock and fold their prices into the weighted-average cost;
//! sales lower stock and snapshot the average cost onto each line. Editing or
//! deleting an invoice reconciles by aggregate delta per product rather than
//! by replaying history: old and new lines are grouped by normalized product
//! name, and each product is adjusted once. Products are locked in sorted
//! key order, so concurrent edits cannot deadlock, and every operation runs
//! in a single transaction - on any error nothing is applied.

use crate::{
    core::catalog::{self, InventoryRow},
    entities::{Invoice, InvoiceLine, invoice, invoice_line, product},
    errors::{Error, Result},
    text,
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;

/// Where a sales invoice originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalesChannel {
    /// Recorded by hand
    Manual,
    /// Marketplace storefront
    Marketplace,
    /// Own web site
    Site,
    /// Anything else, including kinds recorded by older builds
    Other,
}

/// The two invoice families. Sales carry their originating channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceKind {
    /// Stock purchase; raises quantity and reshapes the average cost
    Purchase,
    /// Stock sale; lowers quantity and snapshots cost per line
    Sales(SalesChannel),
}

impl InvoiceKind {
    /// The string stored in the invoice `kind` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Sales(SalesChannel::Manual) => "sales",
            Self::Sales(SalesChannel::Marketplace) => "sales_marketplace",
            Self::Sales(SalesChannel::Site) => "sales_site",
            Self::Sales(SalesChannel::Other) => "sales_other",
        }
    }

    /// Parses a stored kind string.
    ///
    /// Unknown strings in the `sales` family fold into
    /// [`SalesChannel::Other`] so invoices written by older builds still
    /// reconcile as sales; anything else is rejected.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "purchase" => Ok(Self::Purchase),
            "sales" => Ok(Self::Sales(SalesChannel::Manual)),
            "sales_marketplace" => Ok(Self::Sales(SalesChannel::Marketplace)),
            "sales_site" => Ok(Self::Sales(SalesChannel::Site)),
            "sales_other" => Ok(Self::Sales(SalesChannel::Other)),
            other if other.starts_with("sales") => Ok(Self::Sales(SalesChannel::Other)),
            other => Err(Error::UnsupportedInvoiceKind {
                value: other.to_string(),
            }),
        }
    }

    /// Whether this kind reconciles as a sale.
    #[must_use]
    pub const fn is_sales(self) -> bool {
        matches!(self, Self::Sales(_))
    }
}

impl fmt::Display for InvoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a new invoice. For sales a price of 0 means "use the stored
/// sell price, or the average cost when none is set".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLine {
    /// Product name; resolved through normalization
    pub product_name: String,
    /// Unit price; buy price on purchases, sell price on sales
    pub price: f64,
    /// Units bought or sold
    pub quantity: i64,
}

/// One line of an invoice edit. Unlike [`NewLine`] the caller supplies the
/// final stored values: no sell-price fallback is applied, and `cost_price`
/// preserves the historical cost snapshot on sales lines. On purchase lines
/// `cost_price` is ignored and the buy price is snapshotted instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditLine {
    /// Product name; resolved through normalization
    pub product_name: String,
    /// Unit price as it should be stored
    pub price: f64,
    /// Units bought or sold
    pub quantity: i64,
    /// Unit cost snapshot for sales lines
    pub cost_price: f64,
}

/// A validated line ready for insertion.
struct LineDraft {
    product_name: String,
    price: f64,
    quantity: i64,
    cost_price: f64,
}

/// Per-product totals for reconciliation, keyed by normalized name.
#[derive(Debug, Default)]
struct LineAggregate {
    /// Display name, last spelling encountered
    name: String,
    quantity: i64,
    /// Total buy cost, tracked for purchases only
    cost: f64,
    /// Buy price of the last line, tracked for purchases only
    last_price: f64,
}

/// Records a purchase invoice and applies every line to the catalog in one
/// transaction.
///
/// Known products fold the line into their weighted-average cost; a negative
/// on-hand quantity contributes nothing to the average base. Unknown products
/// are created on the fly seeded with the line's price. Each line snapshots
/// its own price as its cost.
pub async fn create_purchase_invoice(
    db: &DatabaseConnection,
    name: Option<String>,
    admin: Option<String>,
    lines: Vec<NewLine>,
) -> Result<invoice::Model> {
    validate_new_lines(&lines, true)?;

    let txn = db.begin().await?;

    let mut drafts = Vec::with_capacity(lines.len());
    for line in &lines {
        match catalog::find_for_update(&txn, &line.product_name).await? {
            Some(product) => {
                let base_qty = product.quantity.max(0);
                let base_price = if product.avg_buy_price > 0.0 {
                    product.avg_buy_price
                } else {
                    line.price
                };
                let denom = base_qty + line.quantity;
                let new_avg = if denom > 0 {
                    (base_price * base_qty as f64 + line.price * line.quantity as f64)
                        / denom as f64
                } else {
                    0.0
                };
                catalog::update_stock_atomic(
                    &txn,
                    product.id,
                    product.quantity + line.quantity,
                    new_avg,
                    line.price,
                )
                .await?;
            }
            None => {
                catalog::upsert_inventory_row(
                    &txn,
                    &InventoryRow {
                        product_name: line.product_name.trim().to_string(),
                        quantity: line.quantity,
                        avg_buy_price: line.price,
                        last_buy_price: line.price,
                        sell_price: 0.0,
                        alarm: None,
                        source: None,
                    },
                )
                .await?;
            }
        }

        drafts.push(LineDraft {
            product_name: line.product_name.trim().to_string(),
            price: line.price,
            quantity: line.quantity,
            cost_price: line.price,
        });
    }

    let created = insert_invoice(&txn, InvoiceKind::Purchase, name, admin, &drafts).await?;
    txn.commit().await?;
    info!(
        "Created purchase invoice {} with {} lines, total {:.2}",
        created.id, created.total_lines, created.total_amount
    );
    Ok(created)
}

/// Records a sales invoice and decrements stock in one transaction.
///
/// Every referenced product must already exist; a missing product aborts the
/// whole invoice. Quantity is never clamped, so selling more than is on hand
/// drives it negative and the discrepancy stays visible. Each line snapshots
/// the product's average cost at the time of sale.
pub async fn create_sales_invoice(
    db: &DatabaseConnection,
    name: Option<String>,
    admin: Option<String>,
    channel: SalesChannel,
    lines: Vec<NewLine>,
) -> Result<invoice::Model> {
    validate_new_lines(&lines, false)?;

    let txn = db.begin().await?;

    let mut drafts = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = catalog::get_for_update(&txn, &line.product_name).await?;
        catalog::update_quantity_atomic(&txn, product.id, product.quantity - line.quantity)
            .await?;

        drafts.push(LineDraft {
            product_name: line.product_name.trim().to_string(),
            price: resolve_sell_price(line.price, &product),
            quantity: line.quantity,
            cost_price: product.avg_buy_price,
        });
    }

    let created = insert_invoice(&txn, InvoiceKind::Sales(channel), name, admin, &drafts).await?;
    txn.commit().await?;
    info!(
        "Created {} invoice {} with {} lines, total {:.2}",
        created.kind, created.id, created.total_lines, created.total_amount
    );
    Ok(created)
}

/// Replaces an invoice's lines and reconciles stock to match, in one
/// transaction.
///
/// The invoice row is locked first, then affected products in sorted
/// normalized-name order. Old and new lines are aggregated per product and
/// only the delta is applied, so the result equals deleting the invoice and
/// recreating it with the new lines. An empty `new_lines` empties the invoice
/// while keeping its row. The label is overwritten with `name`, including
/// back to none.
pub async fn update_invoice_lines(
    db: &DatabaseConnection,
    invoice_id: i64,
    name: Option<String>,
    new_lines: Vec<EditLine>,
) -> Result<()> {
    let txn = db.begin().await?;

    let existing = Invoice::find_by_id(invoice_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(Error::InvoiceNotFound { id: invoice_id })?;
    let kind = InvoiceKind::parse(&existing.kind)?;
    validate_edit_lines(kind, &new_lines)?;

    let old_lines = InvoiceLine::find()
        .filter(invoice_line::Column::InvoiceId.eq(invoice_id))
        .all(&txn)
        .await?;

    let track_cost = !kind.is_sales();
    let old_totals = aggregate_lines(
        old_lines
            .iter()
            .map(|l| (l.product_name.as_str(), l.price, l.quantity)),
        track_cost,
    );
    let new_totals = aggregate_lines(
        new_lines
            .iter()
            .map(|l| (l.product_name.as_str(), l.price, l.quantity)),
        track_cost,
    );

    if kind.is_sales() {
        apply_sales_change(&txn, &old_totals, &new_totals).await?;
    } else {
        apply_purchase_change(&txn, &old_totals, &new_totals).await?;
    }

    InvoiceLine::delete_many()
        .filter(invoice_line::Column::InvoiceId.eq(invoice_id))
        .exec(&txn)
        .await?;

    let drafts: Vec<LineDraft> = new_lines
        .into_iter()
        .map(|line| LineDraft {
            product_name: line.product_name.trim().to_string(),
            price: line.price,
            quantity: line.quantity,
            cost_price: if kind.is_sales() {
                line.cost_price
            } else {
                line.price
            },
        })
        .collect();
    insert_lines(&txn, invoice_id, &drafts).await?;

    let mut active: invoice::ActiveModel = existing.into();
    active.total_lines = Set(drafts.len() as i32);
    active.total_qty = Set(drafts.iter().map(|d| d.quantity).sum());
    active.total_amount = Set(drafts.iter().map(|d| d.price * d.quantity as f64).sum());
    active.name = Set(name);
    active.update(&txn).await?;

    txn.commit().await?;
    info!(
        "Rewrote invoice {} with {} lines",
        invoice_id,
        drafts.len()
    );
    Ok(())
}

/// Deletes an invoice and rolls its stock effect back, in one transaction.
///
/// Reconciles exactly like an edit down to zero lines: purchases subtract
/// their cost contribution from the average, sales return their quantity.
pub async fn delete_invoice(db: &DatabaseConnection, invoice_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let existing = Invoice::find_by_id(invoice_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(Error::InvoiceNotFound { id: invoice_id })?;
    let kind = InvoiceKind::parse(&existing.kind)?;

    let old_lines = InvoiceLine::find()
        .filter(invoice_line::Column::InvoiceId.eq(invoice_id))
        .all(&txn)
        .await?;

    let track_cost = !kind.is_sales();
    let old_totals = aggregate_lines(
        old_lines
            .iter()
            .map(|l| (l.product_name.as_str(), l.price, l.quantity)),
        track_cost,
    );
    let empty = BTreeMap::new();

    if kind.is_sales() {
        apply_sales_change(&txn, &old_totals, &empty).await?;
    } else {
        apply_purchase_change(&txn, &old_totals, &empty).await?;
    }

    InvoiceLine::delete_many()
        .filter(invoice_line::Column::InvoiceId.eq(invoice_id))
        .exec(&txn)
        .await?;
    Invoice::delete_by_id(invoice_id).exec(&txn).await?;

    txn.commit().await?;
    info!(
        "Deleted invoice {} and reversed {} lines",
        invoice_id,
        old_lines.len()
    );
    Ok(())
}

/// Finds an invoice by id.
pub async fn get_invoice(db: &DatabaseConnection, id: i64) -> Result<Option<invoice::Model>> {
    Invoice::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Retrieves an invoice's lines in insertion order.
pub async fn get_invoice_lines(
    db: &DatabaseConnection,
    invoice_id: i64,
) -> Result<Vec<invoice_line::Model>> {
    InvoiceLine::find()
        .filter(invoice_line::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(invoice_line::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Picks the unit sell price for a sales line: an explicit positive line
/// price wins, then the product's stored sell price, then its average cost.
pub(crate) fn resolve_sell_price(line_price: f64, product: &product::Model) -> f64 {
    if line_price > 0.0 {
        line_price
    } else if product.sell_price > 0.0 {
        product.sell_price
    } else {
        product.avg_buy_price
    }
}

fn validate_new_lines(lines: &[NewLine], purchase: bool) -> Result<()> {
    if lines.is_empty() {
        return Err(Error::Validation {
            message: "invoice lines are required".to_string(),
        });
    }
    for line in lines {
        let name = line.product_name.trim();
        if text::is_blank(name) {
            return Err(Error::Validation {
                message: "product name is required".to_string(),
            });
        }
        if line.quantity <= 0 {
            return Err(Error::Validation {
                message: format!("quantity must be positive for {name:?}"),
            });
        }
        if purchase && line.price <= 0.0 {
            return Err(Error::Validation {
                message: format!("price must be positive for {name:?}"),
            });
        }
    }
    Ok(())
}

fn validate_edit_lines(kind: InvoiceKind, lines: &[EditLine]) -> Result<()> {
    for line in lines {
        let name = line.product_name.trim();
        if text::is_blank(name) {
            return Err(Error::Validation {
                message: "product name is required".to_string(),
            });
        }
        if line.quantity <= 0 {
            return Err(Error::Validation {
                message: format!("quantity must be positive for {name:?}"),
            });
        }
        if line.price <= 0.0 {
            return Err(Error::Validation {
                message: format!("price must be positive for {name:?}"),
            });
        }
        if kind.is_sales() && line.cost_price < 0.0 {
            return Err(Error::Validation {
                message: format!("cost price cannot be negative for {name:?}"),
            });
        }
    }
    Ok(())
}

/// Groups lines by normalized product name. Lines whose name normalizes to
/// nothing are skipped; the display name keeps the last spelling seen.
fn aggregate_lines<'a, I>(lines: I, track_cost: bool) -> BTreeMap<String, LineAggregate>
where
    I: IntoIterator<Item = (&'a str, f64, i64)>,
{
    let mut totals: BTreeMap<String, LineAggregate> = BTreeMap::new();
    for (name, price, quantity) in lines {
        let key = text::normalize(name);
        if key.is_empty() {
            continue;
        }
        let entry = totals.entry(key).or_default();
        entry.name = name.trim().to_string();
        entry.quantity += quantity;
        if track_cost {
            entry.cost += price * quantity as f64;
            entry.last_price = price;
        }
    }
    totals
}

/// Walks products touched by a sales edit in sorted key order, returning the
/// quantity difference between old and new lines to each one.
async fn apply_sales_change<C: ConnectionTrait>(
    db: &C,
    old: &BTreeMap<String, LineAggregate>,
    new: &BTreeMap<String, LineAggregate>,
) -> Result<()> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        let old_qty = old.get(key).map_or(0, |a| a.quantity);
        let new_qty = new.get(key).map_or(0, |a| a.quantity);
        let delta = old_qty - new_qty;
        if delta == 0 {
            continue;
        }

        let name = new
            .get(key)
            .or_else(|| old.get(key))
            .map_or_else(|| (*key).clone(), |a| a.name.clone());
        let product = catalog::get_for_update(db, &name).await?;
        catalog::update_quantity_atomic(db, product.id, product.quantity + delta).await?;
    }
    Ok(())
}

/// Walks products touched by a purchase edit in sorted key order, backing the
/// old cost contribution out of each weighted average and folding the new one
/// in.
///
/// The base for the new average is what remains after removing the old lines;
/// a non-positive remaining quantity contributes nothing, the same rule new
/// purchases apply to negative stock. The last buy price moves only when the
/// new lines actually buy something at a positive price.
async fn apply_purchase_change<C: ConnectionTrait>(
    db: &C,
    old: &BTreeMap<String, LineAggregate>,
    new: &BTreeMap<String, LineAggregate>,
) -> Result<()> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        let name = new
            .get(key)
            .or_else(|| old.get(key))
            .map_or_else(|| (*key).clone(), |a| a.name.clone());
        let product = catalog::get_for_update(db, &name).await?;

        let old_qty = old.get(key).map_or(0, |a| a.quantity);
        let old_cost = old.get(key).map_or(0.0, |a| a.cost);
        let new_qty = new.get(key).map_or(0, |a| a.quantity);
        let new_cost = new.get(key).map_or(0.0, |a| a.cost);
        let new_last = new.get(key).map_or(0.0, |a| a.last_price);

        let remaining_qty = product.quantity - old_qty;
        let mut base_cost = product.avg_buy_price * product.quantity as f64 - old_cost;
        let base_qty = remaining_qty.max(0);
        if remaining_qty <= 0 {
            base_cost = 0.0;
        }

        let denom = base_qty + new_qty;
        let new_avg = if denom > 0 {
            (base_cost + new_cost) / denom as f64
        } else {
            0.0
        };
        let last_buy = if new_qty > 0 && new_last > 0.0 {
            new_last
        } else {
            product.last_buy_price
        };

        catalog::update_stock_atomic(
            db,
            product.id,
            remaining_qty + new_qty,
            new_avg,
            last_buy,
        )
        .await?;
    }
    Ok(())
}

/// Inserts the invoice row with totals computed from its drafts, then the
/// lines themselves.
async fn insert_invoice<C: ConnectionTrait>(
    db: &C,
    kind: InvoiceKind,
    name: Option<String>,
    admin: Option<String>,
    drafts: &[LineDraft],
) -> Result<invoice::Model> {
    let created = invoice::ActiveModel {
        kind: Set(kind.as_str().to_string()),
        created_at: Set(Utc::now()),
        total_lines: Set(drafts.len() as i32),
        total_qty: Set(drafts.iter().map(|d| d.quantity).sum()),
        total_amount: Set(drafts.iter().map(|d| d.price * d.quantity as f64).sum()),
        name: Set(name),
        admin: Set(admin),
        ..Default::default()
    }
    .insert(db)
    .await?;

    insert_lines(db, created.id, drafts).await?;
    Ok(created)
}

async fn insert_lines<C: ConnectionTrait>(
    db: &C,
    invoice_id: i64,
    drafts: &[LineDraft],
) -> Result<()> {
    if drafts.is_empty() {
        return Ok(());
    }

    let models = drafts.iter().map(|draft| invoice_line::ActiveModel {
        invoice_id: Set(invoice_id),
        product_name: Set(draft.product_name.clone()),
        price: Set(draft.price),
        quantity: Set(draft.quantity),
        line_total: Set(draft.price * draft.quantity as f64),
        cost_price: Set(draft.cost_price),
        ..Default::default()
    });
    InvoiceLine::insert_many(models).exec(db).await?;
    Ok(())
}
