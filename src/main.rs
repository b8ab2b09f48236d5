//! `stockbook` - Batch imports and reports for the stock ledger database.
//!
//! The interactive surface lives elsewhere; this binary covers the jobs that
//! arrive as files: syncing the catalog from a spreadsheet export, importing
//! a legacy sell-price sheet, and printing a stock overview.

#![allow(clippy::result_large_err)]

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sea_orm::DatabaseConnection;
use std::fs;
use std::path::{Path, PathBuf};
use stockbook::{
    config::{database, settings},
    core::{
        catalog::InventoryRow,
        import::{self, PriceRow},
        reports,
    },
    errors::{Error, Result},
    text,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Merchandise stock and cost-basis ledger
#[derive(Parser, Debug)]
#[command(name = "stockbook")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upsert catalog rows from a CSV export, optionally deleting listed names
    Sync {
        /// CSV with `name,quantity,avg_buy_price,last_buy_price,sell_price[,alarm[,source]]`
        csv: PathBuf,

        /// File with one product name per line to delete first
        #[arg(long)]
        deletes: Option<PathBuf>,
    },

    /// Import sell prices from a `name,price` CSV, resolving misspelled names
    Prices {
        /// CSV with `name,price`
        csv: PathBuf,

        /// Minimum similarity percent for fuzzy name matches
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Print catalog totals, ledger volume, and the low-stock list
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file (as early as possible)
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Parse the command line
    let cli = Cli::parse();

    // 4. Load the application settings
    let settings = settings::load_default_settings()?;

    // 5. Initialize database (DATABASE_URL or the default local file)
    let db = database::create_connection()
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {e}"))?;
    database::create_tables(&db).await?;

    // 6. Run the requested command
    match cli.command {
        Commands::Sync { csv, deletes } => run_sync(&db, &csv, deletes.as_deref()).await,
        Commands::Prices { csv, threshold } => {
            run_prices(
                &db,
                &csv,
                threshold.unwrap_or(settings.sell_price_threshold),
                settings.unmatched_report_cap,
            )
            .await
        }
        Commands::Summary => run_summary(&db, settings.low_stock_threshold).await,
    }
}

async fn run_sync(db: &DatabaseConnection, csv: &Path, deletes: Option<&Path>) -> Result<()> {
    let upserts = parse_inventory_csv(csv)?;
    let deletes = match deletes {
        Some(path) => parse_deletes_file(path)?,
        None => Vec::new(),
    };
    info!(
        "Applying inventory sync: {} upserts, {} deletes",
        upserts.len(),
        deletes.len()
    );

    let outcome = import::sync_inventory(db, upserts, deletes).await?;
    println!(
        "Upserted {} products, deleted {}.",
        outcome.upserted, outcome.deleted
    );
    Ok(())
}

async fn run_prices(
    db: &DatabaseConnection,
    csv: &Path,
    threshold: f64,
    report_cap: usize,
) -> Result<()> {
    let rows = parse_price_csv(csv)?;
    info!(
        "Importing sell prices: {} rows at threshold {}",
        rows.len(),
        threshold
    );

    let outcome = import::import_sell_prices(db, rows, threshold, report_cap).await?;
    println!(
        "{} rows: {} exact, {} fuzzy, {} products updated.",
        outcome.total_rows, outcome.exact_matched, outcome.fuzzy_matched, outcome.updated_products
    );
    if outcome.unmatched_count > 0 {
        println!("{} names had no match:", outcome.unmatched_count);
        for name in &outcome.unmatched_names {
            println!("  {name}");
        }
        let listed = outcome.unmatched_names.len();
        if outcome.unmatched_count > listed {
            println!("  ... and {} more", outcome.unmatched_count - listed);
        }
    }
    Ok(())
}

async fn run_summary(db: &DatabaseConnection, low_stock_threshold: i32) -> Result<()> {
    let summary = reports::inventory_summary(db).await?;
    println!(
        "{} products, {} units on hand, stock value {:.2}",
        summary.product_count, summary.total_quantity, summary.total_stock_value
    );

    let stats = reports::invoice_stats(db, None).await?;
    println!(
        "{} invoices on record totaling {:.2}",
        stats.invoice_count, stats.total_amount
    );

    let months = reports::monthly_summary(db, 3).await?;
    for month in &months {
        println!(
            "  {}: bought {:.2}, sold {:.2}, profit {:.2}",
            month.month, month.purchase_total, month.sales_total, month.profit
        );
    }

    let low = reports::low_stock(db, low_stock_threshold).await?;
    if low.is_empty() {
        println!("No products below their restock threshold.");
    } else {
        println!("Low stock:");
        for row in &low {
            println!(
                "  {}: {} on hand, needs {} more (threshold {})",
                row.product_name, row.quantity, row.needed, row.threshold
            );
        }
    }
    Ok(())
}

/// Reads a catalog CSV. The first line may be a header; it is skipped when
/// its numeric cells do not parse. Number cells accept Persian/Arabic digits
/// and separators.
fn parse_inventory_csv(path: &Path) -> Result<Vec<InventoryRow>> {
    let contents = fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').collect();
        match parse_inventory_line(&cells) {
            Some(row) => rows.push(row),
            None if index == 0 => {}
            None => {
                return Err(Error::Validation {
                    message: format!("line {}: cannot parse inventory row {line:?}", index + 1),
                });
            }
        }
    }
    Ok(rows)
}

fn parse_inventory_line(cells: &[&str]) -> Option<InventoryRow> {
    if cells.len() < 5 {
        return None;
    }
    let quantity = text::parse_number(cells[1])? as i64;
    let avg_buy_price = text::parse_number(cells[2])?;
    let last_buy_price = text::parse_number(cells[3])?;
    let sell_price = text::parse_number(cells[4])?;
    let alarm = match cells.get(5).map(|cell| cell.trim()) {
        None | Some("") => None,
        Some(cell) => Some(text::parse_number(cell)? as i32),
    };
    let source = cells
        .get(6)
        .map(|cell| cell.trim())
        .filter(|cell| !cell.is_empty())
        .map(str::to_string);

    Some(InventoryRow {
        product_name: cells[0].trim().to_string(),
        quantity,
        avg_buy_price,
        last_buy_price,
        sell_price,
        alarm,
        source,
    })
}

/// Reads a `name,price` CSV under the same header rule as
/// [`parse_inventory_csv`].
fn parse_price_csv(path: &Path) -> Result<Vec<PriceRow>> {
    let contents = fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').collect();
        match parse_price_line(&cells) {
            Some(row) => rows.push(row),
            None if index == 0 => {}
            None => {
                return Err(Error::Validation {
                    message: format!("line {}: cannot parse price row {line:?}", index + 1),
                });
            }
        }
    }
    Ok(rows)
}

fn parse_price_line(cells: &[&str]) -> Option<PriceRow> {
    if cells.len() < 2 {
        return None;
    }
    let price = text::parse_number(cells[1])?;
    Some(PriceRow {
        product_name: cells[0].trim().to_string(),
        price,
    })
}

/// Reads a deletion list, one product name per line, skipping blanks.
fn parse_deletes_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
