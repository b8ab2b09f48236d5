/// Product catalog - lookups, locked reads, upserts, renames
pub mod catalog;

/// Invoice ledger - purchase/sales creation, edit reconciliation, deletion
pub mod ledger;

/// Sales simulator - non-persisting projection of a proposed sales batch
pub mod simulator;

/// Bulk import - inventory sync/replace and sell-price mapping
pub mod import;

/// Read-only aggregate reports over products and invoices
pub mod reports;
