use serde::Serialize;

use crate::cash::fetch_cash_entries;
use crate::counterparties::fetch_counterparties;
use crate::db::DbState;
use crate::documents::fetch_documents;
use crate::error::AppResult;
use crate::items::fetch_items;
use crate::models::{CashEntry, Counterparty, Document, Item, Voucher};
use crate::reports::{summarize_balances, BalanceSummary};
use crate::vouchers::fetch_vouchers;

/// Everything the pages render, refreshed after each change.
#[derive(Debug, Serialize)]
pub struct AppData {
    pub items: Vec<Item>,
    pub counterparties: Vec<Counterparty>,
    pub documents: Vec<Document>,
    pub cash_entries: Vec<CashEntry>,
    pub vouchers: Vec<Voucher>,
    pub balances: BalanceSummary,
}

pub fn load_app_data(db: &DbState) -> AppResult<AppData> {
    let conn = db.lock()?;
    let items = fetch_items(&conn)?;
    let counterparties = fetch_counterparties(&conn)?;
    let documents = fetch_documents(&conn)?;
    let cash_entries = fetch_cash_entries(&conn)?;
    let vouchers = fetch_vouchers(&conn)?;
    let balances = summarize_balances(&counterparties, None);

    Ok(AppData {
        items,
        counterparties,
        documents,
        cash_entries,
        vouchers,
        balances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn seeded_snapshot_has_every_register() {
        let db = DbState::initialize(AppConfig::default()).unwrap();
        let data = load_app_data(&db).unwrap();
        assert!(!data.items.is_empty());
        assert!(!data.counterparties.is_empty());
        assert_eq!(data.documents.len(), 1);
        assert!(data.cash_entries.is_empty());
        assert_eq!(data.balances.rows.len(), data.counterparties.len());
    }

    #[test]
    fn seeded_invoice_matches_worked_example() {
        let db = DbState::initialize(AppConfig::default()).unwrap();
        let data = load_app_data(&db).unwrap();
        let totals = data.documents[0].totals;
        assert!((totals.gross - 499.92).abs() < 1e-9);
        assert!((totals.discount - 49.992).abs() < 1e-9);
        assert!((totals.net - 449.928).abs() < 1e-9);
    }
}
