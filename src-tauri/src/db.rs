use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::seed;

/// The in-memory ledger. Nothing is written to disk; closing the app
/// discards every entry.
pub struct DbState {
    conn: Mutex<Connection>,
    config: AppConfig,
}

impl DbState {
    /// Empty ledger with the schema applied.
    pub fn in_memory(config: AppConfig) -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    /// Ledger for the running app, loaded with the mock fixtures unless
    /// the config turns them off.
    pub fn initialize(config: AppConfig) -> Result<Self, AppError> {
        let seed_mock_data = config.data.seed_mock_data;
        let state = Self::in_memory(config)?;
        if seed_mock_data {
            seed::load_mock_data(&state)?;
        }
        info!(seed_mock_data, "ledger initialized");
        Ok(state)
    }

    pub fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| AppError::Poisoned)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Error for a stored text column that names no known variant.
pub(crate) fn unknown_value(column: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("unknown value {value:?}").into(),
    )
}

pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn run_migrations(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            packing TEXT,
            unit_price REAL NOT NULL DEFAULT 0,
            purchase_price REAL NOT NULL DEFAULT 0,
            stock REAL NOT NULL DEFAULT 0,
            reorder_level REAL NOT NULL DEFAULT 0,
            note TEXT,
            archived INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counterparties (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            phone TEXT,
            address TEXT,
            opening_balance REAL NOT NULL DEFAULT 0,
            balance REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            number TEXT NOT NULL UNIQUE,
            date TEXT NOT NULL,
            counterparty_id INTEGER NOT NULL,
            discount_pct REAL NOT NULL DEFAULT 0,
            gross REAL NOT NULL,
            line_discount REAL NOT NULL,
            invoice_discount REAL NOT NULL,
            discount REAL NOT NULL,
            net REAL NOT NULL,
            previous_balance REAL NOT NULL,
            cash REAL NOT NULL DEFAULT 0,
            final_balance REAL NOT NULL,
            note TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(counterparty_id) REFERENCES counterparties(id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS document_lines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            item_id INTEGER NOT NULL,
            item_code TEXT NOT NULL,
            item_name TEXT NOT NULL,
            packing TEXT,
            quantity REAL NOT NULL,
            unit_price REAL NOT NULL,
            bonus REAL NOT NULL DEFAULT 0,
            discount_pct REAL NOT NULL DEFAULT 0,
            gross REAL NOT NULL,
            discount REAL NOT NULL,
            net REAL NOT NULL,
            FOREIGN KEY(document_id) REFERENCES documents(id) ON DELETE CASCADE,
            FOREIGN KEY(item_id) REFERENCES items(id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS cash_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            number TEXT NOT NULL UNIQUE,
            date TEXT NOT NULL,
            counterparty_id INTEGER NOT NULL,
            mode TEXT NOT NULL,
            direction TEXT NOT NULL,
            amount REAL NOT NULL,
            previous_balance REAL NOT NULL,
            final_balance REAL NOT NULL,
            narration TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(counterparty_id) REFERENCES counterparties(id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS vouchers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            number TEXT NOT NULL UNIQUE,
            date TEXT NOT NULL,
            debit_account_id INTEGER NOT NULL,
            credit_account_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            narration TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(debit_account_id) REFERENCES counterparties(id) ON DELETE RESTRICT,
            FOREIGN KEY(credit_account_id) REFERENCES counterparties(id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS sequences (
            prefix TEXT NOT NULL,
            year INTEGER NOT NULL,
            last INTEGER NOT NULL,
            PRIMARY KEY(prefix, year)
        );

        CREATE INDEX IF NOT EXISTS idx_items_name ON items(name);
        CREATE INDEX IF NOT EXISTS idx_counterparties_name ON counterparties(name);
        CREATE INDEX IF NOT EXISTS idx_documents_date ON documents(date);
        CREATE INDEX IF NOT EXISTS idx_document_lines_document ON document_lines(document_id);
        CREATE INDEX IF NOT EXISTS idx_cash_entries_date ON cash_entries(date);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_db() -> DbState {
    DbState::in_memory(AppConfig::default()).expect("open in-memory ledger")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_created() {
        let db = test_db();
        let conn = db.lock().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('items', 'counterparties', 'documents', 'document_lines', 'cash_entries', 'vouchers', 'sequences')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 7);
    }

    #[test]
    fn initialize_seeds_fixtures() {
        let db = DbState::initialize(AppConfig::default()).unwrap();
        let conn = db.lock().unwrap();
        let items: i64 = conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
            .unwrap();
        assert!(items > 0);
    }
}
