use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::NumberingConfig;
use crate::error::AppResult;
use crate::models::{CashKind, DocumentKind};

/// Numbering series, one counter per prefix and calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    Sale,
    Purchase,
    SalesReturn,
    PurchaseReturn,
    Collection,
    Payment,
    CashBook,
    Voucher,
}

impl Series {
    pub fn prefix<'a>(&self, numbering: &'a NumberingConfig) -> &'a str {
        match self {
            Series::Sale => &numbering.sale,
            Series::Purchase => &numbering.purchase,
            Series::SalesReturn => &numbering.sales_return,
            Series::PurchaseReturn => &numbering.purchase_return,
            Series::Collection => &numbering.collection,
            Series::Payment => &numbering.payment,
            Series::CashBook => &numbering.cash_book,
            Series::Voucher => &numbering.voucher,
        }
    }
}

impl From<DocumentKind> for Series {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Sale => Series::Sale,
            DocumentKind::Purchase => Series::Purchase,
            DocumentKind::SalesReturn => Series::SalesReturn,
            DocumentKind::PurchaseReturn => Series::PurchaseReturn,
        }
    }
}

impl From<CashKind> for Series {
    fn from(kind: CashKind) -> Self {
        match kind {
            CashKind::Collection => Series::Collection,
            CashKind::Payment => Series::Payment,
            CashKind::CashBook => Series::CashBook,
        }
    }
}

pub fn format_number(prefix: &str, year: i32, counter: i64, padding: usize) -> String {
    format!("{prefix}-{year}-{counter:0padding$}")
}

fn last_issued(conn: &Connection, prefix: &str, year: i32) -> AppResult<i64> {
    let last = conn
        .query_row(
            "SELECT last FROM sequences WHERE prefix = ? AND year = ?",
            params![prefix, year],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(last.unwrap_or(0))
}

/// Number the next saved document of the series will get. Nothing is
/// reserved: opening "New" twice shows the same number.
pub fn peek(
    conn: &Connection,
    numbering: &NumberingConfig,
    series: Series,
    date: NaiveDate,
) -> AppResult<String> {
    let prefix = series.prefix(numbering);
    let year = date.year();
    let next = last_issued(conn, prefix, year)? + 1;
    Ok(format_number(prefix, year, next, numbering.padding))
}

/// Issue the next number of the series.
pub fn allocate(
    conn: &Connection,
    numbering: &NumberingConfig,
    series: Series,
    date: NaiveDate,
) -> AppResult<String> {
    let prefix = series.prefix(numbering);
    let year = date.year();
    conn.execute(
        "INSERT INTO sequences (prefix, year, last) VALUES (?, ?, 1)
         ON CONFLICT(prefix, year) DO UPDATE SET last = last + 1",
        params![prefix, year],
    )?;
    let issued = last_issued(conn, prefix, year)?;
    Ok(format_number(prefix, year, issued, numbering.padding))
}
