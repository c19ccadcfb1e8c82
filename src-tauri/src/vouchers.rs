use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::counterparties::{self, adjust_balance};
use crate::db::{now_iso, DbState};
use crate::error::{AppError, AppResult};
use crate::filter::matches_query;
use crate::ledger::validate_positive;
use crate::models::Voucher;
use crate::sequence::{self, Series};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherPayload {
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub debit_account_id: i64,
    pub credit_account_id: i64,
    pub amount: f64,
    pub narration: Option<String>,
}

pub fn next_voucher_number(db: &DbState, date: NaiveDate) -> AppResult<String> {
    let conn = db.lock()?;
    sequence::peek(&conn, &db.config().numbering, Series::Voucher, date)
}

/// Debit account goes up by the amount, credit account comes down by it.
pub fn save_voucher(db: &DbState, payload: VoucherPayload) -> AppResult<Voucher> {
    validate_positive(payload.amount, "amount")?;
    if payload.debit_account_id == payload.credit_account_id {
        return Err(AppError::validation(
            "debit and credit accounts must be different",
        ));
    }

    let mut conn = db.lock()?;
    let tx = conn.transaction()?;

    let existing = match payload.id {
        Some(id) => {
            let old = fetch_voucher(&tx, id)?;
            reverse(&tx, &old)?;
            Some(old)
        }
        None => None,
    };

    counterparties::fetch_counterparty(&tx, payload.debit_account_id)?;
    counterparties::fetch_counterparty(&tx, payload.credit_account_id)?;
    adjust_balance(&tx, payload.debit_account_id, payload.amount)?;
    adjust_balance(&tx, payload.credit_account_id, -payload.amount)?;

    let voucher_id = match &existing {
        Some(old) => {
            tx.execute(
                "UPDATE vouchers SET date = ?, debit_account_id = ?, credit_account_id = ?, amount = ?, narration = ?
                 WHERE id = ?",
                params![
                    payload.date,
                    payload.debit_account_id,
                    payload.credit_account_id,
                    payload.amount,
                    payload.narration.as_deref(),
                    old.id
                ],
            )?;
            old.id
        }
        None => {
            let number =
                sequence::allocate(&tx, &db.config().numbering, Series::Voucher, payload.date)?;
            tx.execute(
                "INSERT INTO vouchers (number, date, debit_account_id, credit_account_id, amount, narration, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    number,
                    payload.date,
                    payload.debit_account_id,
                    payload.credit_account_id,
                    payload.amount,
                    payload.narration.as_deref(),
                    now_iso()
                ],
            )?;
            tx.last_insert_rowid()
        }
    };
    tx.commit()?;

    info!(id = voucher_id, amount = payload.amount, "voucher saved");
    fetch_voucher(&conn, voucher_id)
}

/// The page asks before deleting a voucher; `confirmed` carries the answer.
pub fn delete_voucher(db: &DbState, voucher_id: i64, confirmed: bool) -> AppResult<()> {
    if !confirmed {
        warn!(id = voucher_id, "voucher delete not confirmed");
        return Err(AppError::validation("confirm deletion of the voucher"));
    }
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let voucher = fetch_voucher(&tx, voucher_id)?;
    reverse(&tx, &voucher)?;
    tx.execute("DELETE FROM vouchers WHERE id = ?", params![voucher_id])?;
    tx.commit()?;
    info!(id = voucher_id, number = %voucher.number, "voucher deleted");
    Ok(())
}

pub fn list_vouchers(db: &DbState, query: Option<&str>) -> AppResult<Vec<Voucher>> {
    let conn = db.lock()?;
    let vouchers = fetch_vouchers(&conn)?
        .into_iter()
        .filter(|v| {
            matches_query(
                query,
                &[
                    v.number.as_str(),
                    v.debit_account_name.as_str(),
                    v.credit_account_name.as_str(),
                    v.narration.as_deref().unwrap_or_default(),
                ],
            )
        })
        .collect();
    Ok(vouchers)
}

fn reverse(conn: &Connection, voucher: &Voucher) -> AppResult<()> {
    adjust_balance(conn, voucher.debit_account_id, -voucher.amount)?;
    adjust_balance(conn, voucher.credit_account_id, voucher.amount)
}

const VOUCHER_QUERY: &str = "SELECT v.id, v.number, v.date, v.debit_account_id, d.name, v.credit_account_id, c.name,
        v.amount, v.narration, v.created_at
     FROM vouchers v
     JOIN counterparties d ON d.id = v.debit_account_id
     JOIN counterparties c ON c.id = v.credit_account_id";

fn map_voucher(row: &rusqlite::Row<'_>) -> rusqlite::Result<Voucher> {
    Ok(Voucher {
        id: row.get(0)?,
        number: row.get(1)?,
        date: row.get(2)?,
        debit_account_id: row.get(3)?,
        debit_account_name: row.get(4)?,
        credit_account_id: row.get(5)?,
        credit_account_name: row.get(6)?,
        amount: row.get(7)?,
        narration: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub(crate) fn fetch_voucher(conn: &Connection, voucher_id: i64) -> AppResult<Voucher> {
    conn.query_row(
        &format!("{VOUCHER_QUERY} WHERE v.id = ?"),
        params![voucher_id],
        map_voucher,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("voucher", voucher_id))
}

pub(crate) fn fetch_vouchers(conn: &Connection) -> AppResult<Vec<Voucher>> {
    let mut stmt = conn.prepare(&format!("{VOUCHER_QUERY} ORDER BY v.id"))?;
    let rows = stmt.query_map([], map_voucher)?;

    let mut vouchers = Vec::new();
    for row in rows {
        vouchers.push(row?);
    }
    Ok(vouchers)
}
