//! Cash book, cash/bank collections and cash/bank payments.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::counterparties::{self, adjust_balance, current_balance};
use crate::db::{now_iso, unknown_value, DbState};
use crate::error::{AppError, AppResult};
use crate::filter::matches_query;
use crate::ledger::{charge_balance, settlement_balance, validate_positive};
use crate::models::{CashDirection, CashEntry, CashKind, CashMode, FormMode};
use crate::sequence;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashPayload {
    pub id: Option<i64>,
    pub kind: CashKind,
    pub date: NaiveDate,
    pub counterparty_id: Option<i64>,
    pub counterparty_name: Option<String>,
    pub mode: CashMode,
    /// Only read for cash book entries; collections are always in and
    /// payments always out.
    pub direction: Option<CashDirection>,
    pub amount: f64,
    pub narration: Option<String>,
}

impl CashPayload {
    fn effective_direction(&self) -> CashDirection {
        match self.kind {
            CashKind::Collection => CashDirection::In,
            CashKind::Payment => CashDirection::Out,
            CashKind::CashBook => self.direction.unwrap_or(CashDirection::In),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CashDraft {
    pub mode: FormMode,
    pub number: String,
    pub payload: CashPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CashFilter {
    pub kind: Option<CashKind>,
    pub mode: Option<CashMode>,
    pub query: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl CashFilter {
    fn accepts(&self, entry: &CashEntry) -> bool {
        self.kind.map_or(true, |k| entry.kind == k)
            && self.mode.map_or(true, |m| entry.mode == m)
            && self.from.map_or(true, |from| entry.date >= from)
            && self.to.map_or(true, |to| entry.date <= to)
            && matches_query(
                self.query.as_deref(),
                &[
                    entry.number.as_str(),
                    entry.counterparty_name.as_str(),
                    entry.narration.as_deref().unwrap_or_default(),
                ],
            )
    }
}

/// Balance of the counterparty after the entry.
///
/// Collections settle a receivable and payments settle a payable, so both
/// bring the balance down. In the cash book, cash received from an account
/// credits it and cash paid out debits it.
pub fn entry_balance(kind: CashKind, direction: CashDirection, previous: f64, amount: f64) -> f64 {
    match (kind, direction) {
        (CashKind::Collection, _) | (CashKind::Payment, _) => settlement_balance(previous, amount),
        (CashKind::CashBook, CashDirection::In) => settlement_balance(previous, amount),
        (CashKind::CashBook, CashDirection::Out) => charge_balance(previous, amount),
    }
}

pub fn new_cash_form(db: &DbState, kind: CashKind, date: NaiveDate) -> AppResult<CashDraft> {
    let conn = db.lock()?;
    let number = sequence::peek(&conn, &db.config().numbering, kind.into(), date)?;
    Ok(CashDraft {
        mode: FormMode::New,
        number,
        payload: CashPayload {
            id: None,
            kind,
            date,
            counterparty_id: None,
            counterparty_name: None,
            mode: CashMode::Cash,
            direction: match kind {
                CashKind::Payment => Some(CashDirection::Out),
                _ => Some(CashDirection::In),
            },
            amount: 0.0,
            narration: None,
        },
    })
}

pub fn edit_cash_form(db: &DbState, entry_id: i64) -> AppResult<CashDraft> {
    let conn = db.lock()?;
    let entry = fetch_cash_entry(&conn, entry_id)?;
    Ok(CashDraft {
        mode: FormMode::Edit,
        number: entry.number.clone(),
        payload: CashPayload {
            id: Some(entry.id),
            kind: entry.kind,
            date: entry.date,
            counterparty_id: Some(entry.counterparty_id),
            counterparty_name: Some(entry.counterparty_name),
            mode: entry.mode,
            direction: Some(entry.direction),
            amount: entry.amount,
            narration: entry.narration,
        },
    })
}

pub fn save_cash_entry(db: &DbState, payload: CashPayload) -> AppResult<CashEntry> {
    validate_positive(payload.amount, "amount")?;
    let kind = payload.kind;
    let direction = payload.effective_direction();

    let mut conn = db.lock()?;
    let tx = conn.transaction()?;

    let existing = match payload.id {
        Some(id) => {
            let old = fetch_cash_entry(&tx, id)?;
            if old.kind != kind {
                return Err(AppError::validation("entry type cannot be changed"));
            }
            adjust_balance(&tx, old.counterparty_id, -old.balance_effect())?;
            Some(old)
        }
        None => None,
    };

    let counterparty = counterparties::resolve(
        &tx,
        payload.counterparty_id,
        payload.counterparty_name.as_deref(),
        kind.counterparty_kind(),
    )?;
    let previous_balance = current_balance(&tx, counterparty.id)?;
    let final_balance = entry_balance(kind, direction, previous_balance, payload.amount);
    adjust_balance(&tx, counterparty.id, final_balance - previous_balance)?;

    let now = now_iso();
    let (entry_id, number) = match &existing {
        Some(old) => {
            tx.execute(
                "UPDATE cash_entries SET date = ?, counterparty_id = ?, mode = ?, direction = ?, amount = ?,
                    previous_balance = ?, final_balance = ?, narration = ?, updated_at = ?
                 WHERE id = ?",
                params![
                    payload.date,
                    counterparty.id,
                    payload.mode.as_str(),
                    direction.as_str(),
                    payload.amount,
                    previous_balance,
                    final_balance,
                    payload.narration.as_deref(),
                    now,
                    old.id
                ],
            )?;
            (old.id, old.number.clone())
        }
        None => {
            let number =
                sequence::allocate(&tx, &db.config().numbering, kind.into(), payload.date)?;
            tx.execute(
                "INSERT INTO cash_entries (kind, number, date, counterparty_id, mode, direction, amount,
                    previous_balance, final_balance, narration, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    kind.as_str(),
                    number,
                    payload.date,
                    counterparty.id,
                    payload.mode.as_str(),
                    direction.as_str(),
                    payload.amount,
                    previous_balance,
                    final_balance,
                    payload.narration.as_deref(),
                    now,
                    now
                ],
            )?;
            (tx.last_insert_rowid(), number)
        }
    };
    tx.commit()?;

    info!(
        id = entry_id,
        %number,
        kind = kind.as_str(),
        amount = payload.amount,
        updated = existing.is_some(),
        "cash entry saved"
    );
    fetch_cash_entry(&conn, entry_id)
}

pub fn delete_cash_entry(db: &DbState, entry_id: i64) -> AppResult<()> {
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let entry = fetch_cash_entry(&tx, entry_id)?;
    adjust_balance(&tx, entry.counterparty_id, -entry.balance_effect())?;
    tx.execute("DELETE FROM cash_entries WHERE id = ?", params![entry_id])?;
    tx.commit()?;
    info!(id = entry_id, number = %entry.number, "cash entry deleted");
    Ok(())
}

pub fn list_cash_entries(db: &DbState, filter: &CashFilter) -> AppResult<Vec<CashEntry>> {
    let conn = db.lock()?;
    let entries = fetch_cash_entries(&conn)?
        .into_iter()
        .filter(|entry| filter.accepts(entry))
        .collect();
    Ok(entries)
}

const CASH_COLUMNS: &str = "e.id, e.kind, e.number, e.date, e.counterparty_id, c.name, e.mode, e.direction,
    e.amount, e.previous_balance, e.final_balance, e.narration, e.created_at, e.updated_at";

fn map_cash_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CashEntry> {
    let kind_str: String = row.get(1)?;
    let mode_str: String = row.get(6)?;
    let direction_str: String = row.get(7)?;
    Ok(CashEntry {
        id: row.get(0)?,
        kind: CashKind::from_db(&kind_str).ok_or_else(|| unknown_value(1, &kind_str))?,
        number: row.get(2)?,
        date: row.get(3)?,
        counterparty_id: row.get(4)?,
        counterparty_name: row.get(5)?,
        mode: CashMode::from_db(&mode_str).ok_or_else(|| unknown_value(6, &mode_str))?,
        direction: CashDirection::from_db(&direction_str)
            .ok_or_else(|| unknown_value(7, &direction_str))?,
        amount: row.get(8)?,
        previous_balance: row.get(9)?,
        final_balance: row.get(10)?,
        narration: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub(crate) fn fetch_cash_entry(conn: &Connection, entry_id: i64) -> AppResult<CashEntry> {
    conn.query_row(
        &format!(
            "SELECT {CASH_COLUMNS}
             FROM cash_entries e
             JOIN counterparties c ON c.id = e.counterparty_id
             WHERE e.id = ?"
        ),
        params![entry_id],
        map_cash_entry,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("cash entry", entry_id))
}

pub(crate) fn fetch_cash_entries(conn: &Connection) -> AppResult<Vec<CashEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CASH_COLUMNS}
         FROM cash_entries e
         JOIN counterparties c ON c.id = e.counterparty_id
         ORDER BY e.id"
    ))?;
    let rows = stmt.query_map([], map_cash_entry)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counterparties::{balance_of, create_counterparty, CounterpartyForm};
    use crate::db::test_db;
    use crate::models::CounterpartyKind;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()
    }

    fn party(db: &DbState, kind: CounterpartyKind, name: &str, opening: f64) -> i64 {
        create_counterparty(
            db,
            CounterpartyForm {
                kind,
                name: name.into(),
                phone: None,
                address: None,
                opening_balance: Some(opening),
            },
        )
        .unwrap()
        .id
    }

    fn entry(kind: CashKind, counterparty: i64, amount: f64) -> CashPayload {
        CashPayload {
            id: None,
            kind,
            date: day(),
            counterparty_id: Some(counterparty),
            counterparty_name: None,
            mode: CashMode::Cash,
            direction: None,
            amount,
            narration: Some("against invoice".into()),
        }
    }

    #[test]
    fn collection_reduces_receivable() {
        let db = test_db();
        let customer = party(&db, CounterpartyKind::Customer, "City Hospital", 449.928);
        let saved = save_cash_entry(&db, entry(CashKind::Collection, customer, 200.0)).unwrap();
        assert_eq!(saved.number, "CRV-2024-0001");
        assert_eq!(saved.direction, CashDirection::In);
        assert!((saved.final_balance - 249.928).abs() < 1e-9);
        assert!((balance_of(&db, customer).unwrap() - 249.928).abs() < 1e-9);
    }

    #[test]
    fn payment_reduces_payable() {
        let db = test_db();
        let supplier = party(&db, CounterpartyKind::Supplier, "Getz Distributors", 3_000.0);
        let saved = save_cash_entry(&db, entry(CashKind::Payment, supplier, 1_200.0)).unwrap();
        assert_eq!(saved.direction, CashDirection::Out);
        assert_eq!(balance_of(&db, supplier).unwrap(), 1_800.0);
    }

    #[test]
    fn payment_needs_a_supplier() {
        let db = test_db();
        let customer = party(&db, CounterpartyKind::Customer, "City Hospital", 0.0);
        let err = save_cash_entry(&db, entry(CashKind::Payment, customer, 10.0)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn cash_book_in_and_out() {
        let db = test_db();
        let rent = party(&db, CounterpartyKind::Account, "Shop Rent", 0.0);
        let mut out = entry(CashKind::CashBook, rent, 25_000.0);
        out.direction = Some(CashDirection::Out);
        save_cash_entry(&db, out).unwrap();
        assert_eq!(balance_of(&db, rent).unwrap(), 25_000.0);

        let mut back = entry(CashKind::CashBook, rent, 5_000.0);
        back.direction = Some(CashDirection::In);
        save_cash_entry(&db, back).unwrap();
        assert_eq!(balance_of(&db, rent).unwrap(), 20_000.0);
    }

    #[test]
    fn amount_must_be_positive() {
        let db = test_db();
        let customer = party(&db, CounterpartyKind::Customer, "City Hospital", 0.0);
        let err = save_cash_entry(&db, entry(CashKind::Collection, customer, 0.0)).unwrap_err();
        assert!(err.is_validation());
        assert!(list_cash_entries(&db, &CashFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn edit_and_delete_rebalance() {
        let db = test_db();
        let customer = party(&db, CounterpartyKind::Customer, "City Hospital", 1_000.0);
        let saved = save_cash_entry(&db, entry(CashKind::Collection, customer, 300.0)).unwrap();

        let mut draft = edit_cash_form(&db, saved.id).unwrap();
        assert_eq!(draft.mode, FormMode::Edit);
        draft.payload.amount = 100.0;
        let updated = save_cash_entry(&db, draft.payload).unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.number, saved.number);
        assert_eq!(updated.previous_balance, 1_000.0);
        assert_eq!(balance_of(&db, customer).unwrap(), 900.0);

        delete_cash_entry(&db, saved.id).unwrap();
        assert_eq!(balance_of(&db, customer).unwrap(), 1_000.0);
    }

    #[test]
    fn filter_by_mode_and_narration() {
        let db = test_db();
        let customer = party(&db, CounterpartyKind::Customer, "City Hospital", 1_000.0);
        save_cash_entry(&db, entry(CashKind::Collection, customer, 10.0)).unwrap();
        let mut bank = entry(CashKind::Collection, customer, 20.0);
        bank.mode = CashMode::Bank;
        bank.narration = Some("cheque 4471".into());
        save_cash_entry(&db, bank).unwrap();

        let banked = CashFilter {
            mode: Some(CashMode::Bank),
            ..CashFilter::default()
        };
        assert_eq!(list_cash_entries(&db, &banked).unwrap().len(), 1);
        let cheque = CashFilter {
            query: Some("4471".into()),
            ..CashFilter::default()
        };
        assert_eq!(list_cash_entries(&db, &cheque).unwrap()[0].amount, 20.0);
    }

    #[test]
    fn new_form_defaults() {
        let db = test_db();
        let draft = new_cash_form(&db, CashKind::Payment, day()).unwrap();
        assert_eq!(draft.number, "CPV-2024-0001");
        assert_eq!(draft.payload.direction, Some(CashDirection::Out));
    }
}
