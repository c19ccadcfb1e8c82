use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use tracing::info;

use crate::db::{now_iso, unknown_value, DbState};
use crate::error::{AppError, AppResult};
use crate::filter::matches_query;
use crate::ledger::validate_amount;
use crate::models::{Counterparty, CounterpartyKind};

#[derive(Debug, Deserialize)]
pub struct CounterpartyForm {
    pub kind: CounterpartyKind,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub opening_balance: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CounterpartyUpdateForm {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub opening_balance: Option<f64>,
}

pub fn create_counterparty(db: &DbState, form: CounterpartyForm) -> AppResult<Counterparty> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(AppError::validation(format!(
            "{} name is required",
            form.kind.label()
        )));
    }
    let opening_balance = form.opening_balance.unwrap_or(0.0);
    validate_amount(opening_balance, "opening balance")?;

    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO counterparties (kind, name, phone, address, opening_balance, balance, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            form.kind.as_str(),
            name,
            form.phone.as_deref(),
            form.address.as_deref(),
            opening_balance,
            opening_balance,
            now_iso()
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, kind = form.kind.as_str(), name, "counterparty created");
    fetch_counterparty(&conn, id)
}

/// Changing the opening balance moves the running balance by the same amount.
pub fn update_counterparty(db: &DbState, form: CounterpartyUpdateForm) -> AppResult<Counterparty> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }

    let conn = db.lock()?;
    let current = fetch_counterparty(&conn, form.id)?;
    let opening_balance = form.opening_balance.unwrap_or(current.opening_balance);
    validate_amount(opening_balance, "opening balance")?;
    let shift = opening_balance - current.opening_balance;

    conn.execute(
        "UPDATE counterparties SET name = ?, phone = ?, address = ?, opening_balance = ?, balance = balance + ?
         WHERE id = ?",
        params![
            name,
            form.phone.as_deref(),
            form.address.as_deref(),
            opening_balance,
            shift,
            form.id
        ],
    )?;
    info!(id = form.id, name, "counterparty updated");
    fetch_counterparty(&conn, form.id)
}

pub fn delete_counterparty(db: &DbState, counterparty_id: i64) -> AppResult<()> {
    let conn = db.lock()?;
    fetch_counterparty(&conn, counterparty_id)?;
    conn.execute(
        "DELETE FROM counterparties WHERE id = ?",
        params![counterparty_id],
    )
    .map_err(|err| match err {
        rusqlite::Error::SqliteFailure(_, _) => {
            AppError::validation("this account has transactions and cannot be deleted")
        }
        other => AppError::Database(other),
    })?;
    info!(id = counterparty_id, "counterparty deleted");
    Ok(())
}

pub fn list_counterparties(
    db: &DbState,
    kind: Option<CounterpartyKind>,
    query: Option<&str>,
) -> AppResult<Vec<Counterparty>> {
    let conn = db.lock()?;
    let rows = fetch_counterparties(&conn)?
        .into_iter()
        .filter(|c| kind.map_or(true, |k| c.kind == k))
        .filter(|c| {
            matches_query(
                query,
                &[c.name.as_str(), c.phone.as_deref().unwrap_or_default()],
            )
        })
        .collect();
    Ok(rows)
}

pub fn get_counterparty(db: &DbState, counterparty_id: i64) -> AppResult<Counterparty> {
    let conn = db.lock()?;
    fetch_counterparty(&conn, counterparty_id)
}

pub fn balance_of(db: &DbState, counterparty_id: i64) -> AppResult<f64> {
    Ok(get_counterparty(db, counterparty_id)?.balance)
}

const COUNTERPARTY_COLUMNS: &str =
    "id, kind, name, phone, address, opening_balance, balance, created_at";

fn map_counterparty(row: &rusqlite::Row<'_>) -> rusqlite::Result<Counterparty> {
    let kind_str: String = row.get(1)?;
    Ok(Counterparty {
        id: row.get(0)?,
        kind: CounterpartyKind::from_db(&kind_str).ok_or_else(|| unknown_value(1, &kind_str))?,
        name: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        opening_balance: row.get(5)?,
        balance: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) fn fetch_counterparty(conn: &Connection, counterparty_id: i64) -> AppResult<Counterparty> {
    conn.query_row(
        &format!("SELECT {COUNTERPARTY_COLUMNS} FROM counterparties WHERE id = ?"),
        params![counterparty_id],
        map_counterparty,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("account", counterparty_id))
}

pub(crate) fn fetch_counterparties(conn: &Connection) -> AppResult<Vec<Counterparty>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COUNTERPARTY_COLUMNS} FROM counterparties ORDER BY name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map([], map_counterparty)?;

    let mut counterparties = Vec::new();
    for row in rows {
        counterparties.push(row?);
    }
    Ok(counterparties)
}

/// Look a counterparty up by its display name, the way the pages resolve a
/// typed customer or supplier.
pub(crate) fn find_by_name(
    conn: &Connection,
    kind: Option<CounterpartyKind>,
    name: &str,
) -> AppResult<Option<Counterparty>> {
    let name = name.trim();
    let found = fetch_counterparties(conn)?
        .into_iter()
        .find(|c| kind.map_or(true, |k| c.kind == k) && c.name.eq_ignore_ascii_case(name));
    Ok(found)
}

/// Resolve a form's counterparty from its id or, failing that, its name.
pub(crate) fn resolve(
    conn: &Connection,
    id: Option<i64>,
    name: Option<&str>,
    kind: Option<CounterpartyKind>,
) -> AppResult<Counterparty> {
    let label = kind.map_or("account", |k| k.label());
    let counterparty = match (id, name.map(str::trim).filter(|n| !n.is_empty())) {
        (Some(id), _) => fetch_counterparty(conn, id)?,
        (None, Some(name)) => find_by_name(conn, kind, name)?
            .ok_or_else(|| AppError::validation(format!("unknown {label}: {name}")))?,
        (None, None) => return Err(AppError::validation(format!("{label} is required"))),
    };
    if let Some(kind) = kind {
        if counterparty.kind != kind {
            return Err(AppError::validation(format!(
                "{} is not a {}",
                counterparty.name,
                kind.label()
            )));
        }
    }
    Ok(counterparty)
}

pub(crate) fn adjust_balance(conn: &Connection, counterparty_id: i64, delta: f64) -> AppResult<()> {
    conn.execute(
        "UPDATE counterparties SET balance = balance + ? WHERE id = ?",
        params![delta, counterparty_id],
    )?;
    Ok(())
}

pub(crate) fn current_balance(conn: &Connection, counterparty_id: i64) -> AppResult<f64> {
    Ok(fetch_counterparty(conn, counterparty_id)?.balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn customer(name: &str, opening: f64) -> CounterpartyForm {
        CounterpartyForm {
            kind: CounterpartyKind::Customer,
            name: name.into(),
            phone: Some("0300-1234567".into()),
            address: None,
            opening_balance: Some(opening),
        }
    }

    #[test]
    fn balance_starts_at_opening() {
        let db = test_db();
        let c = create_counterparty(&db, customer("City Hospital", 1_500.0)).unwrap();
        assert_eq!(c.balance, 1_500.0);
        assert_eq!(balance_of(&db, c.id).unwrap(), 1_500.0);
    }

    #[test]
    fn opening_change_shifts_running_balance() {
        let db = test_db();
        let c = create_counterparty(&db, customer("City Hospital", 1_000.0)).unwrap();
        {
            let conn = db.lock().unwrap();
            adjust_balance(&conn, c.id, 250.0).unwrap();
        }
        let updated = update_counterparty(
            &db,
            CounterpartyUpdateForm {
                id: c.id,
                name: "City Hospital".into(),
                phone: None,
                address: None,
                opening_balance: Some(400.0),
            },
        )
        .unwrap();
        assert_eq!(updated.opening_balance, 400.0);
        assert_eq!(updated.balance, 650.0);
    }

    #[test]
    fn lookup_by_name_and_kind() {
        let db = test_db();
        create_counterparty(&db, customer("Care Pharmacy", 0.0)).unwrap();
        let conn = db.lock().unwrap();
        let found = resolve(&conn, None, Some("care pharmacy"), Some(CounterpartyKind::Customer)).unwrap();
        assert_eq!(found.name, "Care Pharmacy");
        assert!(resolve(&conn, None, Some("Care Pharmacy"), Some(CounterpartyKind::Supplier))
            .unwrap_err()
            .is_validation());
        assert!(resolve(&conn, None, None, Some(CounterpartyKind::Customer))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn list_filters_by_kind_and_query() {
        let db = test_db();
        create_counterparty(&db, customer("Care Pharmacy", 0.0)).unwrap();
        create_counterparty(&db, customer("City Hospital", 0.0)).unwrap();
        create_counterparty(
            &db,
            CounterpartyForm {
                kind: CounterpartyKind::Supplier,
                name: "Getz Pharma Distributors".into(),
                phone: None,
                address: None,
                opening_balance: None,
            },
        )
        .unwrap();
        let customers = list_counterparties(&db, Some(CounterpartyKind::Customer), None).unwrap();
        assert_eq!(customers.len(), 2);
        let pharma = list_counterparties(&db, None, Some("pharma")).unwrap();
        assert_eq!(pharma.len(), 2);
    }

    #[test]
    fn opening_balance_may_be_a_credit() {
        let db = test_db();
        let supplier = create_counterparty(
            &db,
            CounterpartyForm {
                kind: CounterpartyKind::Supplier,
                name: "MediSupply Traders".into(),
                phone: None,
                address: None,
                opening_balance: Some(-750.0),
            },
        )
        .unwrap();
        assert_eq!(supplier.balance, -750.0);
        assert!(create_counterparty(&db, customer("Bad Numbers", f64::NAN))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn unknown_stored_kind_is_an_error() {
        let db = test_db();
        let c = create_counterparty(&db, customer("City Hospital", 0.0)).unwrap();
        {
            let conn = db.lock().unwrap();
            conn.execute("UPDATE counterparties SET kind = 'VENDOR' WHERE id = ?", params![c.id])
                .unwrap();
        }
        assert!(matches!(get_counterparty(&db, c.id), Err(AppError::Database(_))));
    }

    #[test]
    fn delete_unused_counterparty() {
        let db = test_db();
        let c = create_counterparty(&db, customer("Walk-in", 0.0)).unwrap();
        delete_counterparty(&db, c.id).unwrap();
        assert!(matches!(get_counterparty(&db, c.id), Err(AppError::NotFound(_))));
    }
}
