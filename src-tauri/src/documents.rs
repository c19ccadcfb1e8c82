//! Sales, purchase and return invoices.
//!
//! Every page runs the same cycle: "New" opens a blank draft with a fresh
//! number, "Edit" copies a stored document into a draft, "Save" appends or
//! replaces in place, "Delete" removes exactly one document. Saving and
//! deleting keep counterparty balances and item stock in step with the
//! documents: an update first undoes what the old version did.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::counterparties::{self, adjust_balance, current_balance};
use crate::db::{now_iso, unknown_value, DbState};
use crate::error::{AppError, AppResult};
use crate::filter::matches_query;
use crate::items::{adjust_stock, fetch_item};
use crate::ledger::{
    compute_totals, line_amounts, validate_line, validate_non_negative, validate_percentage,
    LineAmounts, LineInput, Terms, Totals,
};
use crate::models::{Document, DocumentKind, DocumentLine, FormMode, Item};
use crate::sequence;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinePayload {
    pub item_id: i64,
    pub quantity: f64,
    /// Falls back to the item's sale or purchase price.
    pub unit_price: Option<f64>,
    pub bonus: Option<f64>,
    pub discount_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPayload {
    /// `None` saves a new document, `Some` replaces that document.
    pub id: Option<i64>,
    pub kind: DocumentKind,
    pub date: NaiveDate,
    pub counterparty_id: Option<i64>,
    pub counterparty_name: Option<String>,
    #[serde(default)]
    pub discount_pct: f64,
    /// Cash received on a sale / paid on a purchase / refunded on a return.
    #[serde(default)]
    pub cash: f64,
    pub lines: Vec<LinePayload>,
    pub note: Option<String>,
}

/// Form contents handed to a page on "New" or "Edit".
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDraft {
    pub mode: FormMode,
    pub number: String,
    pub payload: DocumentPayload,
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    pub kind: Option<DocumentKind>,
    pub query: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DocumentFilter {
    fn accepts(&self, doc: &Document) -> bool {
        self.kind.map_or(true, |k| doc.kind == k)
            && self.from.map_or(true, |from| doc.date >= from)
            && self.to.map_or(true, |to| doc.date <= to)
            && matches_query(
                self.query.as_deref(),
                &[doc.number.as_str(), doc.counterparty_name.as_str()],
            )
    }
}

/// A payload line resolved against its item.
struct PricedLine {
    item: Item,
    input: LineInput,
    amounts: LineAmounts,
}

pub fn new_document_form(db: &DbState, kind: DocumentKind, date: NaiveDate) -> AppResult<DocumentDraft> {
    let conn = db.lock()?;
    let number = sequence::peek(&conn, &db.config().numbering, kind.into(), date)?;
    debug!(kind = kind.as_str(), %number, "new document form");
    Ok(DocumentDraft {
        mode: FormMode::New,
        number,
        payload: DocumentPayload {
            id: None,
            kind,
            date,
            counterparty_id: None,
            counterparty_name: None,
            discount_pct: 0.0,
            cash: 0.0,
            lines: Vec::new(),
            note: None,
        },
        totals: Totals::default(),
    })
}

pub fn edit_document_form(db: &DbState, document_id: i64) -> AppResult<DocumentDraft> {
    let conn = db.lock()?;
    let doc = fetch_document(&conn, document_id)?;
    Ok(DocumentDraft {
        mode: FormMode::Edit,
        number: doc.number.clone(),
        payload: DocumentPayload {
            id: Some(doc.id),
            kind: doc.kind,
            date: doc.date,
            counterparty_id: Some(doc.counterparty_id),
            counterparty_name: Some(doc.counterparty_name.clone()),
            discount_pct: doc.totals.discount_pct,
            cash: doc.totals.cash,
            lines: doc
                .lines
                .iter()
                .map(|line| LinePayload {
                    item_id: line.item_id,
                    quantity: line.quantity,
                    unit_price: Some(line.unit_price),
                    bonus: Some(line.bonus),
                    discount_pct: Some(line.discount_pct),
                })
                .collect(),
            note: doc.note.clone(),
        },
        totals: doc.totals,
    })
}

/// Totals the form shows while it is being filled in. Nothing is written.
pub fn preview_document(db: &DbState, payload: &DocumentPayload) -> AppResult<Totals> {
    let conn = db.lock()?;
    let counterparty = counterparties::resolve(
        &conn,
        payload.counterparty_id,
        payload.counterparty_name.as_deref(),
        Some(payload.kind.counterparty_kind()),
    )?;
    let old = payload.id.map(|id| fetch_document(&conn, id)).transpose()?;
    let mut previous_balance = counterparty.balance;
    if let Some(old) = &old {
        if old.counterparty_id == counterparty.id {
            previous_balance -= old.balance_effect();
        }
    }
    let lines = price_lines(&conn, payload, old.as_ref())?;
    Ok(totals_for(payload, &lines, previous_balance))
}

pub fn save_document(db: &DbState, payload: DocumentPayload) -> AppResult<Document> {
    validate_header(&payload)?;
    let kind = payload.kind;
    let enforce_stock = db.config().inventory.enforce_stock;

    let mut conn = db.lock()?;
    let tx = conn.transaction()?;

    let existing = match payload.id {
        Some(id) => {
            let old = fetch_document(&tx, id)?;
            if old.kind != kind {
                return Err(AppError::validation("document type cannot be changed"));
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
        Some(kind.counterparty_kind()),
    )?;
    let lines = price_lines(&tx, &payload, existing.as_ref())?;
    let previous_balance = current_balance(&tx, counterparty.id)?;
    let totals = totals_for(&payload, &lines, previous_balance);

    apply_stock(&tx, existing.as_ref(), kind, &lines, enforce_stock)?;
    adjust_balance(&tx, counterparty.id, totals.balance_effect())?;

    let now = now_iso();
    let (document_id, number) = match &existing {
        Some(old) => {
            tx.execute(
                "UPDATE documents SET date = ?, counterparty_id = ?, discount_pct = ?, gross = ?, line_discount = ?,
                    invoice_discount = ?, discount = ?, net = ?, previous_balance = ?, cash = ?, final_balance = ?,
                    note = ?, updated_at = ?
                 WHERE id = ?",
                params![
                    payload.date,
                    counterparty.id,
                    totals.discount_pct,
                    totals.gross,
                    totals.line_discount,
                    totals.invoice_discount,
                    totals.discount,
                    totals.net,
                    totals.previous_balance,
                    totals.cash,
                    totals.final_balance,
                    payload.note.as_deref(),
                    now,
                    old.id
                ],
            )?;
            tx.execute(
                "DELETE FROM document_lines WHERE document_id = ?",
                params![old.id],
            )?;
            (old.id, old.number.clone())
        }
        None => {
            let number =
                sequence::allocate(&tx, &db.config().numbering, kind.into(), payload.date)?;
            tx.execute(
                "INSERT INTO documents (kind, number, date, counterparty_id, discount_pct, gross, line_discount,
                    invoice_discount, discount, net, previous_balance, cash, final_balance, note, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    kind.as_str(),
                    number,
                    payload.date,
                    counterparty.id,
                    totals.discount_pct,
                    totals.gross,
                    totals.line_discount,
                    totals.invoice_discount,
                    totals.discount,
                    totals.net,
                    totals.previous_balance,
                    totals.cash,
                    totals.final_balance,
                    payload.note.as_deref(),
                    now,
                    now
                ],
            )?;
            (tx.last_insert_rowid(), number)
        }
    };
    insert_lines(&tx, document_id, &lines)?;
    tx.commit()?;

    if existing.is_some() {
        info!(id = document_id, %number, kind = kind.as_str(), net = totals.net, "document updated");
    } else {
        info!(id = document_id, %number, kind = kind.as_str(), net = totals.net, "document saved");
    }
    fetch_document(&conn, document_id)
}

pub fn delete_document(db: &DbState, document_id: i64) -> AppResult<()> {
    let mut conn = db.lock()?;
    let tx = conn.transaction()?;
    let doc = fetch_document(&tx, document_id)?;
    adjust_balance(&tx, doc.counterparty_id, -doc.balance_effect())?;
    apply_stock(
        &tx,
        Some(&doc),
        doc.kind,
        &[],
        db.config().inventory.enforce_stock,
    )?;
    tx.execute(
        "DELETE FROM document_lines WHERE document_id = ?",
        params![document_id],
    )?;
    tx.execute("DELETE FROM documents WHERE id = ?", params![document_id])?;
    tx.commit()?;
    info!(id = document_id, number = %doc.number, "document deleted");
    Ok(())
}

pub fn get_document(db: &DbState, document_id: i64) -> AppResult<Document> {
    let conn = db.lock()?;
    fetch_document(&conn, document_id)
}

pub fn list_documents(db: &DbState, filter: &DocumentFilter) -> AppResult<Vec<Document>> {
    let conn = db.lock()?;
    let docs = fetch_documents(&conn)?
        .into_iter()
        .filter(|doc| filter.accepts(doc))
        .collect();
    Ok(docs)
}

fn validate_header(payload: &DocumentPayload) -> AppResult<()> {
    if payload.lines.is_empty() {
        return Err(AppError::validation("add at least one item"));
    }
    validate_percentage(payload.discount_pct, "discount")?;
    validate_non_negative(payload.cash, "cash amount")
}

/// Archived items are refused unless the document being edited already
/// carries them.
fn price_lines(
    conn: &Connection,
    payload: &DocumentPayload,
    existing: Option<&Document>,
) -> AppResult<Vec<PricedLine>> {
    let apply_line_discount = payload.kind.applies_line_discount();
    payload
        .lines
        .iter()
        .map(|line| {
            let item = fetch_item(conn, line.item_id)?;
            let already_listed =
                existing.map_or(false, |doc| doc.lines.iter().any(|l| l.item_id == item.id));
            if item.archived && !already_listed {
                return Err(AppError::validation(format!(
                    "{} has been removed from the item register",
                    item.name
                )));
            }
            let input = LineInput {
                quantity: line.quantity,
                unit_price: line
                    .unit_price
                    .unwrap_or_else(|| payload.kind.default_price(&item)),
                bonus: line.bonus.unwrap_or(0.0),
                discount_pct: if apply_line_discount {
                    line.discount_pct.unwrap_or(0.0)
                } else {
                    0.0
                },
            };
            validate_line(&input)
                .map_err(|err| AppError::validation(format!("{}: {}", item.name, strip(err))))?;
            let amounts = line_amounts(&input, apply_line_discount);
            Ok(PricedLine {
                item,
                input,
                amounts,
            })
        })
        .collect()
}

fn strip(err: AppError) -> String {
    match err {
        AppError::Validation(message) => message,
        other => other.to_string(),
    }
}

fn totals_for(payload: &DocumentPayload, lines: &[PricedLine], previous_balance: f64) -> Totals {
    let inputs: Vec<LineInput> = lines.iter().map(|line| line.input).collect();
    compute_totals(
        &inputs,
        &Terms {
            discount_pct: payload.discount_pct,
            previous_balance,
            cash: payload.cash,
            apply_line_discount: payload.kind.applies_line_discount(),
            direction: payload.kind.direction(),
        },
    )
}

/// Move stock for a save or delete in one step: the old version (if any) is
/// undone and the new lines applied. With `enforce_stock` set, any item whose
/// net movement would leave it below zero rejects the whole change.
fn apply_stock(
    conn: &Connection,
    old: Option<&Document>,
    kind: DocumentKind,
    lines: &[PricedLine],
    enforce_stock: bool,
) -> AppResult<()> {
    let mut deltas: BTreeMap<i64, (f64, String)> = BTreeMap::new();
    if let Some(old) = old {
        for line in &old.lines {
            let undone = -old.kind.stock_sign() * (line.quantity + line.bonus);
            deltas
                .entry(line.item_id)
                .or_insert((0.0, line.item_name.clone()))
                .0 += undone;
        }
    }
    for line in lines {
        let moved = kind.stock_sign() * (line.input.quantity + line.input.bonus);
        deltas
            .entry(line.item.id)
            .or_insert((0.0, line.item.name.clone()))
            .0 += moved;
    }

    if enforce_stock {
        for (item_id, (delta, name)) in &deltas {
            if *delta < 0.0 {
                let on_hand = fetch_item(conn, *item_id)?.stock;
                if on_hand + delta < 0.0 {
                    return Err(AppError::validation(format!(
                        "insufficient stock for {name} ({on_hand} on hand)"
                    )));
                }
            }
        }
    }
    for (item_id, (delta, _)) in deltas {
        if delta != 0.0 {
            adjust_stock(conn, item_id, delta)?;
        }
    }
    Ok(())
}

fn insert_lines(conn: &Connection, document_id: i64, lines: &[PricedLine]) -> AppResult<()> {
    for (position, line) in lines.iter().enumerate() {
        conn.execute(
            "INSERT INTO document_lines (document_id, position, item_id, item_code, item_name, packing, quantity,
                unit_price, bonus, discount_pct, gross, discount, net)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                document_id,
                position as i64,
                line.item.id,
                line.item.code,
                line.item.name,
                line.item.packing,
                line.input.quantity,
                line.input.unit_price,
                line.input.bonus,
                line.input.discount_pct,
                line.amounts.gross,
                line.amounts.discount,
                line.amounts.net
            ],
        )?;
    }
    Ok(())
}

const DOCUMENT_COLUMNS: &str = "d.id, d.kind, d.number, d.date, d.counterparty_id, c.name, d.discount_pct,
    d.gross, d.line_discount, d.invoice_discount, d.discount, d.net, d.previous_balance, d.cash,
    d.final_balance, d.note, d.created_at, d.updated_at";

fn map_header(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let kind_str: String = row.get(1)?;
    Ok(Document {
        id: row.get(0)?,
        kind: DocumentKind::from_db(&kind_str).ok_or_else(|| unknown_value(1, &kind_str))?,
        number: row.get(2)?,
        date: row.get(3)?,
        counterparty_id: row.get(4)?,
        counterparty_name: row.get(5)?,
        totals: Totals {
            discount_pct: row.get(6)?,
            gross: row.get(7)?,
            line_discount: row.get(8)?,
            invoice_discount: row.get(9)?,
            discount: row.get(10)?,
            net: row.get(11)?,
            previous_balance: row.get(12)?,
            cash: row.get(13)?,
            final_balance: row.get(14)?,
        },
        note: row.get(15)?,
        lines: Vec::new(),
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

fn fetch_lines(conn: &Connection, document_id: i64) -> AppResult<Vec<DocumentLine>> {
    let mut stmt = conn.prepare(
        "SELECT id, position, item_id, item_code, item_name, packing, quantity, unit_price, bonus,
            discount_pct, gross, discount, net
         FROM document_lines
         WHERE document_id = ?
         ORDER BY position",
    )?;
    let rows = stmt.query_map(params![document_id], |row| {
        Ok(DocumentLine {
            id: row.get(0)?,
            position: row.get(1)?,
            item_id: row.get(2)?,
            item_code: row.get(3)?,
            item_name: row.get(4)?,
            packing: row.get(5)?,
            quantity: row.get(6)?,
            unit_price: row.get(7)?,
            bonus: row.get(8)?,
            discount_pct: row.get(9)?,
            gross: row.get(10)?,
            discount: row.get(11)?,
            net: row.get(12)?,
        })
    })?;

    let mut lines = Vec::new();
    for row in rows {
        lines.push(row?);
    }
    Ok(lines)
}

pub(crate) fn fetch_document(conn: &Connection, document_id: i64) -> AppResult<Document> {
    let mut doc = conn
        .query_row(
            &format!(
                "SELECT {DOCUMENT_COLUMNS}
                 FROM documents d
                 JOIN counterparties c ON c.id = d.counterparty_id
                 WHERE d.id = ?"
            ),
            params![document_id],
            map_header,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("document", document_id))?;
    doc.lines = fetch_lines(conn, doc.id)?;
    Ok(doc)
}

/// All documents in the order they were entered.
pub(crate) fn fetch_documents(conn: &Connection) -> AppResult<Vec<Document>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS}
         FROM documents d
         JOIN counterparties c ON c.id = d.counterparty_id
         ORDER BY d.id"
    ))?;
    let rows = stmt.query_map([], map_header)?;

    let mut docs = Vec::new();
    for row in rows {
        let mut doc = row?;
        doc.lines = fetch_lines(conn, doc.id)?;
        docs.push(doc);
    }
    Ok(docs)
}
