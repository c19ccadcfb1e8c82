use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use tracing::info;

use crate::db::{now_iso, DbState};
use crate::error::{AppError, AppResult};
use crate::filter::matches_query;
use crate::ledger::validate_non_negative;
use crate::models::Item;

#[derive(Debug, Deserialize)]
pub struct ItemForm {
    pub code: String,
    pub name: String,
    pub packing: Option<String>,
    pub unit_price: f64,
    pub purchase_price: Option<f64>,
    pub opening_stock: Option<f64>,
    pub reorder_level: Option<f64>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemUpdateForm {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub packing: Option<String>,
    pub unit_price: f64,
    pub purchase_price: Option<f64>,
    pub reorder_level: Option<f64>,
    pub note: Option<String>,
}

fn validate_fields(code: &str, name: &str, unit_price: f64, purchase_price: f64) -> AppResult<()> {
    if code.trim().is_empty() {
        return Err(AppError::validation("item code is required"));
    }
    if name.trim().is_empty() {
        return Err(AppError::validation("item name is required"));
    }
    validate_non_negative(unit_price, "sale price")?;
    validate_non_negative(purchase_price, "purchase price")
}

fn ensure_code_free(conn: &Connection, code: &str, except_id: Option<i64>) -> AppResult<()> {
    let taken = conn
        .query_row(
            "SELECT id FROM items WHERE code = ? COLLATE NOCASE",
            params![code],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    match taken {
        Some(id) if Some(id) != except_id => Err(AppError::validation(format!(
            "item code {code} is already registered"
        ))),
        _ => Ok(()),
    }
}

pub fn create_item(db: &DbState, form: ItemForm) -> AppResult<Item> {
    let purchase_price = form.purchase_price.unwrap_or(0.0);
    validate_fields(&form.code, &form.name, form.unit_price, purchase_price)?;
    let opening_stock = form.opening_stock.unwrap_or(0.0);
    validate_non_negative(opening_stock, "opening stock")?;
    let reorder_level = form.reorder_level.unwrap_or(0.0);
    validate_non_negative(reorder_level, "reorder level")?;

    let conn = db.lock()?;
    let code = form.code.trim();
    ensure_code_free(&conn, code, None)?;

    conn.execute(
        "INSERT INTO items (code, name, packing, unit_price, purchase_price, stock, reorder_level, note, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            code,
            form.name.trim(),
            form.packing.as_deref(),
            form.unit_price,
            purchase_price,
            opening_stock,
            reorder_level,
            form.note.as_deref(),
            now_iso()
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, code, "item registered");
    fetch_item(&conn, id)
}

pub fn update_item(db: &DbState, form: ItemUpdateForm) -> AppResult<Item> {
    let conn = db.lock()?;
    let current = fetch_item(&conn, form.id)?;
    let purchase_price = form.purchase_price.unwrap_or(current.purchase_price);
    validate_fields(&form.code, &form.name, form.unit_price, purchase_price)?;
    let reorder_level = form.reorder_level.unwrap_or(current.reorder_level);
    validate_non_negative(reorder_level, "reorder level")?;

    let code = form.code.trim();
    ensure_code_free(&conn, code, Some(form.id))?;

    conn.execute(
        "UPDATE items SET code = ?, name = ?, packing = ?, unit_price = ?, purchase_price = ?, reorder_level = ?, note = ?
         WHERE id = ?",
        params![
            code,
            form.name.trim(),
            form.packing.as_deref(),
            form.unit_price,
            purchase_price,
            reorder_level,
            form.note.as_deref(),
            form.id
        ],
    )?;
    info!(id = form.id, code, "item updated");
    fetch_item(&conn, form.id)
}

/// Archive the item; invoices that already use it keep their lines.
pub fn delete_item(db: &DbState, item_id: i64) -> AppResult<()> {
    let conn = db.lock()?;
    let changed = conn.execute(
        "UPDATE items SET archived = 1 WHERE id = ?",
        params![item_id],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("item", item_id));
    }
    info!(id = item_id, "item archived");
    Ok(())
}

pub fn list_items(db: &DbState, query: Option<&str>) -> AppResult<Vec<Item>> {
    let conn = db.lock()?;
    let items = fetch_items(&conn)?
        .into_iter()
        .filter(|item| matches_query(query, &[item.code.as_str(), item.name.as_str()]))
        .collect();
    Ok(items)
}

pub fn get_item(db: &DbState, item_id: i64) -> AppResult<Item> {
    let conn = db.lock()?;
    fetch_item(&conn, item_id)
}

const ITEM_COLUMNS: &str = "id, code, name, packing, unit_price, purchase_price, stock, reorder_level, note, archived, created_at";

fn map_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        packing: row.get(3)?,
        unit_price: row.get(4)?,
        purchase_price: row.get(5)?,
        stock: row.get(6)?,
        reorder_level: row.get(7)?,
        note: row.get(8)?,
        archived: row.get::<_, i64>(9)? != 0,
        created_at: row.get(10)?,
    })
}

pub(crate) fn fetch_item(conn: &Connection, item_id: i64) -> AppResult<Item> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"),
        params![item_id],
        map_item,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("item", item_id))
}

/// Active items in name order.
pub(crate) fn fetch_items(conn: &Connection) -> AppResult<Vec<Item>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE archived = 0 ORDER BY name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map([], map_item)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub(crate) fn adjust_stock(conn: &Connection, item_id: i64, delta: f64) -> AppResult<()> {
    conn.execute(
        "UPDATE items SET stock = stock + ? WHERE id = ?",
        params![delta, item_id],
    )?;
    Ok(())
}
