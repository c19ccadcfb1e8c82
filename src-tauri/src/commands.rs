use std::path::PathBuf;

use chrono::NaiveDate;
use tauri::{Manager, State};
use tracing::debug;

use crate::cash::{self, CashDraft, CashFilter, CashPayload};
use crate::counterparties::{self, CounterpartyForm, CounterpartyUpdateForm};
use crate::db::DbState;
use crate::documents::{self, DocumentDraft, DocumentFilter, DocumentPayload};
use crate::error::AppError;
use crate::export::{self, ExportFile, ExportFormat};
use crate::items::{self, ItemForm, ItemUpdateForm};
use crate::ledger::Totals;
use crate::models::{CashEntry, CashKind, CashMode, CounterpartyKind, Document, DocumentKind, Voucher};
use crate::reports::{
    self, AccountStatement, BalanceSummary, CashBookSummary, KindSummary, StockReport,
};
use crate::snapshot::{load_app_data, AppData};
use crate::vouchers::{self, VoucherPayload};

type CommandResult<T> = Result<T, String>;

#[tauri::command]
pub fn get_app_data(state: State<DbState>) -> CommandResult<AppData> {
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn create_item(state: State<DbState>, payload: ItemForm) -> CommandResult<AppData> {
    debug!(code = %payload.code, "create_item");
    items::create_item(&state, payload)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn update_item(state: State<DbState>, payload: ItemUpdateForm) -> CommandResult<AppData> {
    debug!(id = payload.id, "update_item");
    items::update_item(&state, payload)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn delete_item(state: State<DbState>, item_id: i64) -> CommandResult<AppData> {
    debug!(id = item_id, "delete_item");
    items::delete_item(&state, item_id)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn create_counterparty(state: State<DbState>, payload: CounterpartyForm) -> CommandResult<AppData> {
    debug!(kind = payload.kind.as_str(), "create_counterparty");
    counterparties::create_counterparty(&state, payload)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn update_counterparty(
    state: State<DbState>,
    payload: CounterpartyUpdateForm,
) -> CommandResult<AppData> {
    debug!(id = payload.id, "update_counterparty");
    counterparties::update_counterparty(&state, payload)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn delete_counterparty(state: State<DbState>, counterparty_id: i64) -> CommandResult<AppData> {
    debug!(id = counterparty_id, "delete_counterparty");
    counterparties::delete_counterparty(&state, counterparty_id)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn new_document_form(
    state: State<DbState>,
    kind: DocumentKind,
    date: NaiveDate,
) -> CommandResult<DocumentDraft> {
    documents::new_document_form(&state, kind, date).map_err(Into::into)
}

#[tauri::command]
pub fn edit_document_form(state: State<DbState>, document_id: i64) -> CommandResult<DocumentDraft> {
    documents::edit_document_form(&state, document_id).map_err(Into::into)
}

#[tauri::command]
pub fn preview_document(state: State<DbState>, payload: DocumentPayload) -> CommandResult<Totals> {
    documents::preview_document(&state, &payload).map_err(Into::into)
}

#[tauri::command]
pub fn save_document(state: State<DbState>, payload: DocumentPayload) -> CommandResult<AppData> {
    debug!(kind = payload.kind.as_str(), id = ?payload.id, "save_document");
    documents::save_document(&state, payload)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn delete_document(state: State<DbState>, document_id: i64) -> CommandResult<AppData> {
    debug!(id = document_id, "delete_document");
    documents::delete_document(&state, document_id)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn list_documents(state: State<DbState>, filter: Option<DocumentFilter>) -> CommandResult<Vec<Document>> {
    documents::list_documents(&state, &filter.unwrap_or_default()).map_err(Into::into)
}

#[tauri::command]
pub fn new_cash_form(state: State<DbState>, kind: CashKind, date: NaiveDate) -> CommandResult<CashDraft> {
    cash::new_cash_form(&state, kind, date).map_err(Into::into)
}

#[tauri::command]
pub fn edit_cash_form(state: State<DbState>, entry_id: i64) -> CommandResult<CashDraft> {
    cash::edit_cash_form(&state, entry_id).map_err(Into::into)
}

#[tauri::command]
pub fn save_cash_entry(state: State<DbState>, payload: CashPayload) -> CommandResult<AppData> {
    debug!(kind = payload.kind.as_str(), id = ?payload.id, "save_cash_entry");
    cash::save_cash_entry(&state, payload)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn delete_cash_entry(state: State<DbState>, entry_id: i64) -> CommandResult<AppData> {
    debug!(id = entry_id, "delete_cash_entry");
    cash::delete_cash_entry(&state, entry_id)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn list_cash_entries(state: State<DbState>, filter: Option<CashFilter>) -> CommandResult<Vec<CashEntry>> {
    cash::list_cash_entries(&state, &filter.unwrap_or_default()).map_err(Into::into)
}

#[tauri::command]
pub fn next_voucher_number(state: State<DbState>, date: NaiveDate) -> CommandResult<String> {
    vouchers::next_voucher_number(&state, date).map_err(Into::into)
}

#[tauri::command]
pub fn save_voucher(state: State<DbState>, payload: VoucherPayload) -> CommandResult<AppData> {
    debug!(id = ?payload.id, "save_voucher");
    vouchers::save_voucher(&state, payload)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn delete_voucher(state: State<DbState>, voucher_id: i64, confirmed: bool) -> CommandResult<AppData> {
    debug!(id = voucher_id, confirmed, "delete_voucher");
    vouchers::delete_voucher(&state, voucher_id, confirmed)?;
    load_app_data(&state).map_err(Into::into)
}

#[tauri::command]
pub fn list_vouchers(state: State<DbState>, query: Option<String>) -> CommandResult<Vec<Voucher>> {
    vouchers::list_vouchers(&state, query.as_deref()).map_err(Into::into)
}

#[tauri::command]
pub fn account_statement(
    state: State<DbState>,
    counterparty_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> CommandResult<AccountStatement> {
    reports::account_statement(&state, counterparty_id, from, to).map_err(Into::into)
}

#[tauri::command]
pub fn balance_summary(state: State<DbState>, kind: Option<CounterpartyKind>) -> CommandResult<BalanceSummary> {
    reports::balance_summary(&state, kind).map_err(Into::into)
}

#[tauri::command]
pub fn stock_report(state: State<DbState>, query: Option<String>) -> CommandResult<StockReport> {
    reports::stock_report(&state, query.as_deref()).map_err(Into::into)
}

#[tauri::command]
pub fn sales_summary(
    state: State<DbState>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> CommandResult<Vec<KindSummary>> {
    reports::sales_summary(&state, from, to).map_err(Into::into)
}

#[tauri::command]
pub fn cash_book_summary(
    state: State<DbState>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    mode: Option<CashMode>,
) -> CommandResult<CashBookSummary> {
    reports::cash_book_summary(&state, from, to, mode).map_err(Into::into)
}

/// Rendered document for the webview to print or save as PDF.
#[tauri::command]
pub fn export_document(
    state: State<DbState>,
    document_id: i64,
    format: ExportFormat,
) -> CommandResult<ExportFile> {
    export::export_document(&state, document_id, format).map_err(Into::into)
}

#[tauri::command]
pub fn save_document_export(
    app: tauri::AppHandle,
    state: State<DbState>,
    document_id: i64,
    format: ExportFormat,
) -> CommandResult<String> {
    let file = export::export_document(&state, document_id, format)?;
    let dir = export_dir(&app)?;
    let path = export::save_export(&dir, &file.filename, format, &file.content)?;
    Ok(display_path(path))
}

#[tauri::command]
pub fn save_items_csv(
    app: tauri::AppHandle,
    state: State<DbState>,
    filename: String,
) -> CommandResult<String> {
    let items = items::list_items(&state, None)?;
    let content = export::items_csv(&items)?;
    let dir = export_dir(&app)?;
    let path = export::save_export(&dir, &filename, ExportFormat::Csv, &content)?;
    Ok(display_path(path))
}

/// Desktop directory, or the app's local data directory when there is none.
fn export_dir(app: &tauri::AppHandle) -> Result<PathBuf, AppError> {
    match app.path().desktop_dir() {
        Ok(dir) => Ok(dir),
        Err(_) => app
            .path()
            .app_local_data_dir()
            .map_err(|e| AppError::Config(format!("failed to resolve app data dir: {e}"))),
    }
}

fn display_path(path: PathBuf) -> String {
    path.to_str()
        .map(|s| s.to_string())
        .unwrap_or_else(|| String::from("saved"))
}
