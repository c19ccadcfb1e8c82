pub mod cash;
#[cfg(feature = "desktop")]
mod commands;
pub mod config;
pub mod counterparties;
pub mod db;
pub mod documents;
pub mod error;
pub mod export;
mod filter;
pub mod items;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod reports;
mod seed;
pub mod sequence;
pub mod snapshot;
pub mod vouchers;

pub use config::AppConfig;
pub use db::DbState;
pub use error::{AppError, AppResult};

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::Manager;

    let config = match config::load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}; using built-in defaults");
            AppConfig::default()
        }
    };
    logging::init(&config.logging);
    tracing::info!(company = %config.company.name, "starting medstore ledger");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(move |app| {
            let state = DbState::initialize(config)?;
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_app_data,
            commands::create_item,
            commands::update_item,
            commands::delete_item,
            commands::create_counterparty,
            commands::update_counterparty,
            commands::delete_counterparty,
            commands::new_document_form,
            commands::edit_document_form,
            commands::preview_document,
            commands::save_document,
            commands::delete_document,
            commands::list_documents,
            commands::new_cash_form,
            commands::edit_cash_form,
            commands::save_cash_entry,
            commands::delete_cash_entry,
            commands::list_cash_entries,
            commands::next_voucher_number,
            commands::save_voucher,
            commands::delete_voucher,
            commands::list_vouchers,
            commands::account_statement,
            commands::balance_summary,
            commands::stock_report,
            commands::sales_summary,
            commands::cash_book_summary,
            commands::export_document,
            commands::save_document_export,
            commands::save_items_csv
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
