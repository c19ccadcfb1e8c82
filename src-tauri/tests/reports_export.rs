use chrono::NaiveDate;
use medstore_ledger_lib::cash::{save_cash_entry, CashPayload};
use medstore_ledger_lib::counterparties::{balance_of, list_counterparties};
use medstore_ledger_lib::documents::{list_documents, DocumentFilter};
use medstore_ledger_lib::export::{
    document_csv, export_document, items_csv, save_export, ExportFormat, DOCUMENT_COLUMNS,
};
use medstore_ledger_lib::items::list_items;
use medstore_ledger_lib::models::{CashDirection, CashKind, CashMode, CounterpartyKind};
use medstore_ledger_lib::reports::{account_statement, balance_summary, cash_book_summary, stock_report};
use medstore_ledger_lib::snapshot::load_app_data;
use medstore_ledger_lib::vouchers::{save_voucher, VoucherPayload};
use medstore_ledger_lib::{AppConfig, AppError, DbState};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn seeded() -> DbState {
    DbState::initialize(AppConfig::default()).unwrap()
}

fn account_id(db: &DbState, name: &str) -> i64 {
    list_counterparties(db, Some(CounterpartyKind::Account), Some(name))
        .unwrap()
        .into_iter()
        .find(|c| c.name == name)
        .unwrap()
        .id
}

#[test]
fn statements_agree_with_running_balances() {
    let db = seeded();
    let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
    let customers = list_counterparties(&db, Some(CounterpartyKind::Customer), None).unwrap();
    let hospital = customers.iter().find(|c| c.name == "City Hospital").unwrap();

    save_cash_entry(
        &db,
        CashPayload {
            id: None,
            kind: CashKind::Collection,
            date,
            counterparty_id: Some(hospital.id),
            counterparty_name: None,
            mode: CashMode::Cash,
            direction: None,
            amount: 2_000.0,
            narration: None,
        },
    )
    .unwrap();
    let rent = account_id(&db, "Rent");
    let bank = account_id(&db, "Bank");
    save_voucher(
        &db,
        VoucherPayload {
            id: None,
            date,
            debit_account_id: rent,
            credit_account_id: bank,
            amount: 35_000.0,
            narration: Some("February rent".into()),
        },
    )
    .unwrap();

    for counterparty in list_counterparties(&db, None, None).unwrap() {
        let statement = account_statement(&db, counterparty.id, None, None).unwrap();
        assert!(
            close(statement.closing_balance, counterparty.balance),
            "{} statement {} vs balance {}",
            counterparty.name,
            statement.closing_balance,
            counterparty.balance
        );
    }

    let rent_statement = account_statement(&db, rent, None, None).unwrap();
    assert_eq!(rent_statement.lines.len(), 1);
    assert!(rent_statement.lines[0].description.contains("Bank"));
    assert!(close(balance_of(&db, bank).unwrap(), -35_000.0));
}

#[test]
fn summaries_over_seeded_store() {
    let db = seeded();
    let balances = balance_summary(&db, None).unwrap();
    let receivable: f64 = list_counterparties(&db, Some(CounterpartyKind::Customer), None)
        .unwrap()
        .iter()
        .map(|c| c.balance)
        .sum();
    assert!(close(balances.total_receivable, receivable));

    let stock = stock_report(&db, None).unwrap();
    assert_eq!(stock.rows.len(), list_items(&db, None).unwrap().len());
    assert!(stock.rows.iter().any(|row| row.low_stock));

    let cash_book = cash_book_summary(&db, None, None, None).unwrap();
    assert!(close(cash_book.opening, 0.0));
    assert!(close(cash_book.closing, cash_book.total_in - cash_book.total_out));

    save_cash_entry(
        &db,
        CashPayload {
            id: None,
            kind: CashKind::CashBook,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            counterparty_id: None,
            counterparty_name: Some("Utilities".into()),
            mode: CashMode::Cash,
            direction: Some(CashDirection::Out),
            amount: 1_200.0,
            narration: Some("electricity".into()),
        },
    )
    .unwrap();
    let march = cash_book_summary(&db, None, None, Some(CashMode::Cash)).unwrap();
    assert!(close(march.total_out, cash_book.total_out + 1_200.0));
}

#[test]
fn seeded_invoice_exports_in_every_format() {
    let db = seeded();
    let invoice = list_documents(&db, &DocumentFilter::default())
        .unwrap()
        .remove(0);

    let html = export_document(&db, invoice.id, ExportFormat::Html).unwrap();
    assert_eq!(html.filename, format!("{}.html", invoice.number));
    for column in DOCUMENT_COLUMNS {
        assert!(html.content.contains(column));
    }
    assert!(html.content.contains("449.93"));

    let receipt = export_document(&db, invoice.id, ExportFormat::Text).unwrap();
    let width = db.config().print.receipt_width;
    assert!(receipt.content.lines().all(|l| l.chars().count() <= width));

    let csv = document_csv(&invoice).unwrap();
    assert_eq!(csv.lines().count(), 1 + invoice.lines.len());

    let missing = export_document(&db, 999, ExportFormat::Csv).unwrap_err();
    assert!(matches!(missing, AppError::Export(_)));
}

#[test]
fn item_register_saves_as_csv() {
    let db = seeded();
    let data = load_app_data(&db).unwrap();
    let content = items_csv(&data.items).unwrap();
    assert!(content.starts_with("Item Code,Name,Packing,Sale Price"));

    let dir = std::env::temp_dir().join(format!("medstore-items-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = save_export(&dir, "items", ExportFormat::Csv, &content).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    std::fs::remove_dir_all(&dir).unwrap();
}
