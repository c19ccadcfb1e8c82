use chrono::NaiveDate;
use medstore_ledger_lib::cash::{list_cash_entries, save_cash_entry, CashFilter, CashPayload};
use medstore_ledger_lib::counterparties::{balance_of, create_counterparty, CounterpartyForm};
use medstore_ledger_lib::documents::{
    delete_document, edit_document_form, list_documents, new_document_form, save_document,
    DocumentFilter, DocumentPayload,
};
use medstore_ledger_lib::items::{create_item, get_item, ItemForm};
use medstore_ledger_lib::models::{CashKind, CashMode, CounterpartyKind, DocumentKind, FormMode};
use medstore_ledger_lib::{AppConfig, AppError, DbState};
use serde_json::json;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

struct Store {
    db: DbState,
    panadol: i64,
    augmentin: i64,
    hospital: i64,
    supplier: i64,
}

fn store() -> Store {
    let db = DbState::in_memory(AppConfig::default()).unwrap();
    let item = |code: &str, name: &str, price: f64, cost: f64| {
        create_item(
            &db,
            ItemForm {
                code: code.into(),
                name: name.into(),
                packing: Some("10x10".into()),
                unit_price: price,
                purchase_price: Some(cost),
                opening_stock: Some(100.0),
                reorder_level: Some(10.0),
                note: None,
            },
        )
        .unwrap()
        .id
    };
    let panadol = item("MED-001", "Panadol 500mg", 45.99, 38.0);
    let augmentin = item("MED-002", "Augmentin 625mg", 89.99, 75.0);
    let party = |kind: CounterpartyKind, name: &str, opening: f64| {
        create_counterparty(
            &db,
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
    };
    let hospital = party(CounterpartyKind::Customer, "City Hospital", 100.0);
    let supplier = party(CounterpartyKind::Supplier, "Getz Pharma Distributors", 0.0);
    Store {
        db,
        panadol,
        augmentin,
        hospital,
        supplier,
    }
}

/// The pages post their forms as JSON.
fn sale_from_page(store: &Store, cash: f64) -> DocumentPayload {
    serde_json::from_value(json!({
        "id": null,
        "kind": "SALE",
        "date": "2024-01-15",
        "counterparty_id": null,
        "counterparty_name": "city hospital",
        "discount_pct": 10.0,
        "cash": cash,
        "lines": [
            { "item_id": store.panadol, "quantity": 5.0 },
            { "item_id": store.augmentin, "quantity": 3.0, "bonus": 1.0 }
        ],
        "note": null
    }))
    .unwrap()
}

#[test]
fn sales_invoice_new_edit_delete_cycle() {
    let s = store();

    let draft = new_document_form(&s.db, DocumentKind::Sale, date(15)).unwrap();
    assert_eq!(draft.mode, FormMode::New);
    assert_eq!(draft.number, "INV-2024-0001");

    let invoice = save_document(&s.db, sale_from_page(&s, 200.0)).unwrap();
    assert_eq!(invoice.number, draft.number);
    assert!(close(invoice.totals.gross, 499.92));
    assert!(close(invoice.totals.discount, 49.992));
    assert!(close(invoice.totals.net, 449.928));
    assert!(close(invoice.totals.previous_balance, 100.0));
    assert!(close(invoice.totals.final_balance, 349.928));
    assert!(close(balance_of(&s.db, s.hospital).unwrap(), 349.928));
    assert!(close(get_item(&s.db, s.panadol).unwrap().stock, 95.0));
    assert!(close(get_item(&s.db, s.augmentin).unwrap().stock, 96.0));

    let second = save_document(&s.db, sale_from_page(&s, 0.0)).unwrap();
    assert_eq!(second.number, "INV-2024-0002");

    let mut edit = edit_document_form(&s.db, invoice.id).unwrap();
    assert_eq!(edit.mode, FormMode::Edit);
    edit.payload.lines.truncate(1);
    edit.payload.cash = 0.0;
    let updated = save_document(&s.db, edit.payload).unwrap();
    assert_eq!(updated.id, invoice.id);
    assert_eq!(updated.number, invoice.number);
    assert!(close(get_item(&s.db, s.augmentin).unwrap().stock, 96.0));

    let listed = list_documents(&s.db, &DocumentFilter::default()).unwrap();
    let ids: Vec<i64> = listed.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![invoice.id, second.id]);

    delete_document(&s.db, invoice.id).unwrap();
    let listed = list_documents(&s.db, &DocumentFilter::default()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, second.id);
    assert!(close(
        balance_of(&s.db, s.hospital).unwrap(),
        100.0 + second.totals.net
    ));
}

#[test]
fn purchase_then_payment_settles_supplier() {
    let s = store();
    let purchase: DocumentPayload = serde_json::from_value(json!({
        "kind": "PURCHASE",
        "date": "2024-01-10",
        "counterparty_id": s.supplier,
        "lines": [{ "item_id": s.panadol, "quantity": 20.0 }]
    }))
    .unwrap();
    let purchase = save_document(&s.db, purchase).unwrap();
    assert_eq!(purchase.number, "PUR-2024-0001");
    assert!(close(purchase.totals.net, 760.0));
    assert!(close(get_item(&s.db, s.panadol).unwrap().stock, 120.0));

    let payment = save_cash_entry(
        &s.db,
        CashPayload {
            id: None,
            kind: CashKind::Payment,
            date: date(20),
            counterparty_id: Some(s.supplier),
            counterparty_name: None,
            mode: CashMode::Bank,
            direction: None,
            amount: 500.0,
            narration: Some("cheque 1182".into()),
        },
    )
    .unwrap();
    assert!(close(payment.previous_balance, 760.0));
    assert!(close(payment.final_balance, 260.0));
    assert!(close(balance_of(&s.db, s.supplier).unwrap(), 260.0));

    let banked = list_cash_entries(
        &s.db,
        &CashFilter {
            mode: Some(CashMode::Bank),
            ..CashFilter::default()
        },
    )
    .unwrap();
    assert_eq!(banked.len(), 1);
}

#[test]
fn sales_return_reduces_receivable_and_restocks() {
    let s = store();
    save_document(&s.db, sale_from_page(&s, 0.0)).unwrap();
    let before = balance_of(&s.db, s.hospital).unwrap();

    let returned: DocumentPayload = serde_json::from_value(json!({
        "kind": "SALES_RETURN",
        "date": "2024-01-18",
        "counterparty_id": s.hospital,
        "lines": [{ "item_id": s.panadol, "quantity": 2.0 }]
    }))
    .unwrap();
    let returned = save_document(&s.db, returned).unwrap();
    assert_eq!(returned.number, "SRT-2024-0001");
    assert!(close(returned.totals.final_balance, before - 91.98));
    assert!(close(get_item(&s.db, s.panadol).unwrap().stock, 97.0));
}

#[test]
fn rejected_forms_leave_store_untouched() {
    let s = store();
    let mut no_party = sale_from_page(&s, 0.0);
    no_party.counterparty_name = None;
    let err = save_document(&s.db, no_party).unwrap_err();
    assert!(err.is_validation());

    let mut bad_qty = sale_from_page(&s, 0.0);
    bad_qty.lines[1].quantity = 0.0;
    assert!(save_document(&s.db, bad_qty).unwrap_err().is_validation());

    let mut wrong_side = sale_from_page(&s, 0.0);
    wrong_side.counterparty_name = Some("Getz Pharma Distributors".into());
    assert!(save_document(&s.db, wrong_side).unwrap_err().is_validation());

    assert!(list_documents(&s.db, &DocumentFilter::default()).unwrap().is_empty());
    assert!(close(balance_of(&s.db, s.hospital).unwrap(), 100.0));
    assert!(close(get_item(&s.db, s.panadol).unwrap().stock, 100.0));
    let next = new_document_form(&s.db, DocumentKind::Sale, date(15)).unwrap();
    assert_eq!(next.number, "INV-2024-0001");
}

#[test]
fn missing_document_is_not_found() {
    let s = store();
    assert!(matches!(
        delete_document(&s.db, 42),
        Err(AppError::NotFound(_))
    ));
}
