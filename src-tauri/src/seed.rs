//! Mock fixtures loaded into a fresh store.

use chrono::NaiveDate;
use tracing::info;

use crate::counterparties::{create_counterparty, CounterpartyForm};
use crate::db::DbState;
use crate::documents::{save_document, DocumentPayload, LinePayload};
use crate::error::{AppError, AppResult};
use crate::items::{create_item, ItemForm};
use crate::models::{CounterpartyKind, DocumentKind};

// code, name, packing, sale price, purchase price, stock, reorder level
const ITEMS: &[(&str, &str, &str, f64, f64, f64, f64)] = &[
    ("MED-001", "Panadol 500mg", "10x10 tabs", 45.99, 38.50, 240.0, 50.0),
    ("MED-002", "Augmentin 625mg", "2x7 tabs", 89.99, 76.00, 120.0, 30.0),
    ("MED-003", "Brufen 400mg", "10x10 tabs", 32.50, 27.00, 180.0, 40.0),
    ("MED-004", "Insulin Syringe 1ml", "100 pcs", 1_250.00, 1_080.00, 25.0, 10.0),
    ("MED-005", "Surgical Gloves (M)", "100 pcs", 950.00, 810.00, 40.0, 15.0),
    ("MED-006", "ORS Sachet", "20 sachets", 160.00, 132.00, 8.0, 20.0),
];

const CUSTOMERS: &[(&str, &str, &str, f64)] = &[
    ("City Hospital", "0300-1234567", "Main Boulevard", 12_500.0),
    ("Care Pharmacy", "0321-7654321", "Mall Road", 0.0),
    ("Walk-in Customer", "", "", 0.0),
];

const SUPPLIERS: &[(&str, &str, &str, f64)] = &[
    ("Getz Pharma Distributors", "042-111-222", "Industrial Area", 48_000.0),
    ("MediSupply Traders", "042-333-444", "Circular Road", 0.0),
];

const ACCOUNTS: &[&str] = &["Cash in Hand", "Bank", "Rent", "Salaries", "Utilities"];

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

pub fn load_mock_data(db: &DbState) -> AppResult<()> {
    let mut item_ids = Vec::with_capacity(ITEMS.len());
    for &(code, name, packing, unit_price, purchase_price, stock, reorder_level) in ITEMS {
        let item = create_item(
            db,
            ItemForm {
                code: code.into(),
                name: name.into(),
                packing: optional(packing),
                unit_price,
                purchase_price: Some(purchase_price),
                opening_stock: Some(stock),
                reorder_level: Some(reorder_level),
                note: None,
            },
        )?;
        item_ids.push(item.id);
    }

    let parties = CUSTOMERS
        .iter()
        .map(|p| (CounterpartyKind::Customer, p))
        .chain(SUPPLIERS.iter().map(|p| (CounterpartyKind::Supplier, p)));
    let mut first_customer = None;
    for (kind, &(name, phone, address, opening)) in parties {
        let created = create_counterparty(
            db,
            CounterpartyForm {
                kind,
                name: name.into(),
                phone: optional(phone),
                address: optional(address),
                opening_balance: Some(opening),
            },
        )?;
        if kind == CounterpartyKind::Customer && first_customer.is_none() {
            first_customer = Some(created.id);
        }
    }
    for &name in ACCOUNTS {
        create_counterparty(
            db,
            CounterpartyForm {
                kind: CounterpartyKind::Account,
                name: name.into(),
                phone: None,
                address: None,
                opening_balance: None,
            },
        )?;
    }

    let date = NaiveDate::from_ymd_opt(2024, 1, 15)
        .ok_or_else(|| AppError::Config("invalid fixture date".to_string()))?;
    let line = |index: usize, quantity: f64| LinePayload {
        item_id: item_ids[index],
        quantity,
        unit_price: None,
        bonus: None,
        discount_pct: None,
    };
    save_document(
        db,
        DocumentPayload {
            id: None,
            kind: DocumentKind::Sale,
            date,
            counterparty_id: first_customer,
            counterparty_name: None,
            discount_pct: 10.0,
            cash: 0.0,
            lines: vec![line(0, 5.0), line(1, 3.0)],
            note: Some("opening sample invoice".into()),
        },
    )?;

    info!(
        items = ITEMS.len(),
        customers = CUSTOMERS.len(),
        suppliers = SUPPLIERS.len(),
        accounts = ACCOUNTS.len(),
        "mock data loaded"
    );
    Ok(())
}
