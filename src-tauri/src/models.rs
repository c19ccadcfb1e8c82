use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ledger::{BalanceSide, Direction, Totals};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CounterpartyKind {
    Customer,
    Supplier,
    Account,
}

impl CounterpartyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterpartyKind::Customer => "CUSTOMER",
            CounterpartyKind::Supplier => "SUPPLIER",
            CounterpartyKind::Account => "ACCOUNT",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "CUSTOMER" => Some(CounterpartyKind::Customer),
            "SUPPLIER" => Some(CounterpartyKind::Supplier),
            "ACCOUNT" => Some(CounterpartyKind::Account),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CounterpartyKind::Customer => "customer",
            CounterpartyKind::Supplier => "supplier",
            CounterpartyKind::Account => "account",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            CounterpartyKind::Customer => "Customer",
            CounterpartyKind::Supplier => "Supplier",
            CounterpartyKind::Account => "Account",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    Sale,
    Purchase,
    SalesReturn,
    PurchaseReturn,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Sale,
        DocumentKind::Purchase,
        DocumentKind::SalesReturn,
        DocumentKind::PurchaseReturn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Sale => "SALE",
            DocumentKind::Purchase => "PURCHASE",
            DocumentKind::SalesReturn => "SALES_RETURN",
            DocumentKind::PurchaseReturn => "PURCHASE_RETURN",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "SALE" => Some(DocumentKind::Sale),
            "PURCHASE" => Some(DocumentKind::Purchase),
            "SALES_RETURN" => Some(DocumentKind::SalesReturn),
            "PURCHASE_RETURN" => Some(DocumentKind::PurchaseReturn),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DocumentKind::Sale => "Sales Invoice",
            DocumentKind::Purchase => "Purchase Invoice",
            DocumentKind::SalesReturn => "Sales Return",
            DocumentKind::PurchaseReturn => "Purchase Return",
        }
    }

    pub fn counterparty_kind(&self) -> CounterpartyKind {
        match self {
            DocumentKind::Sale | DocumentKind::SalesReturn => CounterpartyKind::Customer,
            DocumentKind::Purchase | DocumentKind::PurchaseReturn => CounterpartyKind::Supplier,
        }
    }

    pub fn balance_side(&self) -> BalanceSide {
        match self.counterparty_kind() {
            CounterpartyKind::Supplier => BalanceSide::Payable,
            _ => BalanceSide::Receivable,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            DocumentKind::Sale | DocumentKind::Purchase => Direction::Charge,
            DocumentKind::SalesReturn | DocumentKind::PurchaseReturn => Direction::Reverse,
        }
    }

    /// Only sales invoices carry per-line discounts.
    pub fn applies_line_discount(&self) -> bool {
        matches!(self, DocumentKind::Sale)
    }

    /// +1 when the document brings goods in, -1 when it sends them out.
    pub fn stock_sign(&self) -> f64 {
        match self {
            DocumentKind::Purchase | DocumentKind::SalesReturn => 1.0,
            DocumentKind::Sale | DocumentKind::PurchaseReturn => -1.0,
        }
    }

    /// Unit price used when the line leaves it empty.
    pub fn default_price(&self, item: &Item) -> f64 {
        match self {
            DocumentKind::Sale | DocumentKind::SalesReturn => item.unit_price,
            DocumentKind::Purchase | DocumentKind::PurchaseReturn => item.purchase_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashKind {
    /// Cash/bank receipt from a customer.
    Collection,
    /// Cash/bank payment to a supplier.
    Payment,
    CashBook,
}

impl CashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashKind::Collection => "COLLECTION",
            CashKind::Payment => "PAYMENT",
            CashKind::CashBook => "CASH_BOOK",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "COLLECTION" => Some(CashKind::Collection),
            "PAYMENT" => Some(CashKind::Payment),
            "CASH_BOOK" => Some(CashKind::CashBook),
            _ => None,
        }
    }

    pub fn counterparty_kind(&self) -> Option<CounterpartyKind> {
        match self {
            CashKind::Collection => Some(CounterpartyKind::Customer),
            CashKind::Payment => Some(CounterpartyKind::Supplier),
            CashKind::CashBook => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashMode {
    Cash,
    Bank,
}

impl CashMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashMode::Cash => "CASH",
            CashMode::Bank => "BANK",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "CASH" => Some(CashMode::Cash),
            "BANK" => Some(CashMode::Bank),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashDirection {
    In,
    Out,
}

impl CashDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashDirection::In => "IN",
            CashDirection::Out => "OUT",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "IN" => Some(CashDirection::In),
            "OUT" => Some(CashDirection::Out),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub packing: Option<String>,
    pub unit_price: f64,
    pub purchase_price: f64,
    pub stock: f64,
    pub reorder_level: f64,
    pub note: Option<String>,
    pub archived: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Counterparty {
    pub id: i64,
    pub kind: CounterpartyKind,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub opening_balance: f64,
    pub balance: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentLine {
    pub id: i64,
    pub position: i64,
    pub item_id: i64,
    pub item_code: String,
    pub item_name: String,
    pub packing: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub bonus: f64,
    pub discount_pct: f64,
    pub gross: f64,
    pub discount: f64,
    pub net: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub kind: DocumentKind,
    pub number: String,
    pub date: NaiveDate,
    pub counterparty_id: i64,
    pub counterparty_name: String,
    pub totals: Totals,
    pub note: Option<String>,
    pub lines: Vec<DocumentLine>,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn balance_effect(&self) -> f64 {
        self.totals.balance_effect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CashEntry {
    pub id: i64,
    pub kind: CashKind,
    pub number: String,
    pub date: NaiveDate,
    pub counterparty_id: i64,
    pub counterparty_name: String,
    pub mode: CashMode,
    pub direction: CashDirection,
    pub amount: f64,
    pub previous_balance: f64,
    pub final_balance: f64,
    pub narration: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl CashEntry {
    pub fn balance_effect(&self) -> f64 {
        self.final_balance - self.previous_balance
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Voucher {
    pub id: i64,
    pub number: String,
    pub date: NaiveDate,
    pub debit_account_id: i64,
    pub debit_account_name: String,
    pub credit_account_id: i64,
    pub credit_account_name: String,
    pub amount: f64,
    pub narration: Option<String>,
    pub created_at: String,
}

/// Whether a page form was opened with "New" or "Edit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormMode {
    New,
    Edit,
}
