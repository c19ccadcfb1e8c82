//! Accounts reports: statements, balances, stock, sales and cash book.

use chrono::NaiveDate;
use serde::Serialize;

use crate::cash::fetch_cash_entries;
use crate::counterparties::{fetch_counterparties, fetch_counterparty};
use crate::db::DbState;
use crate::documents::fetch_documents;
use crate::error::AppResult;
use crate::filter::matches_query;
use crate::items::fetch_items;
use crate::ledger::{BalanceSide, Direction};
use crate::models::{
    CashDirection, CashKind, CashMode, Counterparty, CounterpartyKind, DocumentKind,
};
use crate::vouchers::fetch_vouchers;

#[derive(Debug, Clone, Serialize)]
pub struct StatementLine {
    pub date: NaiveDate,
    pub number: String,
    pub description: String,
    pub debit: f64,
    pub credit: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountStatement {
    pub counterparty: Counterparty,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub opening_balance: f64,
    pub lines: Vec<StatementLine>,
    pub total_debit: f64,
    pub total_credit: f64,
    pub closing_balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceRow {
    pub id: i64,
    pub kind: CounterpartyKind,
    pub name: String,
    pub phone: Option<String>,
    pub side: Option<BalanceSide>,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceSummary {
    pub rows: Vec<BalanceRow>,
    pub total_receivable: f64,
    pub total_payable: f64,
    pub total_accounts: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockRow {
    pub item_id: i64,
    pub code: String,
    pub name: String,
    pub packing: Option<String>,
    pub stock: f64,
    pub purchase_price: f64,
    pub stock_value: f64,
    pub reorder_level: f64,
    pub low_stock: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockReport {
    pub rows: Vec<StockRow>,
    pub total_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KindSummary {
    pub kind: DocumentKind,
    pub count: usize,
    pub gross: f64,
    pub discount: f64,
    pub net: f64,
    pub cash: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashMovement {
    pub date: NaiveDate,
    pub number: String,
    pub description: String,
    pub cash_in: f64,
    pub cash_out: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashBookSummary {
    pub opening: f64,
    pub total_in: f64,
    pub total_out: f64,
    pub closing: f64,
    pub movements: Vec<CashMovement>,
}

/// One dated posting before the running balance is applied.
struct Posting {
    date: NaiveDate,
    entered_at: String,
    number: String,
    description: String,
    debit: f64,
    credit: f64,
}

fn in_range(date: NaiveDate, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    from.map_or(true, |f| date >= f) && to.map_or(true, |t| date <= t)
}

fn with_narration(label: &str, narration: Option<&str>) -> String {
    match narration.map(str::trim).filter(|n| !n.is_empty()) {
        Some(narration) => format!("{label}: {narration}"),
        None => label.to_string(),
    }
}

/// Ledger of one customer, supplier or account. The balance carried into
/// `from` includes the opening balance and every earlier posting.
pub fn account_statement(
    db: &DbState,
    counterparty_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> AppResult<AccountStatement> {
    let conn = db.lock()?;
    let counterparty = fetch_counterparty(&conn, counterparty_id)?;

    let mut postings = Vec::new();
    for doc in fetch_documents(&conn)?
        .into_iter()
        .filter(|d| d.counterparty_id == counterparty_id)
    {
        let (debit, credit) = match doc.kind.direction() {
            Direction::Charge => (doc.totals.net, doc.totals.cash),
            Direction::Reverse => (doc.totals.cash, doc.totals.net),
        };
        postings.push(Posting {
            date: doc.date,
            entered_at: doc.created_at,
            number: doc.number,
            description: doc.kind.title().to_string(),
            debit,
            credit,
        });
    }
    for entry in fetch_cash_entries(&conn)?
        .into_iter()
        .filter(|e| e.counterparty_id == counterparty_id)
    {
        let effect = entry.balance_effect();
        let label = match entry.kind {
            CashKind::Collection => "Collection",
            CashKind::Payment => "Payment",
            CashKind::CashBook => "Cash book",
        };
        postings.push(Posting {
            date: entry.date,
            entered_at: entry.created_at,
            number: entry.number,
            description: with_narration(label, entry.narration.as_deref()),
            debit: effect.max(0.0),
            credit: (-effect).max(0.0),
        });
    }
    for voucher in fetch_vouchers(&conn)? {
        let (debit, credit, other) = if voucher.debit_account_id == counterparty_id {
            (voucher.amount, 0.0, &voucher.credit_account_name)
        } else if voucher.credit_account_id == counterparty_id {
            (0.0, voucher.amount, &voucher.debit_account_name)
        } else {
            continue;
        };
        let label = format!("Journal voucher / {other}");
        postings.push(Posting {
            date: voucher.date,
            entered_at: voucher.created_at.clone(),
            number: voucher.number.clone(),
            description: with_narration(&label, voucher.narration.as_deref()),
            debit,
            credit,
        });
    }
    postings.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.entered_at.cmp(&b.entered_at))
    });

    let (earlier, postings): (Vec<_>, Vec<_>) = postings
        .into_iter()
        .partition(|p| from.map_or(false, |f| p.date < f));
    let opening_balance = counterparty.opening_balance
        + earlier.iter().map(|p| p.debit - p.credit).sum::<f64>();

    let mut lines = Vec::new();
    let mut running = opening_balance;
    let mut total_debit = 0.0;
    let mut total_credit = 0.0;
    for posting in postings.into_iter().filter(|p| in_range(p.date, from, to)) {
        running += posting.debit - posting.credit;
        total_debit += posting.debit;
        total_credit += posting.credit;
        lines.push(StatementLine {
            date: posting.date,
            number: posting.number,
            description: posting.description,
            debit: posting.debit,
            credit: posting.credit,
            balance: running,
        });
    }
    let closing_balance = opening_balance + total_debit - total_credit;

    Ok(AccountStatement {
        counterparty,
        from,
        to,
        opening_balance,
        lines,
        total_debit,
        total_credit,
        closing_balance,
    })
}

pub fn balance_summary(db: &DbState, kind: Option<CounterpartyKind>) -> AppResult<BalanceSummary> {
    let conn = db.lock()?;
    let counterparties = fetch_counterparties(&conn)?;
    Ok(summarize_balances(&counterparties, kind))
}

pub(crate) fn summarize_balances(
    counterparties: &[Counterparty],
    kind: Option<CounterpartyKind>,
) -> BalanceSummary {
    let mut summary = BalanceSummary {
        rows: Vec::new(),
        total_receivable: 0.0,
        total_payable: 0.0,
        total_accounts: 0.0,
    };
    for c in counterparties
        .iter()
        .filter(|c| kind.map_or(true, |k| c.kind == k))
    {
        let side = match c.kind {
            CounterpartyKind::Customer => {
                summary.total_receivable += c.balance;
                Some(BalanceSide::Receivable)
            }
            CounterpartyKind::Supplier => {
                summary.total_payable += c.balance;
                Some(BalanceSide::Payable)
            }
            CounterpartyKind::Account => {
                summary.total_accounts += c.balance;
                None
            }
        };
        summary.rows.push(BalanceRow {
            id: c.id,
            kind: c.kind,
            name: c.name.clone(),
            phone: c.phone.clone(),
            side,
            balance: c.balance,
        });
    }
    summary
}

pub fn stock_report(db: &DbState, query: Option<&str>) -> AppResult<StockReport> {
    let conn = db.lock()?;
    let rows: Vec<StockRow> = fetch_items(&conn)?
        .into_iter()
        .filter(|item| matches_query(query, &[item.code.as_str(), item.name.as_str()]))
        .map(|item| StockRow {
            item_id: item.id,
            stock_value: item.stock * item.purchase_price,
            low_stock: item.stock <= item.reorder_level,
            code: item.code,
            name: item.name,
            packing: item.packing,
            stock: item.stock,
            purchase_price: item.purchase_price,
            reorder_level: item.reorder_level,
        })
        .collect();
    let total_value = rows.iter().map(|row| row.stock_value).sum();
    Ok(StockReport { rows, total_value })
}

pub fn sales_summary(
    db: &DbState,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> AppResult<Vec<KindSummary>> {
    let conn = db.lock()?;
    let docs = fetch_documents(&conn)?;
    let summaries = DocumentKind::ALL
        .iter()
        .map(|&kind| {
            let mut summary = KindSummary {
                kind,
                count: 0,
                gross: 0.0,
                discount: 0.0,
                net: 0.0,
                cash: 0.0,
            };
            for doc in docs
                .iter()
                .filter(|d| d.kind == kind && in_range(d.date, from, to))
            {
                summary.count += 1;
                summary.gross += doc.totals.gross;
                summary.discount += doc.totals.discount;
                summary.net += doc.totals.net;
                summary.cash += doc.totals.cash;
            }
            summary
        })
        .collect();
    Ok(summaries)
}

/// Cash received and paid over a period.
///
/// Collections and cash-in entries count as money in, payments and cash-out
/// entries as money out. Cash taken on invoices counts too: sales and
/// purchase returns bring it in, purchases and sales returns pay it out.
/// Invoice cash is always treated as `Cash` mode.
pub fn cash_book_summary(
    db: &DbState,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    mode: Option<CashMode>,
) -> AppResult<CashBookSummary> {
    let conn = db.lock()?;

    let mut postings = Vec::new();
    for entry in fetch_cash_entries(&conn)?
        .into_iter()
        .filter(|e| mode.map_or(true, |m| e.mode == m))
    {
        let (cash_in, cash_out) = match entry.direction {
            CashDirection::In => (entry.amount, 0.0),
            CashDirection::Out => (0.0, entry.amount),
        };
        postings.push(Posting {
            date: entry.date,
            entered_at: entry.created_at,
            number: entry.number,
            description: with_narration(&entry.counterparty_name, entry.narration.as_deref()),
            debit: cash_in,
            credit: cash_out,
        });
    }
    if mode.map_or(true, |m| m == CashMode::Cash) {
        for doc in fetch_documents(&conn)?
            .into_iter()
            .filter(|d| d.totals.cash > 0.0)
        {
            let (cash_in, cash_out) = match doc.kind {
                DocumentKind::Sale | DocumentKind::PurchaseReturn => (doc.totals.cash, 0.0),
                DocumentKind::Purchase | DocumentKind::SalesReturn => (0.0, doc.totals.cash),
            };
            postings.push(Posting {
                date: doc.date,
                entered_at: doc.created_at,
                number: doc.number,
                description: format!("{} / {}", doc.kind.title(), doc.counterparty_name),
                debit: cash_in,
                credit: cash_out,
            });
        }
    }
    postings.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.entered_at.cmp(&b.entered_at))
    });

    let mut opening = 0.0;
    let mut total_in = 0.0;
    let mut total_out = 0.0;
    let mut movements = Vec::new();
    for posting in postings {
        if from.map_or(false, |f| posting.date < f) {
            opening += posting.debit - posting.credit;
            continue;
        }
        if !in_range(posting.date, from, to) {
            continue;
        }
        total_in += posting.debit;
        total_out += posting.credit;
        movements.push(CashMovement {
            date: posting.date,
            number: posting.number,
            description: posting.description,
            cash_in: posting.debit,
            cash_out: posting.credit,
            balance: opening + total_in - total_out,
        });
    }

    Ok(CashBookSummary {
        opening,
        total_in,
        total_out,
        closing: opening + total_in - total_out,
        movements,
    })
}
