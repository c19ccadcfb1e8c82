//! Printable and CSV renditions of documents and the item register.
//!
//! Every document prints with the same column layout:
//! `Item Code | Name | Packing | Qty | Price | Bonus | Gross | Discount | Net`.
//! Amounts are rounded to two decimals here and nowhere else.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::CompanyConfig;
use crate::db::DbState;
use crate::documents::get_document;
use crate::error::{AppError, AppResult};
use crate::ledger::format_money;
use crate::models::{Document, Item};

pub const DOCUMENT_COLUMNS: [&str; 9] = [
    "Item Code",
    "Name",
    "Packing",
    "Qty",
    "Price",
    "Bonus",
    "Gross",
    "Discount",
    "Net",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Printable page; the webview prints it or saves it as PDF.
    Html,
    Csv,
    /// Fixed-width thermal receipt.
    Text,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Csv => "csv",
            ExportFormat::Text => "txt",
        }
    }
}

/// One printed row, already formatted for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRow {
    #[serde(rename = "Item Code")]
    pub item_code: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Packing")]
    pub packing: String,
    #[serde(rename = "Qty")]
    pub quantity: String,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Bonus")]
    pub bonus: String,
    #[serde(rename = "Gross")]
    pub gross: String,
    #[serde(rename = "Discount")]
    pub discount: String,
    #[serde(rename = "Net")]
    pub net: String,
}

impl DocumentRow {
    fn cells(&self) -> [&str; 9] {
        [
            self.item_code.as_str(),
            self.name.as_str(),
            self.packing.as_str(),
            self.quantity.as_str(),
            self.price.as_str(),
            self.bonus.as_str(),
            self.gross.as_str(),
            self.discount.as_str(),
            self.net.as_str(),
        ]
    }
}

#[derive(Debug, Serialize)]
struct ItemRow<'a> {
    #[serde(rename = "Item Code")]
    code: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Packing")]
    packing: &'a str,
    #[serde(rename = "Sale Price")]
    unit_price: String,
    #[serde(rename = "Purchase Price")]
    purchase_price: String,
    #[serde(rename = "Stock")]
    stock: String,
    #[serde(rename = "Reorder Level")]
    reorder_level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportFile {
    pub filename: String,
    pub content: String,
}

/// Quantities print without a fraction when they are whole.
pub fn format_quantity(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        let text = format!("{value:.3}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub fn document_rows(document: &Document) -> Vec<DocumentRow> {
    document
        .lines
        .iter()
        .map(|line| DocumentRow {
            item_code: line.item_code.clone(),
            name: line.item_name.clone(),
            packing: line.packing.clone().unwrap_or_default(),
            quantity: format_quantity(line.quantity),
            price: format_money(line.unit_price),
            bonus: format_quantity(line.bonus),
            gross: format_money(line.gross),
            discount: format_money(line.discount),
            net: format_money(line.net),
        })
        .collect()
}

/// Label and amount pairs printed under the line table.
fn summary_lines(document: &Document) -> Vec<(String, String)> {
    let totals = &document.totals;
    let mut lines = vec![("Gross".to_string(), format_money(totals.gross))];
    if totals.line_discount != 0.0 {
        lines.push((
            "Line discount".to_string(),
            format_money(totals.line_discount),
        ));
    }
    lines.push((
        format!("Discount {}%", format_quantity(totals.discount_pct)),
        format_money(totals.invoice_discount),
    ));
    lines.push(("Net".to_string(), format_money(totals.net)));
    let side = document.kind.balance_side().label();
    lines.push((
        format!("Previous {side}"),
        format_money(totals.previous_balance),
    ));
    lines.push(("Cash".to_string(), format_money(totals.cash)));
    lines.push((format!("Final {side}"), format_money(totals.final_balance)));
    lines
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn optional_line(value: &str, prefix: &str) -> String {
    if value.trim().is_empty() {
        String::new()
    } else {
        format!("{prefix}{}<br/>", escape_html(value))
    }
}

pub fn render_document_html(document: &Document, company: &CompanyConfig) -> String {
    let header_cells: String = DOCUMENT_COLUMNS
        .iter()
        .map(|c| format!("<th>{c}</th>"))
        .collect();
    let body_rows: String = document_rows(document)
        .iter()
        .map(|row| {
            let cells: String = row
                .cells()
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let class = if i >= 3 { " class=\"num\"" } else { "" };
                    format!("<td{class}>{}</td>", escape_html(cell))
                })
                .collect();
            format!("<tr>{cells}</tr>\n")
        })
        .collect();
    let summary: String = summary_lines(document)
        .iter()
        .map(|(label, amount)| {
            format!("<tr><td>{label}</td><td class=\"num\">{amount}</td></tr>\n")
        })
        .collect();
    let note = document
        .note
        .as_deref()
        .map(|n| optional_line(n, "Note: "))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8"/>
<title>{number}</title>
<style>
body {{ font-family: sans-serif; font-size: 12px; margin: 24px; }}
table {{ width: 100%; border-collapse: collapse; }}
th, td {{ border: 1px solid #999; padding: 4px 6px; }}
td.num {{ text-align: right; }}
.summary {{ width: 40%; margin-left: auto; margin-top: 12px; }}
@media print {{ body {{ margin: 0; }} }}
</style>
</head>
<body>
<div style="text-align:center;">
<strong style="font-size:16px;">{company_name}</strong><br/>
{address}{phone}{header}</div>
<hr/>
<h2 style="text-align:center;">{title}</h2>
<div>
No: {number}<br/>
Date: {date}<br/>
{party_label}: {party}<br/>
{note}</div>
<table>
<tr>{header_cells}</tr>
{body_rows}</table>
<table class="summary">
{summary}</table>
<hr/>
<div style="text-align:center;">{footer}</div>
</body>
</html>
"#,
        number = escape_html(&document.number),
        company_name = escape_html(&company.name),
        address = optional_line(&company.address, ""),
        phone = optional_line(&company.phone, "Tel: "),
        header = optional_line(&company.header_text, ""),
        title = document.kind.title(),
        date = document.date.format("%d-%m-%Y"),
        party_label = document.kind.counterparty_kind().title(),
        party = escape_html(&document.counterparty_name),
        footer = escape_html(&company.footer_text),
    )
}

fn centered(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }
    format!("{}{text}", " ".repeat((width - len) / 2))
}

/// Left text and right-aligned amount on one line, truncating the left side.
fn two_columns(left: &str, right: &str, width: usize) -> String {
    let right_len = right.chars().count();
    let room = width.saturating_sub(right_len + 1);
    let left: String = left.chars().take(room).collect();
    let gap = width.saturating_sub(left.chars().count() + right_len).max(1);
    format!("{left}{}{right}", " ".repeat(gap))
}

pub fn render_thermal_receipt(document: &Document, company: &CompanyConfig, width: usize) -> String {
    let width = width.max(24);
    let rule = "-".repeat(width);
    let mut out = Vec::new();

    out.push(centered(&company.name, width));
    for extra in [&company.address, &company.phone, &company.header_text] {
        if !extra.trim().is_empty() {
            out.push(centered(extra, width));
        }
    }
    out.push(rule.clone());
    out.push(centered(document.kind.title(), width));
    out.push(two_columns(
        &document.number,
        &document.date.format("%d-%m-%Y").to_string(),
        width,
    ));
    out.push(document.counterparty_name.chars().take(width).collect());
    out.push(rule.clone());

    for row in document_rows(document) {
        out.push(format!("{} {}", row.item_code, row.name).chars().take(width).collect());
        let mut qty = format!("  {} x {}", row.quantity, row.price);
        if row.bonus != "0" {
            qty.push_str(&format!(" +{}", row.bonus));
        }
        out.push(two_columns(&qty, &row.net, width));
    }
    out.push(rule.clone());
    for (label, amount) in summary_lines(document) {
        out.push(two_columns(&label, &amount, width));
    }
    out.push(rule);
    if !company.footer_text.trim().is_empty() {
        out.push(centered(&company.footer_text, width));
    }

    let mut text = out.join("\n");
    text.push('\n');
    text
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> AppResult<String> {
    let bytes = writer
        .into_inner()
        .map_err(|err| AppError::Export(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| AppError::Export(err.to_string()))
}

pub fn document_csv(document: &Document) -> AppResult<String> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    for row in document_rows(document) {
        writer.serialize(row)?;
    }
    if document.lines.is_empty() {
        writer.write_record(DOCUMENT_COLUMNS)?;
    }
    finish_csv(writer)
}

pub fn items_csv(items: &[Item]) -> AppResult<String> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    for item in items {
        writer.serialize(ItemRow {
            code: &item.code,
            name: &item.name,
            packing: item.packing.as_deref().unwrap_or_default(),
            unit_price: format_money(item.unit_price),
            purchase_price: format_money(item.purchase_price),
            stock: format_quantity(item.stock),
            reorder_level: format_quantity(item.reorder_level),
        })?;
    }
    finish_csv(writer)
}

/// Render a stored document; any failure is reported as one export error.
pub fn export_document(db: &DbState, document_id: i64, format: ExportFormat) -> AppResult<ExportFile> {
    let rendered = get_document(db, document_id).and_then(|document| {
        let company = &db.config().company;
        let content = match format {
            ExportFormat::Html => render_document_html(&document, company),
            ExportFormat::Csv => document_csv(&document)?,
            ExportFormat::Text => {
                render_thermal_receipt(&document, company, db.config().print.receipt_width)
            }
        };
        Ok(ExportFile {
            filename: format!("{}.{}", document.number, format.extension()),
            content,
        })
    });
    rendered.map_err(|err| match err {
        AppError::Export(_) => err,
        other => {
            error!(id = document_id, error = %other, "document export failed");
            AppError::Export(other.to_string())
        }
    })
}

/// Write `content` into `dir`, making sure the file carries the format's extension.
pub fn save_export(dir: &Path, filename: &str, format: ExportFormat, content: &str) -> AppResult<PathBuf> {
    let extension = format.extension();
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(AppError::Export("file name is empty".to_string()));
    }
    let suffix = format!(".{extension}");
    let filename = if filename.to_lowercase().ends_with(&suffix) {
        filename.to_string()
    } else {
        format!("{filename}{suffix}")
    };

    let target = dir.join(filename);
    fs::write(&target, content)
        .map_err(|err| AppError::Export(format!("{}: {err}", target.display())))?;
    info!(path = %target.display(), "export written");
    Ok(target)
}
