//! Invoice and ledger arithmetic shared by every transactional page.
//!
//! All amounts are plain `f64` and are never rounded while computing; the
//! only rounding happens in [`format_money`] when a value is shown or printed.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Quantities and prices of one line before any amount is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LineInput {
    pub quantity: f64,
    pub unit_price: f64,
    /// Free units. They move stock but are never charged.
    pub bonus: f64,
    pub discount_pct: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LineAmounts {
    pub gross: f64,
    pub discount: f64,
    pub net: f64,
}

/// How a document's net amount moves the counterparty balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Sales and purchases: the counterparty's balance grows by the net.
    Charge,
    /// Returns: the net comes off the balance, cash refunded goes back on.
    Reverse,
}

/// Which side of the books a counterparty balance sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSide {
    Receivable,
    Payable,
}

impl BalanceSide {
    pub fn label(&self) -> &'static str {
        match self {
            BalanceSide::Receivable => "Receivable",
            BalanceSide::Payable => "Payable",
        }
    }
}

/// Header-level inputs of a transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Terms {
    pub discount_pct: f64,
    pub previous_balance: f64,
    /// Cash received (receivables) or paid (payables) on the document.
    pub cash: f64,
    pub apply_line_discount: bool,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub discount_pct: f64,
    pub gross: f64,
    pub line_discount: f64,
    pub invoice_discount: f64,
    pub discount: f64,
    pub net: f64,
    pub previous_balance: f64,
    pub cash: f64,
    pub final_balance: f64,
}

impl Totals {
    /// Amount this document adds to the counterparty balance.
    pub fn balance_effect(&self) -> f64 {
        self.final_balance - self.previous_balance
    }
}

pub fn percent_of(amount: f64, pct: f64) -> f64 {
    amount * pct / 100.0
}

pub fn line_amounts(line: &LineInput, apply_line_discount: bool) -> LineAmounts {
    let gross = line.quantity * line.unit_price;
    let discount = if apply_line_discount {
        percent_of(gross, line.discount_pct)
    } else {
        0.0
    };
    LineAmounts {
        gross,
        discount,
        net: gross - discount,
    }
}

/// Totals of a document.
///
/// The invoice percentage is taken on the gross amount. When line discounts
/// apply (sales) they are added on top of it, so a sale carrying both a line
/// discount and an invoice discount is discounted twice.
pub fn compute_totals(lines: &[LineInput], terms: &Terms) -> Totals {
    let (gross, line_discount) = lines
        .iter()
        .map(|line| line_amounts(line, terms.apply_line_discount))
        .fold((0.0, 0.0), |(gross, discount), amounts| {
            (gross + amounts.gross, discount + amounts.discount)
        });

    let invoice_discount = percent_of(gross, terms.discount_pct);
    let discount = invoice_discount + line_discount;
    let net = gross - discount;
    let final_balance = match terms.direction {
        Direction::Charge => terms.previous_balance + net - terms.cash,
        Direction::Reverse => terms.previous_balance - net + terms.cash,
    };

    Totals {
        discount_pct: terms.discount_pct,
        gross,
        line_discount,
        invoice_discount,
        discount,
        net,
        previous_balance: terms.previous_balance,
        cash: terms.cash,
        final_balance,
    }
}

/// Balance after a collection or payment settles part of it.
pub fn settlement_balance(previous_balance: f64, amount: f64) -> f64 {
    previous_balance - amount
}

/// Balance after an amount is charged to it.
pub fn charge_balance(previous_balance: f64, amount: f64) -> f64 {
    previous_balance + amount
}

/// Two decimals, for display and print only.
pub fn format_money(value: f64) -> String {
    let formatted = format!("{value:.2}");
    if formatted == "-0.00" {
        "0.00".to_string()
    } else {
        formatted
    }
}

fn ensure_finite(value: f64, field: &str) -> AppResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AppError::validation(format!("{field} must be a number")))
    }
}

/// Any finite amount, negative included.
pub fn validate_amount(value: f64, field: &str) -> AppResult<()> {
    ensure_finite(value, field)
}

pub fn validate_positive(value: f64, field: &str) -> AppResult<()> {
    ensure_finite(value, field)?;
    if value <= 0.0 {
        return Err(AppError::validation(format!("{field} must be greater than 0")));
    }
    Ok(())
}

pub fn validate_non_negative(value: f64, field: &str) -> AppResult<()> {
    ensure_finite(value, field)?;
    if value < 0.0 {
        return Err(AppError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

pub fn validate_percentage(value: f64, field: &str) -> AppResult<()> {
    ensure_finite(value, field)?;
    if !(0.0..=100.0).contains(&value) {
        return Err(AppError::validation(format!(
            "{field} must be between 0 and 100"
        )));
    }
    Ok(())
}

pub fn validate_line(line: &LineInput) -> AppResult<()> {
    validate_positive(line.quantity, "quantity")?;
    validate_non_negative(line.unit_price, "price")?;
    validate_non_negative(line.bonus, "bonus")?;
    validate_percentage(line.discount_pct, "line discount")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn line(quantity: f64, unit_price: f64) -> LineInput {
        LineInput {
            quantity,
            unit_price,
            ..LineInput::default()
        }
    }

    fn charge(discount_pct: f64, previous_balance: f64, cash: f64) -> Terms {
        Terms {
            discount_pct,
            previous_balance,
            cash,
            apply_line_discount: false,
            direction: Direction::Charge,
        }
    }

    #[test]
    fn two_line_invoice_with_ten_percent() {
        let lines = [line(5.0, 45.99), line(3.0, 89.99)];
        let totals = compute_totals(&lines, &charge(10.0, 0.0, 0.0));
        assert!(close(totals.gross, 499.92));
        assert!(close(totals.discount, 49.992));
        assert!(close(totals.net, 449.928));
        assert!(close(totals.final_balance, 449.928));
    }

    #[test]
    fn final_balance_carries_previous_and_cash() {
        let lines = [line(10.0, 20.0)];
        let totals = compute_totals(&lines, &charge(5.0, 1_000.0, 50.0));
        // 200 - 10 = 190; 1000 + 190 - 50
        assert!(close(totals.net, 190.0));
        assert!(close(totals.final_balance, 1_140.0));
        assert!(close(totals.balance_effect(), 140.0));
    }

    #[test]
    fn returns_reverse_the_net() {
        let lines = [line(2.0, 50.0)];
        let terms = Terms {
            direction: Direction::Reverse,
            ..charge(0.0, 500.0, 30.0)
        };
        let totals = compute_totals(&lines, &terms);
        assert!(close(totals.final_balance, 430.0));
    }

    #[test]
    fn sales_add_line_discount_on_top_of_invoice_discount() {
        let lines = [LineInput {
            quantity: 10.0,
            unit_price: 10.0,
            bonus: 2.0,
            discount_pct: 5.0,
        }];
        let terms = Terms {
            apply_line_discount: true,
            ..charge(10.0, 0.0, 0.0)
        };
        let totals = compute_totals(&lines, &terms);
        assert!(close(totals.gross, 100.0));
        assert!(close(totals.line_discount, 5.0));
        assert!(close(totals.invoice_discount, 10.0));
        assert!(close(totals.discount, 15.0));
        assert!(close(totals.net, 85.0));
    }

    #[test]
    fn line_discount_ignored_when_not_applied() {
        let input = LineInput {
            quantity: 4.0,
            unit_price: 25.0,
            bonus: 0.0,
            discount_pct: 50.0,
        };
        let amounts = line_amounts(&input, false);
        assert!(close(amounts.discount, 0.0));
        assert!(close(amounts.net, 100.0));
    }

    #[test]
    fn bonus_units_are_not_charged() {
        let with_bonus = LineInput {
            bonus: 3.0,
            ..line(5.0, 12.5)
        };
        assert!(close(line_amounts(&with_bonus, true).gross, 62.5));
    }

    #[test]
    fn every_line_counted_once() {
        let lines: Vec<LineInput> = (1..=20).map(|i| line(i as f64, 1.0)).collect();
        let totals = compute_totals(&lines, &charge(0.0, 0.0, 0.0));
        assert!(close(totals.gross, 210.0));
    }

    #[test]
    fn settlements() {
        assert!(close(settlement_balance(449.928, 200.0), 249.928));
        assert!(close(charge_balance(100.0, 25.5), 125.5));
    }

    #[test]
    fn money_is_rounded_only_for_display() {
        assert_eq!(format_money(449.928), "449.93");
        assert_eq!(format_money(49.992), "49.99");
        assert_eq!(format_money(-0.001), "0.00");
        assert_eq!(format_money(1_250.0), "1250.00");
    }

    #[test]
    fn guards() {
        assert!(validate_line(&line(0.0, 10.0)).is_err());
        assert!(validate_line(&line(1.0, -1.0)).is_err());
        assert!(validate_line(&line(1.0, f64::NAN)).is_err());
        assert!(validate_line(&line(1.0, 0.0)).is_ok());
        assert!(validate_percentage(100.5, "discount").is_err());
        assert!(validate_positive(0.0, "amount").unwrap_err().is_validation());
    }
}
