use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};

use super::transaction::{Transaction, TransactionType};

/// Reporting window selector accepted by the dashboard.
///
/// Validated and passed through; totals are currently computed over every
/// transaction the sources return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange(pub u32);

/// Summary computed on demand. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub transactions: Vec<Transaction>,
    pub total_income: BigDecimal,
    pub total_expense: BigDecimal,
    pub total_investment: BigDecimal,
    pub net_gain: BigDecimal,
    pub net_loss: BigDecimal,
}

impl DashboardReport {
    /// Reduces the rows into per-type totals and a net gain or loss.
    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        let total_income = total_for(&transactions, TransactionType::Income);
        let total_expense = total_for(&transactions, TransactionType::Expense);
        let total_investment = total_for(&transactions, TransactionType::Investment);

        let net = &total_income - &total_expense - &total_investment;
        let zero = BigDecimal::zero();
        let (net_gain, net_loss) = if net > zero {
            (net, zero)
        } else if net < zero {
            (zero, net.abs())
        } else {
            // zero is neither a gain nor a loss
            (zero.clone(), zero)
        };

        Self {
            transactions,
            total_income,
            total_expense,
            total_investment,
            net_gain,
            net_loss,
        }
    }
}

fn total_for(transactions: &[Transaction], transaction_type: TransactionType) -> BigDecimal {
    transactions
        .iter()
        .filter(|t| t.transaction_type == transaction_type)
        .fold(BigDecimal::zero(), |acc, t| acc + &t.amount)
}
