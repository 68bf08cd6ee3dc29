pub mod report;
pub mod source;
pub mod transaction;

pub use report::{DashboardReport, ReportRange};
pub use source::{Expense, Income, Investment, SourceKind, SourceRecord};
pub use transaction::{NewTransaction, Transaction, TransactionType};
