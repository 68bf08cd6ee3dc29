use std::fmt;

use crate::domain::{ReportRange, TransactionType};

pub const RANGE_INPUT_MAX_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// `range` must be present and a non-negative integer.
pub fn parse_range(raw: Option<&str>) -> Result<ReportRange, ValidationError> {
    let value = raw.ok_or_else(|| ValidationError::new("range", "is required"))?;
    validate_required("range", value)?;
    validate_max_len("range", value, RANGE_INPUT_MAX_LEN)?;

    let value = value.trim();
    if !value.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new("range", "must be a non-negative integer"));
    }

    value
        .parse::<u32>()
        .map(ReportRange)
        .map_err(|_| ValidationError::new("range", "is out of range"))
}

pub fn parse_transaction_type(raw: &str) -> Result<TransactionType, ValidationError> {
    raw.parse::<TransactionType>().map_err(|_| {
        ValidationError::new("type", "must be one of: INCOME, EXPENSE, INVESTMENT")
    })
}
