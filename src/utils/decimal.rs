//! Exact decimal decoding for amounts arriving from upstream services.
//!
//! Upstream JSON carries amounts either as numbers (`500`, `12.34`) or as
//! strings (`"12.34"`). The raw JSON token is parsed straight into a
//! `BigDecimal`, so numbers never pass through `f64`.

use bigdecimal::BigDecimal;
use serde::{de, Deserialize, Deserializer};
use serde_json::value::RawValue;
use std::str::FromStr;

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    let token = raw.get().trim();

    let text = if token.starts_with('"') {
        serde_json::from_str::<String>(token).map_err(de::Error::custom)?
    } else if token.starts_with(|c: char| c == '-' || c.is_ascii_digit()) {
        token.to_string()
    } else {
        return Err(de::Error::custom(format!("expected a decimal amount, found {}", token)));
    };

    BigDecimal::from_str(text.trim())
        .map_err(|e| de::Error::custom(format!("invalid decimal '{}': {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(deserialize_with = "deserialize")]
        amount: BigDecimal,
    }

    fn parse(json: &str) -> Result<BigDecimal, serde_json::Error> {
        serde_json::from_str::<Wrapper>(json).map(|w| w.amount)
    }

    #[test]
    fn test_integer_number() {
        assert_eq!(parse(r#"{"amount": 500}"#).unwrap(), BigDecimal::from(500));
    }

    #[test]
    fn test_fractional_number_is_exact() {
        let amount = parse(r#"{"amount": 0.1}"#).unwrap();
        assert_eq!(amount, BigDecimal::from_str("0.1").unwrap());
    }

    #[test]
    fn test_long_number_keeps_every_digit() {
        let amount = parse(r#"{"amount": 12345678901234567.89}"#).unwrap();
        assert_eq!(amount, BigDecimal::from_str("12345678901234567.89").unwrap());
    }

    #[test]
    fn test_exponent_number() {
        assert_eq!(parse(r#"{"amount": 1.5e3}"#).unwrap(), BigDecimal::from(1500));
    }

    #[test]
    fn test_string_amount() {
        let amount = parse(r#"{"amount": "1234.5600"}"#).unwrap();
        assert_eq!(amount, BigDecimal::from_str("1234.56").unwrap());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse(r#"{"amount": "twelve"}"#).is_err());
        assert!(parse(r#"{"amount": null}"#).is_err());
        assert!(parse(r#"{"amount": true}"#).is_err());
        assert!(parse(r#"{"amount": [1]}"#).is_err());
    }
}
