//! Fixed-point recipe price (two decimal places, at most five digits).
//!
//! Stored and rendered as a decimal string (`"5.25"`) so no float ever
//! touches the value. Request bodies may send either a string or a JSON
//! number; [`PriceInput`] keeps the raw form until validation.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DECIMAL_PLACES: usize = 2;
const MAX_WHOLE_DIGITS: usize = 3; // max_digits (5) - decimal places (2)

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Price(i64); // hundredths

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("A valid number is required.")]
    Invalid,
    #[error("Ensure that there are no more than 2 decimal places.")]
    TooManyDecimals,
    #[error("Ensure that there are no more than 3 digits before the decimal point.")]
    TooManyWholeDigits,
    #[error("Ensure this value is greater than or equal to 0.")]
    Negative,
}

impl Price {
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));

        if whole.is_empty() && frac.is_empty() {
            return Err(PriceError::Invalid);
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PriceError::Invalid);
        }
        if frac.len() > DECIMAL_PLACES {
            return Err(PriceError::TooManyDecimals);
        }
        let whole = whole.trim_start_matches('0');
        if whole.len() > MAX_WHOLE_DIGITS {
            return Err(PriceError::TooManyWholeDigits);
        }

        let whole_value: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| PriceError::Invalid)? };
        let frac_value: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| PriceError::Invalid)? * 10,
            _ => frac.parse().map_err(|_| PriceError::Invalid)?,
        };
        let cents = whole_value * 100 + frac_value;
        if negative && cents != 0 {
            return Err(PriceError::Negative);
        }
        Ok(Self(cents))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PriceInput::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// Raw price as it arrived in a request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Text(String),
    Number(serde_json::Number),
}

impl PriceInput {
    pub fn parse(&self) -> Result<Price, PriceError> {
        match self {
            PriceInput::Text(text) => text.parse(),
            PriceInput::Number(number) => number.to_string().parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        assert_eq!("5.25".parse::<Price>().unwrap(), Price::from_cents(525));
        assert_eq!("1.5".parse::<Price>().unwrap().to_string(), "1.50");
        assert_eq!("12".parse::<Price>().unwrap().to_string(), "12.00");
        assert_eq!(".99".parse::<Price>().unwrap().cents(), 99);
        assert_eq!("999.99".parse::<Price>().unwrap().cents(), 99_999);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert_eq!("1.234".parse::<Price>(), Err(PriceError::TooManyDecimals));
        assert_eq!("1000".parse::<Price>(), Err(PriceError::TooManyWholeDigits));
        assert_eq!("-2.00".parse::<Price>(), Err(PriceError::Negative));
        assert_eq!("abc".parse::<Price>(), Err(PriceError::Invalid));
        assert_eq!("".parse::<Price>(), Err(PriceError::Invalid));
        assert_eq!("1.2.3".parse::<Price>(), Err(PriceError::Invalid));
    }

    #[test]
    fn test_json_number_and_string_inputs() {
        let from_number: PriceInput = serde_json::from_str("11.45").unwrap();
        let from_text: PriceInput = serde_json::from_str("\"11.45\"").unwrap();
        assert_eq!(from_number.parse().unwrap(), from_text.parse().unwrap());

        let stored = serde_json::to_string(&Price::from_cents(119)).unwrap();
        assert_eq!(stored, "\"1.19\"");
        let back: Price = serde_json::from_str(&stored).unwrap();
        assert_eq!(back.cents(), 119);
    }
}
