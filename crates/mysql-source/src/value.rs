//! Decoding of MySQL result cells.
//!
//! Rows come back through the binary protocol, so most cells are already
//! typed (`Int`, `Date`, ...). Text cells (`Bytes`) are parsed as a fallback
//! so the same decoders work for text-protocol queries and for columns the
//! server sends as strings (DECIMAL, ENUM, YEAR on some versions).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mysql_async::{Row, Value};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Error during MySQL value decoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("column {0} is missing from the result row")]
    MissingColumn(usize),
    #[error("column {0} is NULL")]
    UnexpectedNull(usize),
    #[error("Type mismatch: expected {expected}, got {actual:?}")]
    TypeMismatch { expected: &'static str, actual: Value },
    #[error("Invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("Invalid date/time value")]
    InvalidDateTime,
    #[error("Invalid integer '{0}'")]
    InvalidInteger(String),
    #[error("Invalid decimal '{0}'")]
    InvalidDecimal(String),
}

fn mismatch(expected: &'static str, value: &Value) -> DecodeError {
    DecodeError::TypeMismatch {
        expected,
        actual: value.clone(),
    }
}

fn bytes_to_string(b: &[u8]) -> Result<String, DecodeError> {
    Ok(String::from_utf8(b.to_vec())?)
}

pub fn int(value: &Value) -> Result<i64, DecodeError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::UInt(u) => i64::try_from(*u).map_err(|_| mismatch("i64", value)),
        Value::Bytes(b) => {
            let s = bytes_to_string(b)?;
            s.trim()
                .parse()
                .map_err(|_| DecodeError::InvalidInteger(s))
        }
        _ => Err(mismatch("integer", value)),
    }
}

pub fn text(value: &Value) -> Result<String, DecodeError> {
    match value {
        Value::Bytes(b) => bytes_to_string(b),
        _ => Err(mismatch("string", value)),
    }
}

pub fn boolean(value: &Value) -> Result<bool, DecodeError> {
    Ok(int(value)? != 0)
}

/// DATETIME/TIMESTAMP cell. MySQL has no zone on either type; the value is
/// taken as the wall-clock time the server reports.
pub fn datetime(value: &Value) -> Result<NaiveDateTime, DecodeError> {
    match value {
        Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = NaiveDate::from_ymd_opt(*year as i32, *month as u32, *day as u32)
                .ok_or(DecodeError::InvalidDateTime)?;
            let time =
                NaiveTime::from_hms_micro_opt(*hour as u32, *min as u32, *sec as u32, *micro)
                    .ok_or(DecodeError::InvalidDateTime)?;
            Ok(NaiveDateTime::new(date, time))
        }
        Value::Bytes(b) => {
            let s = bytes_to_string(b)?;
            NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S"))
                .map_err(|_| DecodeError::InvalidDateTime)
        }
        _ => Err(mismatch("datetime", value)),
    }
}

/// DECIMAL cell, normally selected through `CAST(... AS CHAR)`.
pub fn decimal(value: &Value) -> Result<Decimal, DecodeError> {
    match value {
        Value::Bytes(b) => {
            let s = bytes_to_string(b)?;
            Decimal::from_str(s.trim()).map_err(|_| DecodeError::InvalidDecimal(s))
        }
        Value::Int(i) => Ok(Decimal::from(*i)),
        Value::UInt(u) => Ok(Decimal::from(*u)),
        _ => Err(mismatch("decimal", value)),
    }
}

/// Bind parameter for a DATETIME comparison.
pub fn datetime_param(ts: NaiveDateTime) -> Value {
    use chrono::{Datelike, Timelike};

    Value::Date(
        ts.year() as u16,
        ts.month() as u8,
        ts.day() as u8,
        ts.hour() as u8,
        ts.minute() as u8,
        ts.second() as u8,
        ts.nanosecond() / 1_000,
    )
}

/// Positional access to the cells of one result row.
pub struct Cells<'a> {
    row: &'a Row,
}

impl<'a> Cells<'a> {
    pub fn new(row: &'a Row) -> Self {
        Self { row }
    }

    fn raw(&self, idx: usize) -> Result<&'a Value, DecodeError> {
        self.row
            .as_ref(idx)
            .ok_or(DecodeError::MissingColumn(idx))
    }

    /// Decode a NOT NULL cell.
    pub fn get<T>(
        &self,
        idx: usize,
        decode: fn(&Value) -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        match self.raw(idx)? {
            Value::NULL => Err(DecodeError::UnexpectedNull(idx)),
            value => decode(value),
        }
    }

    /// Decode a nullable cell.
    pub fn opt<T>(
        &self,
        idx: usize,
        decode: fn(&Value) -> Result<T, DecodeError>,
    ) -> Result<Option<T>, DecodeError> {
        match self.raw(idx)? {
            Value::NULL => Ok(None),
            value => decode(value).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_accepts_binary_and_text_cells() {
        assert_eq!(int(&Value::Int(-4)).unwrap(), -4);
        assert_eq!(int(&Value::UInt(7)).unwrap(), 7);
        assert_eq!(int(&Value::Bytes(b"2006".to_vec())).unwrap(), 2006);
        assert!(int(&Value::Bytes(b"abc".to_vec())).is_err());
        assert!(int(&Value::UInt(u64::MAX)).is_err());
    }

    #[test]
    fn test_datetime_from_date_value() {
        let v = Value::Date(2006, 2, 15, 4, 34, 33, 0);
        let expected = NaiveDate::from_ymd_opt(2006, 2, 15)
            .unwrap()
            .and_hms_opt(4, 34, 33)
            .unwrap();
        assert_eq!(datetime(&v).unwrap(), expected);
    }

    #[test]
    fn test_datetime_from_text() {
        let v = Value::Bytes(b"2005-05-24 22:53:30".to_vec());
        assert_eq!(datetime(&v).unwrap().to_string(), "2005-05-24 22:53:30");
        assert!(datetime(&Value::Bytes(b"yesterday".to_vec())).is_err());
        assert!(datetime(&Value::Date(2023, 2, 29, 0, 0, 0, 0)).is_err());
    }

    #[test]
    fn test_datetime_param_round_trips_through_decoder() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_micro_opt(12, 1, 2, 345)
            .unwrap();
        assert_eq!(datetime(&datetime_param(ts)).unwrap(), ts);
    }

    #[test]
    fn test_decimal_keeps_scale() {
        let d = decimal(&Value::Bytes(b"2.99".to_vec())).unwrap();
        assert_eq!(d, Decimal::new(299, 2));
        assert!(decimal(&Value::Bytes(b"n/a".to_vec())).is_err());
        assert!(decimal(&Value::Double(2.99)).is_err());
    }

    #[test]
    fn test_boolean() {
        assert!(boolean(&Value::Int(1)).unwrap());
        assert!(!boolean(&Value::Bytes(b"0".to_vec())).unwrap());
    }
}
