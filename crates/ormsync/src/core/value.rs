//! Column values and the declared value kinds they convert between.
//!
//! Drivers hand back loosely typed values (an SQLite INTEGER arrives as
//! [`Value::Long`] whatever the column declared), so every value read from a
//! connection is passed through [`Value::coerce`] with the column's
//! [`ValueKind`] before it is stored on a row.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use num_bigint::BigInt;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{OrmError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Declared application-side kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Long,
    Int,
    Short,
    Byte,
    BigInt,
    Decimal,
    Double,
    Bool,
    Text,
    Char,
    Date,
    Time,
    Timestamp,
    Bytes,
}

impl ValueKind {
    /// Kinds a sequence-allocated key can be converted into.
    pub fn is_sequence_compatible(self) -> bool {
        matches!(
            self,
            ValueKind::Long
                | ValueKind::Int
                | ValueKind::Short
                | ValueKind::Byte
                | ValueKind::BigInt
                | ValueKind::Text
        )
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    BigInt(BigInt),
    Decimal(Decimal),
    Double(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integral view of the value, if it has one that fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            Value::BigInt(v) => i64::try_from(v).ok(),
            Value::Decimal(v) if v.fract().is_zero() => v.to_i64(),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    /// Render as an SQL literal, used for column DEFAULT clauses.
    pub fn sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(v) => (if *v { "TRUE" } else { "FALSE" }).to_string(),
            Value::Text(_) | Value::Date(_) | Value::Time(_) | Value::Timestamp(_) => {
                format!("'{}'", self.to_string().replace('\'', "''"))
            }
            Value::Bytes(v) => {
                let hex: String = v.iter().map(|b| format!("{:02X}", b)).collect();
                format!("X'{}'", hex)
            }
            other => other.to_string(),
        }
    }

    /// Convert a driver value into the declared kind of its column.
    pub fn coerce(self, kind: ValueKind) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let converted = match kind {
            ValueKind::Long => self.as_i64().map(Value::Long),
            ValueKind::Int => self
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Int),
            ValueKind::Short => self
                .as_i64()
                .and_then(|v| i16::try_from(v).ok())
                .map(Value::Short),
            ValueKind::Byte => self
                .as_i64()
                .and_then(|v| i8::try_from(v).ok())
                .map(Value::Byte),
            ValueKind::BigInt => match &self {
                Value::BigInt(v) => Some(Value::BigInt(v.clone())),
                Value::Text(v) => BigInt::from_str(v.trim()).ok().map(Value::BigInt),
                other => other.as_i64().map(|v| Value::BigInt(BigInt::from(v))),
            },
            ValueKind::Decimal => match &self {
                Value::Decimal(v) => Some(Value::Decimal(*v)),
                Value::Double(v) => Decimal::try_from(*v).ok().map(Value::Decimal),
                Value::Text(v) => Decimal::from_str(v.trim()).ok().map(Value::Decimal),
                other => other.as_i64().map(|v| Value::Decimal(Decimal::from(v))),
            },
            ValueKind::Double => match &self {
                Value::Double(v) => Some(Value::Double(*v)),
                Value::Decimal(v) => v.to_f64().map(Value::Double),
                Value::Text(v) => v.trim().parse().ok().map(Value::Double),
                other => other.as_i64().map(|v| Value::Double(v as f64)),
            },
            ValueKind::Bool => match &self {
                Value::Bool(v) => Some(Value::Bool(*v)),
                Value::Text(v) => match v.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "1" | "y" => Some(Value::Bool(true)),
                    "false" | "f" | "0" | "n" => Some(Value::Bool(false)),
                    _ => None,
                },
                other => other.as_i64().map(|v| Value::Bool(v != 0)),
            },
            ValueKind::Text | ValueKind::Char => match self {
                Value::Text(v) => Some(Value::Text(v)),
                other => Some(Value::Text(other.to_string())),
            },
            ValueKind::Date => match &self {
                Value::Date(v) => Some(Value::Date(*v)),
                Value::Timestamp(v) => Some(Value::Date(v.date())),
                Value::Text(v) => NaiveDate::parse_from_str(v.trim(), DATE_FORMAT)
                    .ok()
                    .map(Value::Date),
                _ => None,
            },
            ValueKind::Time => match &self {
                Value::Time(v) => Some(Value::Time(*v)),
                Value::Timestamp(v) => Some(Value::Time(v.time())),
                Value::Text(v) => NaiveTime::parse_from_str(v.trim(), TIME_FORMAT)
                    .ok()
                    .map(Value::Time),
                _ => None,
            },
            ValueKind::Timestamp => match &self {
                Value::Timestamp(v) => Some(Value::Timestamp(*v)),
                Value::Date(v) => v.and_hms_opt(0, 0, 0).map(Value::Timestamp),
                Value::Text(v) => parse_timestamp(v.trim()).map(Value::Timestamp),
                _ => None,
            },
            ValueKind::Bytes => match self {
                Value::Bytes(v) => Some(Value::Bytes(v)),
                Value::Text(v) => Some(Value::Bytes(v.into_bytes())),
                _ => None,
            },
        };
        converted.ok_or_else(|| OrmError::Conversion(format!("cannot convert value to {:?}", kind)))
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
            Value::Time(v) => write!(f, "{}", v.format(TIME_FORMAT)),
            Value::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
