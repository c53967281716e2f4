//! Mapping between Rust scalar types and SQL types.
//!
//! Every scalar that can appear in a query carries a [TypeCode] (the
//! JDBC-style code handed to the driver when binding and reading), a cast
//! keyword, and conversions to and from [SqlValue].

use serde::{Deserialize, Serialize};

use anyhow::anyhow;

use crate::error::Result;

/// Driver-level type code, bound alongside every parameter and read slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum TypeCode {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Double,
    Varchar,
    Binary,
}

/// A scalar value travelling through a parameter slot or a result column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Name of the value's variant, used in binding and decoding errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Bool(_) => "BOOLEAN",
            SqlValue::Int(_) => "INTEGER",
            SqlValue::Float(_) => "DOUBLE",
            SqlValue::Text(_) => "VARCHAR",
            SqlValue::Bytes(_) => "BINARY",
        }
    }

    /// Whether the value can be bound under `code`. NULL binds under any
    /// code; integers of all widths share the integer codes.
    pub fn binds_as(&self, code: TypeCode) -> bool {
        match (self, code) {
            (SqlValue::Null, _) => true,
            (SqlValue::Bool(_), TypeCode::Boolean) => true,
            (SqlValue::Int(_), TypeCode::SmallInt | TypeCode::Integer | TypeCode::BigInt) => true,
            (SqlValue::Float(_), TypeCode::Double) => true,
            (SqlValue::Text(_), TypeCode::Varchar) => true,
            (SqlValue::Bytes(_), TypeCode::Binary) => true,
            _ => false,
        }
    }
}

/// A Rust scalar usable at expression and storage positions.
pub trait SqlType: Clone + 'static {
    const TYPE_CODE: TypeCode;

    fn to_value(&self) -> SqlValue;

    fn from_value(value: SqlValue) -> Result<Self>;
}

// plain messages; the row decoder attaches the offending column path
fn mismatch<T>(expected: TypeCode, found: &SqlValue) -> Result<T> {
    Err(anyhow!("expected {expected}, found {}", found.kind_name()))
}

impl SqlType for bool {
    const TYPE_CODE: TypeCode = TypeCode::Boolean;

    fn to_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }

    fn from_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            // SQLite has no boolean affinity and reports 0/1 integers.
            SqlValue::Int(i) => Ok(i != 0),
            other => mismatch(Self::TYPE_CODE, &other),
        }
    }
}

impl SqlType for i16 {
    const TYPE_CODE: TypeCode = TypeCode::SmallInt;

    fn to_value(&self) -> SqlValue {
        SqlValue::Int(i64::from(*self))
    }

    fn from_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Int(i) => i16::try_from(i).map_err(|_| anyhow!("SMALLINT out of range")),
            other => mismatch(Self::TYPE_CODE, &other),
        }
    }
}

impl SqlType for i32 {
    const TYPE_CODE: TypeCode = TypeCode::Integer;

    fn to_value(&self) -> SqlValue {
        SqlValue::Int(i64::from(*self))
    }

    fn from_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Int(i) => i32::try_from(i).map_err(|_| anyhow!("INTEGER out of range")),
            other => mismatch(Self::TYPE_CODE, &other),
        }
    }
}

impl SqlType for i64 {
    const TYPE_CODE: TypeCode = TypeCode::BigInt;

    fn to_value(&self) -> SqlValue {
        SqlValue::Int(*self)
    }

    fn from_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Int(i) => Ok(i),
            other => mismatch(Self::TYPE_CODE, &other),
        }
    }
}

impl SqlType for f64 {
    const TYPE_CODE: TypeCode = TypeCode::Double;

    fn to_value(&self) -> SqlValue {
        SqlValue::Float(*self)
    }

    fn from_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Float(f) => Ok(f),
            SqlValue::Int(i) => Ok(i as f64),
            other => mismatch(Self::TYPE_CODE, &other),
        }
    }
}

impl SqlType for String {
    const TYPE_CODE: TypeCode = TypeCode::Varchar;

    fn to_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }

    fn from_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(s) => Ok(s),
            other => mismatch(Self::TYPE_CODE, &other),
        }
    }
}

impl SqlType for Vec<u8> {
    const TYPE_CODE: TypeCode = TypeCode::Binary;

    fn to_value(&self) -> SqlValue {
        SqlValue::Bytes(self.clone())
    }

    fn from_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bytes(b) => Ok(b),
            other => mismatch(Self::TYPE_CODE, &other),
        }
    }
}

impl<T: SqlType> SqlType for Option<T> {
    const TYPE_CODE: TypeCode = T::TYPE_CODE;

    fn to_value(&self) -> SqlValue {
        match self {
            Some(v) => v.to_value(),
            None => SqlValue::Null,
        }
    }

    fn from_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Marker for types with SQL numeric operations.
pub trait SqlNumeric: SqlType {}

impl SqlNumeric for i16 {}
impl SqlNumeric for i32 {}
impl SqlNumeric for i64 {}
impl SqlNumeric for f64 {}

/// Marker for types with SQL integer operations (modulo, bitwise).
pub trait SqlIntegral: SqlNumeric {}

impl SqlIntegral for i16 {}
impl SqlIntegral for i32 {}
impl SqlIntegral for i64 {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_round_trip() {
        assert_eq!(i64::from_value(42i64.to_value()).unwrap(), 42);
        assert_eq!(
            String::from_value("socks".to_string().to_value()).unwrap(),
            "socks"
        );
        assert_eq!(Option::<i64>::from_value(SqlValue::Null).unwrap(), None);
        assert_eq!(
            Option::<i64>::from_value(SqlValue::Int(7)).unwrap(),
            Some(7)
        );
    }

    #[test]
    fn test_mismatch() {
        let err = i64::from_value(SqlValue::Text("oops".to_string())).unwrap_err();
        assert!(err.to_string().contains("expected BIGINT"));
    }

    #[test]
    fn test_binds_as() {
        assert!(SqlValue::Null.binds_as(TypeCode::Varchar));
        assert!(SqlValue::Int(1).binds_as(TypeCode::SmallInt));
        assert!(!SqlValue::Text("x".into()).binds_as(TypeCode::BigInt));
    }
}
