//! Feature map for SQL dialects.
//!
//! The general principle is to strive to target only the generic (i.e.
//! ANSI) rendering. Dialect-specifics are added only if:
//! - the generic rendering is not supported (i.e. FULL JOIN on MySQL),
//! - the dialect spells an operation differently (i.e. CONCAT vs `||`).
//!
//! As a consequence, generated SQL may be verbose, since it avoids newer or
//! less adopted SQL constructs. The upside is a much simpler renderer.

use core::fmt::Debug;

use serde::{Deserialize, Serialize};
use std::any::Any;
use strum::VariantNames;

use crate::error::{Error, Result};
use crate::types::TypeCode;

/// SQL dialect.
///
/// This only changes the output for a relatively small subset of features.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::EnumVariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    Ansi,
    H2,
    HsqlDb,
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    pub(crate) fn handler(&self) -> Box<dyn DialectHandler> {
        match self {
            Dialect::H2 => Box::new(H2Dialect),
            Dialect::HsqlDb => Box::new(HsqlDbDialect),
            Dialect::MySql => Box::new(MySqlDialect),
            Dialect::Postgres => Box::new(PostgresDialect),
            Dialect::Sqlite => Box::new(SqliteDialect),
            Dialect::Ansi => Box::new(AnsiDialect),
        }
    }

    pub fn names() -> &'static [&'static str] {
        Dialect::VARIANTS
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::Ansi
    }
}

#[derive(Debug)]
pub struct AnsiDialect;
#[derive(Debug)]
pub struct H2Dialect;
#[derive(Debug)]
pub struct HsqlDbDialect;
#[derive(Debug)]
pub struct MySqlDialect;
#[derive(Debug)]
pub struct PostgresDialect;
#[derive(Debug)]
pub struct SqliteDialect;

pub(crate) enum OnConflictStyle {
    /// `ON CONFLICT (keys) DO NOTHING / DO UPDATE SET …`
    Standard,
    /// `ON DUPLICATE KEY UPDATE …`, without the key list.
    DuplicateKey,
    Unsupported,
}

pub(crate) enum UpdateJoinStyle {
    /// `UPDATE t SET … FROM joined WHERE on AND pred`
    FromWhere,
    /// `UPDATE t JOIN joined ON on SET t.c = … WHERE pred`, with the SET
    /// column names table-qualified.
    JoinBeforeSet,
}

pub(crate) trait DialectHandler: Any + Debug {
    fn ident_quote(&self) -> char {
        '"'
    }

    /// Support for FULL OUTER JOIN. When not supported we emulate with
    /// LEFT JOIN ∪ RIGHT JOIN.
    fn supports_full_join(&self) -> bool {
        true
    }

    /// Support for a CONCAT function. When false we use the `||` operator.
    fn has_concat_function(&self) -> bool {
        false
    }

    /// When true, integer modulo is spelled `MOD(a, b)` instead of `a % b`.
    fn modulo_function(&self) -> bool {
        false
    }

    /// When true, bitwise operations are spelled `BITAND(a, b)` etc.
    /// instead of the `&`/`|`/`^`/`~` operators.
    fn bitwise_functions(&self) -> bool {
        false
    }

    /// A native null-safe equality operator, if any; otherwise we expand to
    /// `(a IS NULL AND b IS NULL) OR a = b`.
    fn null_safe_equality(&self) -> Option<&'static str> {
        None
    }

    /// Support for `NULLS FIRST` / `NULLS LAST`. When not supported the
    /// ordering is emulated with an `expr IS NULL` key.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    fn string_agg_name(&self) -> &'static str {
        "STRING_AGG"
    }

    /// When true, substring search is `POSITION(needle IN haystack)`;
    /// otherwise `INSTR(haystack, needle)`.
    fn position_function(&self) -> bool {
        true
    }

    /// Appended to a SELECT without a from-clause; some engines require
    /// one.
    fn select_suffix(&self) -> &'static str {
        ""
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn on_conflict_style(&self) -> OnConflictStyle {
        OnConflictStyle::Unsupported
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::FromWhere
    }

    /// Keyword prefixing each row of a VALUES list (`ROW` on MySQL).
    fn values_row_keyword(&self) -> &'static str {
        ""
    }

    /// When true, inline tables render as `SELECT ? as value UNION ALL …`
    /// because the engine cannot name VALUES columns through a derived
    /// column list.
    fn values_as_union_all(&self) -> bool {
        false
    }

    /// A placeholder limit for engines that reject OFFSET without LIMIT.
    fn limit_required_with_offset(&self) -> Option<&'static str> {
        None
    }

    /// Support for two-argument LTRIM/RTRIM (strip a character set).
    fn supports_trim_chars(&self) -> bool {
        true
    }

    /// The cast keyword for a type code.
    fn type_name(&self, code: TypeCode) -> &'static str {
        match code {
            TypeCode::Boolean => "BOOLEAN",
            TypeCode::SmallInt => "SMALLINT",
            TypeCode::Integer => "INTEGER",
            TypeCode::BigInt => "BIGINT",
            TypeCode::Double => "DOUBLE PRECISION",
            TypeCode::Varchar => "VARCHAR",
            TypeCode::Binary => "VARBINARY",
        }
    }

    /// Hook for functions a dialect lacks or renames.
    fn translate_function_name(&self, name: &str) -> Result<String> {
        Ok(name.to_string())
    }
}

impl DialectHandler for AnsiDialect {}

impl DialectHandler for H2Dialect {
    fn modulo_function(&self) -> bool {
        true
    }

    fn bitwise_functions(&self) -> bool {
        true
    }

    fn string_agg_name(&self) -> &'static str {
        "GROUP_CONCAT"
    }
}

impl DialectHandler for HsqlDbDialect {
    fn modulo_function(&self) -> bool {
        true
    }

    fn bitwise_functions(&self) -> bool {
        true
    }

    fn string_agg_name(&self) -> &'static str {
        "GROUP_CONCAT"
    }

    // HSQLDB refuses a bare SELECT without a from-clause.
    fn select_suffix(&self) -> &'static str {
        " FROM (VALUES (0))"
    }
}

impl DialectHandler for MySqlDialect {
    fn ident_quote(&self) -> char {
        '`'
    }

    // https://dev.mysql.com/doc/refman/8.0/en/join.html
    fn supports_full_join(&self) -> bool {
        false
    }

    fn has_concat_function(&self) -> bool {
        true
    }

    fn null_safe_equality(&self) -> Option<&'static str> {
        Some("<=>")
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn string_agg_name(&self) -> &'static str {
        "GROUP_CONCAT"
    }

    fn on_conflict_style(&self) -> OnConflictStyle {
        OnConflictStyle::DuplicateKey
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::JoinBeforeSet
    }

    // https://dev.mysql.com/doc/refman/8.0/en/values.html
    fn values_row_keyword(&self) -> &'static str {
        "ROW"
    }

    fn limit_required_with_offset(&self) -> Option<&'static str> {
        Some("18446744073709551615")
    }

    fn supports_trim_chars(&self) -> bool {
        false
    }

    fn type_name(&self, code: TypeCode) -> &'static str {
        // CAST target names diverge from the column type names.
        match code {
            TypeCode::Boolean => "SIGNED",
            TypeCode::SmallInt | TypeCode::Integer | TypeCode::BigInt => "SIGNED",
            TypeCode::Double => "DOUBLE",
            TypeCode::Varchar => "CHAR",
            TypeCode::Binary => "BINARY",
        }
    }
}

impl DialectHandler for PostgresDialect {
    fn supports_returning(&self) -> bool {
        true
    }

    fn on_conflict_style(&self) -> OnConflictStyle {
        OnConflictStyle::Standard
    }
}

impl DialectHandler for SqliteDialect {
    fn string_agg_name(&self) -> &'static str {
        "GROUP_CONCAT"
    }

    // SQLite has no derived column lists on table aliases.
    fn values_as_union_all(&self) -> bool {
        true
    }

    fn limit_required_with_offset(&self) -> Option<&'static str> {
        Some("-1")
    }

    fn position_function(&self) -> bool {
        false
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn on_conflict_style(&self) -> OnConflictStyle {
        OnConflictStyle::Standard
    }

    fn type_name(&self, code: TypeCode) -> &'static str {
        match code {
            TypeCode::Boolean => "INTEGER",
            TypeCode::SmallInt | TypeCode::Integer | TypeCode::BigInt => "INTEGER",
            TypeCode::Double => "REAL",
            TypeCode::Varchar => "TEXT",
            TypeCode::Binary => "BLOB",
        }
    }

    fn translate_function_name(&self, name: &str) -> Result<String> {
        if name == "REVERSE" {
            return Err(Error::rendering("REVERSE is not supported by SQLite").into());
        }
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::Dialect;
    use insta::assert_debug_snapshot;
    use std::str::FromStr;

    #[test]
    fn test_dialect_from_str() {
        assert_debug_snapshot!(Dialect::from_str("postgres"), @r###"
        Ok(
            Postgres,
        )
        "###);

        assert_debug_snapshot!(Dialect::from_str("foo"), @r###"
        Err(
            VariantNotFound,
        )
        "###);
    }

    #[test]
    fn test_names() {
        assert!(Dialect::names().contains(&"mysql"));
        assert!(Dialect::names().contains(&"hsqldb"));
    }
}

/*
## Null-safe equality support matrix

| SQL construct                        | H2 | HSQLDB | Postgres | MySQL | SQLite
|--------------------------------------|----|--------|----------|-------|-------
| a <=> b                              |    |        |          | x     |
| a IS NOT DISTINCT FROM b             | x  | x      | x        |       |
| (a IS NULL AND b IS NULL) OR a = b   | x  | x      | x        | x     | x

We always emit the expanded form unless the dialect has `<=>`; IS NOT
DISTINCT FROM is not universal enough to be the generic spelling.
*/
