//! Scalar expression IR.
//!
//! Expressions are a data IR ([ExprKind]) wrapped by the typed surface
//! [Expr]. The wrapper pins the static scalar type of the node; the kind is
//! what the renderer walks. Dialect-specific spellings (concat, modulo,
//! bitwise, null-safe equality) stay abstract here and are decided by the
//! dialect handler at render time.

mod case;
mod ops;
mod string;

pub use case::{case_when, CaseWhen};
pub use ops::SqlAdd;

use enum_as_inner::EnumAsInner;
use serde::Serialize;
use std::marker::PhantomData;

use crate::fragment::Param;
use crate::query::{SelectIr, SourceId};
use crate::types::{SqlType, SqlValue, TypeCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    // spelled `%` or `MOD(_, _)` depending on dialect
    Mod,
    BitAnd,
    BitOr,
    BitXor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AggFunc {
    Sum,
    Min,
    Max,
    Avg,
    Count,
    StringAgg,
}

impl AggFunc {
    pub fn default_name(&self) -> &'static str {
        match self {
            AggFunc::Sum => "SUM",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
            AggFunc::Avg => "AVG",
            AggFunc::Count => "COUNT",
            // dialect-specific: STRING_AGG / GROUP_CONCAT / LISTAGG
            AggFunc::StringAgg => "STRING_AGG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, EnumAsInner)]
pub enum ExprKind {
    /// A column of a from-source, rendered as `<alias>.<mapped name>`.
    Column { source: SourceId, name: String },

    /// A literal travelling as a parameter slot.
    Param(Param),

    Binary {
        op: BinaryOp,
        left: Box<ExprKind>,
        right: Box<ExprKind>,
    },

    Unary {
        op: UnaryOp,
        expr: Box<ExprKind>,
    },

    /// A plain function call with uniform spelling across dialects.
    Func {
        name: String,
        args: Vec<ExprKind>,
    },

    /// String concatenation; dialect chooses `||` or `CONCAT(..)`.
    Concat(Vec<ExprKind>),

    /// `POSITION(needle IN haystack)` or `INSTR(haystack, needle)`.
    IndexOf {
        haystack: Box<ExprKind>,
        needle: Box<ExprKind>,
    },

    Cast {
        expr: Box<ExprKind>,
        to: TypeCode,
    },

    Like {
        expr: Box<ExprKind>,
        pattern: Box<ExprKind>,
    },

    Between {
        expr: Box<ExprKind>,
        low: Box<ExprKind>,
        high: Box<ExprKind>,
    },

    IsNull {
        expr: Box<ExprKind>,
        negated: bool,
    },

    /// Null-safe equality; `(a IS NULL AND b IS NULL) OR a = b` generically,
    /// `a <=> b` on MySQL.
    NullSafeEq {
        left: Box<ExprKind>,
        right: Box<ExprKind>,
        negated: bool,
    },

    Case {
        branches: Vec<(ExprKind, ExprKind)>,
        otherwise: Option<Box<ExprKind>>,
    },

    Aggregate {
        func: AggFunc,
        args: Vec<ExprKind>,
    },

    Exists {
        query: Box<SelectIr>,
        negated: bool,
    },

    InSubquery {
        expr: Box<ExprKind>,
        query: Box<SelectIr>,
    },

    /// A one-column, one-row select usable as a scalar.
    ScalarSubquery(Box<SelectIr>),

    /// The incoming row of an `ON CONFLICT DO UPDATE`; `EXCLUDED.col`
    /// generically, `VALUES(col)` under MySQL's ON DUPLICATE KEY UPDATE.
    ExcludedColumn(String),
}

impl ExprKind {
    pub fn param(type_code: TypeCode, value: SqlValue) -> ExprKind {
        ExprKind::Param(Param { type_code, value })
    }

    pub fn binary(op: BinaryOp, left: ExprKind, right: ExprKind) -> ExprKind {
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn func<S: Into<String>>(name: S, args: Vec<ExprKind>) -> ExprKind {
        ExprKind::Func {
            name: name.into(),
            args,
        }
    }

    /// Folds a list of predicates into a conjunction, if any.
    pub fn conjunction(mut exprs: Vec<ExprKind>) -> Option<ExprKind> {
        let mut condition = exprs.pop()?;
        while let Some(expr) = exprs.pop() {
            condition = ExprKind::binary(BinaryOp::And, expr, condition);
        }
        Some(condition)
    }
}

/// A typed scalar expression over query rows.
#[derive(Debug, Serialize)]
pub struct Expr<T> {
    pub(crate) kind: ExprKind,
    marker: PhantomData<fn() -> T>,
}

// Manual impl: `T` itself need not be Clone for the node to be.
impl<T> Clone for Expr<T> {
    fn clone(&self) -> Self {
        Expr {
            kind: self.kind.clone(),
            marker: PhantomData,
        }
    }
}

impl<T> Expr<T> {
    pub(crate) fn new(kind: ExprKind) -> Self {
        Expr {
            kind,
            marker: PhantomData,
        }
    }

    pub(crate) fn column(source: SourceId, name: &str) -> Self {
        Expr::new(ExprKind::Column {
            source,
            name: name.to_string(),
        })
    }

    /// Reinterprets the node under a different static type. Used by the
    /// optional combinators, which rely on SQL null-propagation.
    pub(crate) fn retyped<U>(self) -> Expr<U> {
        Expr::new(self.kind)
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }
}

impl<T: SqlType> Expr<T> {
    /// A literal, embedded as a parameter slot.
    pub fn lit(value: T) -> Self {
        Expr::new(ExprKind::param(T::TYPE_CODE, value.to_value()))
    }

    /// `CAST(expr AS <type>)` with the dialect's cast keyword for `U`.
    pub fn cast<U: SqlType>(self) -> Expr<U> {
        Expr::new(ExprKind::Cast {
            expr: Box::new(self.kind),
            to: U::TYPE_CODE,
        })
    }
}

impl<T: SqlType> From<T> for Expr<T> {
    fn from(value: T) -> Self {
        Expr::lit(value)
    }
}

impl From<&str> for Expr<String> {
    fn from(value: &str) -> Self {
        Expr::lit(value.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_conjunction() {
        assert_eq!(ExprKind::conjunction(vec![]), None);

        let a = ExprKind::param(TypeCode::Boolean, SqlValue::Bool(true));
        assert_eq!(ExprKind::conjunction(vec![a.clone()]), Some(a.clone()));

        let b = ExprKind::param(TypeCode::Boolean, SqlValue::Bool(false));
        let both = ExprKind::conjunction(vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(both, ExprKind::binary(BinaryOp::And, a, b));
    }

    #[test]
    fn test_literal_param() {
        let e = Expr::lit(42i64);
        let param = e.kind().as_param().unwrap();
        assert_eq!(param.type_code, TypeCode::BigInt);
        assert_eq!(param.value, SqlValue::Int(42));
    }
}
