//! Comparison, boolean, numeric, optional and aggregate operations.

use std::ops;

use super::{AggFunc, BinaryOp, Expr, ExprKind, UnaryOp};
use crate::types::{SqlIntegral, SqlNumeric, SqlType};

// ---------------------------------------------------------------------------
// comparisons

impl<T: SqlType> Expr<T> {
    pub fn eq(self, other: impl Into<Expr<T>>) -> Expr<bool> {
        self.cmp(BinaryOp::Eq, other)
    }

    pub fn ne(self, other: impl Into<Expr<T>>) -> Expr<bool> {
        self.cmp(BinaryOp::NotEq, other)
    }

    pub fn lt(self, other: impl Into<Expr<T>>) -> Expr<bool> {
        self.cmp(BinaryOp::Lt, other)
    }

    pub fn le(self, other: impl Into<Expr<T>>) -> Expr<bool> {
        self.cmp(BinaryOp::LtEq, other)
    }

    pub fn gt(self, other: impl Into<Expr<T>>) -> Expr<bool> {
        self.cmp(BinaryOp::Gt, other)
    }

    pub fn ge(self, other: impl Into<Expr<T>>) -> Expr<bool> {
        self.cmp(BinaryOp::GtEq, other)
    }

    fn cmp(self, op: BinaryOp, other: impl Into<Expr<T>>) -> Expr<bool> {
        Expr::new(ExprKind::binary(op, self.kind, other.into().kind))
    }

    pub fn between(self, low: impl Into<Expr<T>>, high: impl Into<Expr<T>>) -> Expr<bool> {
        Expr::new(ExprKind::Between {
            expr: Box::new(self.kind),
            low: Box::new(low.into().kind),
            high: Box::new(high.into().kind),
        })
    }

    /// `MIN(expr)`; `NULL` on an empty group surfaces as a decoding error,
    /// use [Expr::min_opt] when the group may be empty.
    pub fn min(self) -> Expr<T> {
        Expr::new(ExprKind::Aggregate {
            func: AggFunc::Min,
            args: vec![self.kind],
        })
    }

    pub fn min_opt(self) -> Expr<Option<T>> {
        self.min().retyped()
    }

    pub fn max(self) -> Expr<T> {
        Expr::new(ExprKind::Aggregate {
            func: AggFunc::Max,
            args: vec![self.kind],
        })
    }

    pub fn max_opt(self) -> Expr<Option<T>> {
        self.max().retyped()
    }
}

// ---------------------------------------------------------------------------
// boolean

impl Expr<bool> {
    pub fn and(self, other: impl Into<Expr<bool>>) -> Expr<bool> {
        Expr::new(ExprKind::binary(BinaryOp::And, self.kind, other.into().kind))
    }

    pub fn or(self, other: impl Into<Expr<bool>>) -> Expr<bool> {
        Expr::new(ExprKind::binary(BinaryOp::Or, self.kind, other.into().kind))
    }

    pub fn not(self) -> Expr<bool> {
        Expr::new(ExprKind::Unary {
            op: UnaryOp::Not,
            expr: Box::new(self.kind),
        })
    }
}

impl ops::Not for Expr<bool> {
    type Output = Expr<bool>;

    fn not(self) -> Expr<bool> {
        Expr::not(self)
    }
}

// ---------------------------------------------------------------------------
// numeric

impl<T: SqlNumeric> Expr<T> {
    pub fn abs(self) -> Expr<T> {
        Expr::new(ExprKind::func("ABS", vec![self.kind]))
    }

    pub fn ceil(self) -> Expr<T> {
        Expr::new(ExprKind::func("CEIL", vec![self.kind]))
    }

    pub fn floor(self) -> Expr<T> {
        Expr::new(ExprKind::func("FLOOR", vec![self.kind]))
    }

    pub fn sum(self) -> Expr<T> {
        Expr::new(ExprKind::Aggregate {
            func: AggFunc::Sum,
            args: vec![self.kind],
        })
    }

    pub fn sum_opt(self) -> Expr<Option<T>> {
        self.sum().retyped()
    }

    pub fn avg(self) -> Expr<T> {
        Expr::new(ExprKind::Aggregate {
            func: AggFunc::Avg,
            args: vec![self.kind],
        })
    }

    pub fn avg_opt(self) -> Expr<Option<T>> {
        self.avg().retyped()
    }
}

impl<T: SqlIntegral> Expr<T> {
    /// Integer modulo; spelled `%` or `MOD(_, _)` by the dialect.
    pub fn modulo(self, other: impl Into<Expr<T>>) -> Expr<T> {
        Expr::new(ExprKind::binary(BinaryOp::Mod, self.kind, other.into().kind))
    }

    pub fn bit_not(self) -> Expr<T> {
        Expr::new(ExprKind::Unary {
            op: UnaryOp::BitNot,
            expr: Box::new(self.kind),
        })
    }
}

/// Controls how `+` renders for a scalar type: arithmetic addition for
/// numerics, concatenation for strings.
pub trait SqlAdd: SqlType {
    fn add_kind(left: ExprKind, right: ExprKind) -> ExprKind;
}

impl SqlAdd for i16 {
    fn add_kind(left: ExprKind, right: ExprKind) -> ExprKind {
        ExprKind::binary(BinaryOp::Add, left, right)
    }
}

impl SqlAdd for i32 {
    fn add_kind(left: ExprKind, right: ExprKind) -> ExprKind {
        ExprKind::binary(BinaryOp::Add, left, right)
    }
}

impl SqlAdd for i64 {
    fn add_kind(left: ExprKind, right: ExprKind) -> ExprKind {
        ExprKind::binary(BinaryOp::Add, left, right)
    }
}

impl SqlAdd for f64 {
    fn add_kind(left: ExprKind, right: ExprKind) -> ExprKind {
        ExprKind::binary(BinaryOp::Add, left, right)
    }
}

impl SqlAdd for String {
    fn add_kind(left: ExprKind, right: ExprKind) -> ExprKind {
        // flatten nested concats so the dialect can emit one CONCAT(..)
        let mut parts = match left {
            ExprKind::Concat(parts) => parts,
            other => vec![other],
        };
        match right {
            ExprKind::Concat(more) => parts.extend(more),
            other => parts.push(other),
        }
        ExprKind::Concat(parts)
    }
}

impl<T: SqlAdd, R: Into<Expr<T>>> ops::Add<R> for Expr<T> {
    type Output = Expr<T>;

    fn add(self, rhs: R) -> Expr<T> {
        Expr::new(T::add_kind(self.kind, rhs.into().kind))
    }
}

impl<T: SqlNumeric, R: Into<Expr<T>>> ops::Sub<R> for Expr<T> {
    type Output = Expr<T>;

    fn sub(self, rhs: R) -> Expr<T> {
        Expr::new(ExprKind::binary(BinaryOp::Sub, self.kind, rhs.into().kind))
    }
}

impl<T: SqlNumeric, R: Into<Expr<T>>> ops::Mul<R> for Expr<T> {
    type Output = Expr<T>;

    fn mul(self, rhs: R) -> Expr<T> {
        Expr::new(ExprKind::binary(BinaryOp::Mul, self.kind, rhs.into().kind))
    }
}

impl<T: SqlNumeric, R: Into<Expr<T>>> ops::Div<R> for Expr<T> {
    type Output = Expr<T>;

    fn div(self, rhs: R) -> Expr<T> {
        Expr::new(ExprKind::binary(BinaryOp::Div, self.kind, rhs.into().kind))
    }
}

impl<T: SqlIntegral, R: Into<Expr<T>>> ops::Rem<R> for Expr<T> {
    type Output = Expr<T>;

    fn rem(self, rhs: R) -> Expr<T> {
        self.modulo(rhs)
    }
}

impl<T: SqlIntegral, R: Into<Expr<T>>> ops::BitAnd<R> for Expr<T> {
    type Output = Expr<T>;

    fn bitand(self, rhs: R) -> Expr<T> {
        Expr::new(ExprKind::binary(
            BinaryOp::BitAnd,
            self.kind,
            rhs.into().kind,
        ))
    }
}

impl<T: SqlIntegral, R: Into<Expr<T>>> ops::BitOr<R> for Expr<T> {
    type Output = Expr<T>;

    fn bitor(self, rhs: R) -> Expr<T> {
        Expr::new(ExprKind::binary(
            BinaryOp::BitOr,
            self.kind,
            rhs.into().kind,
        ))
    }
}

impl<T: SqlIntegral, R: Into<Expr<T>>> ops::BitXor<R> for Expr<T> {
    type Output = Expr<T>;

    fn bitxor(self, rhs: R) -> Expr<T> {
        Expr::new(ExprKind::binary(
            BinaryOp::BitXor,
            self.kind,
            rhs.into().kind,
        ))
    }
}

impl<T: SqlNumeric> ops::Neg for Expr<T> {
    type Output = Expr<T>;

    fn neg(self) -> Expr<T> {
        Expr::new(ExprKind::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(self.kind),
        })
    }
}

// ---------------------------------------------------------------------------
// optionals

impl<T: SqlType> Expr<Option<T>> {
    pub fn is_defined(self) -> Expr<bool> {
        Expr::new(ExprKind::IsNull {
            expr: Box::new(self.kind),
            negated: true,
        })
    }

    pub fn is_empty(self) -> Expr<bool> {
        Expr::new(ExprKind::IsNull {
            expr: Box::new(self.kind),
            negated: false,
        })
    }

    /// Null-safe equality: matches when both sides are NULL, or both are
    /// equal. Plain [Expr::eq] keeps SQL's three-valued semantics.
    pub fn null_eq(self, other: impl Into<Expr<Option<T>>>) -> Expr<bool> {
        Expr::new(ExprKind::NullSafeEq {
            left: Box::new(self.kind),
            right: Box::new(other.into().kind),
            negated: false,
        })
    }

    pub fn null_ne(self, other: impl Into<Expr<Option<T>>>) -> Expr<bool> {
        Expr::new(ExprKind::NullSafeEq {
            left: Box::new(self.kind),
            right: Box::new(other.into().kind),
            negated: true,
        })
    }

    /// Applies `f` under SQL null-propagation: NULL in, NULL out.
    pub fn map<U: SqlType>(self, f: impl FnOnce(Expr<T>) -> Expr<U>) -> Expr<Option<U>> {
        f(self.retyped()).retyped()
    }

    pub fn flat_map<U: SqlType>(
        self,
        f: impl FnOnce(Expr<T>) -> Expr<Option<U>>,
    ) -> Expr<Option<U>> {
        f(self.retyped())
    }

    /// `COALESCE(expr, default)`.
    pub fn get_or_else(self, default: impl Into<Expr<T>>) -> Expr<T> {
        Expr::new(ExprKind::func(
            "COALESCE",
            vec![self.kind, default.into().kind],
        ))
    }

    pub fn or_else(self, other: impl Into<Expr<Option<T>>>) -> Expr<Option<T>> {
        Expr::new(ExprKind::func(
            "COALESCE",
            vec![self.kind, other.into().kind],
        ))
    }

    /// `CASE WHEN pred THEN expr ELSE NULL END`.
    pub fn filter(self, pred: impl FnOnce(Expr<T>) -> Expr<bool>) -> Expr<Option<T>> {
        let cond = pred(Expr::new(self.kind.clone()));
        Expr::new(ExprKind::Case {
            branches: vec![(cond.kind, self.kind)],
            otherwise: None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::query::SourceId;
    use crate::types::{SqlValue, TypeCode};

    fn col(name: &str) -> Expr<i64> {
        Expr::column(SourceId::next(), name)
    }

    #[test]
    fn test_comparison_kinds() {
        let e = col("price").gt(10i64);
        let (op, _, right) = e.kind().as_binary().unwrap();
        assert_eq!(*op, BinaryOp::Gt);
        assert_eq!(
            right.as_param().unwrap().value,
            SqlValue::Int(10),
            "rhs literal becomes a parameter slot"
        );
    }

    #[test]
    fn test_operators() {
        let e = col("a") + col("b") * col("c");
        let (op, _, right) = e.kind().as_binary().unwrap();
        assert_eq!(*op, BinaryOp::Add);
        assert_eq!(*right.as_binary().unwrap().0, BinaryOp::Mul);
    }

    #[test]
    fn test_concat_flattens() {
        let s = |v: &str| Expr::<String>::lit(v.to_string());
        let e = s("a") + s("b") + s("c");
        assert_eq!(e.kind().as_concat().unwrap().len(), 3);
    }

    #[test]
    fn test_null_safe_eq_on_none() {
        let e: Expr<Option<i64>> = Expr::column(SourceId::next(), "my_int");
        let pred = e.null_eq(None);
        let (_, right, negated) = pred.kind().as_null_safe_eq().unwrap();
        assert!(!negated);
        assert_eq!(right.as_param().unwrap().value, SqlValue::Null);
        assert_eq!(right.as_param().unwrap().type_code, TypeCode::BigInt);
    }

    #[test]
    fn test_optional_map_keeps_inner_kind() {
        let e: Expr<Option<i64>> = Expr::column(SourceId::next(), "my_int");
        let mapped = e.map(|v| v + 1i64);
        assert!(mapped.kind().is_binary());
    }
}
