//! String operations.

use super::{AggFunc, Expr, ExprKind};
use crate::types::{SqlValue, TypeCode};

impl Expr<String> {
    pub fn like(self, pattern: impl Into<Expr<String>>) -> Expr<bool> {
        Expr::new(ExprKind::Like {
            expr: Box::new(self.kind),
            pattern: Box::new(pattern.into().kind),
        })
    }

    /// `LIKE` with `%` appended to the parameter.
    pub fn starts_with(self, prefix: &str) -> Expr<bool> {
        self.like(format!("{prefix}%"))
    }

    /// `LIKE` with `%` prepended to the parameter.
    pub fn ends_with(self, suffix: &str) -> Expr<bool> {
        self.like(format!("%{suffix}"))
    }

    /// `LIKE` with `%` wrapping the parameter.
    pub fn contains_str(self, needle: &str) -> Expr<bool> {
        self.like(format!("%{needle}%"))
    }

    /// Character length.
    pub fn length(self) -> Expr<i64> {
        Expr::new(ExprKind::func("LENGTH", vec![self.kind]))
    }

    /// Byte length.
    pub fn octet_length(self) -> Expr<i64> {
        Expr::new(ExprKind::func("OCTET_LENGTH", vec![self.kind]))
    }

    /// 1-based position of `needle`, 0 when absent. Dialect picks
    /// `POSITION(needle IN expr)` or `INSTR(expr, needle)`.
    pub fn index_of(self, needle: impl Into<Expr<String>>) -> Expr<i64> {
        Expr::new(ExprKind::IndexOf {
            haystack: Box::new(self.kind),
            needle: Box::new(needle.into().kind),
        })
    }

    pub fn to_lowercase(self) -> Expr<String> {
        Expr::new(ExprKind::func("LOWER", vec![self.kind]))
    }

    pub fn to_uppercase(self) -> Expr<String> {
        Expr::new(ExprKind::func("UPPER", vec![self.kind]))
    }

    pub fn trim(self) -> Expr<String> {
        Expr::new(ExprKind::func("TRIM", vec![self.kind]))
    }

    pub fn ltrim(self) -> Expr<String> {
        Expr::new(ExprKind::func("LTRIM", vec![self.kind]))
    }

    pub fn rtrim(self) -> Expr<String> {
        Expr::new(ExprKind::func("RTRIM", vec![self.kind]))
    }

    /// Two-argument trim: strips any of `chars` from the left.
    pub fn ltrim_chars(self, chars: impl Into<Expr<String>>) -> Expr<String> {
        Expr::new(ExprKind::func("LTRIM", vec![self.kind, chars.into().kind]))
    }

    /// Two-argument trim: strips any of `chars` from the right.
    pub fn rtrim_chars(self, chars: impl Into<Expr<String>>) -> Expr<String> {
        Expr::new(ExprKind::func("RTRIM", vec![self.kind, chars.into().kind]))
    }

    /// `SUBSTRING(expr, start, length)`, `start` is 1-based.
    pub fn substring(self, start: impl Into<Expr<i32>>, length: impl Into<Expr<i32>>) -> Expr<String> {
        Expr::new(ExprKind::func(
            "SUBSTRING",
            vec![self.kind, start.into().kind, length.into().kind],
        ))
    }

    pub fn lpad(self, length: impl Into<Expr<i32>>, pad: impl Into<Expr<String>>) -> Expr<String> {
        Expr::new(ExprKind::func(
            "LPAD",
            vec![self.kind, length.into().kind, pad.into().kind],
        ))
    }

    pub fn rpad(self, length: impl Into<Expr<i32>>, pad: impl Into<Expr<String>>) -> Expr<String> {
        Expr::new(ExprKind::func(
            "RPAD",
            vec![self.kind, length.into().kind, pad.into().kind],
        ))
    }

    /// Unsupported on SQLite; the renderer reports it.
    pub fn reverse(self) -> Expr<String> {
        Expr::new(ExprKind::func("REVERSE", vec![self.kind]))
    }

    /// Aggregate concatenation with a separator; spelled `STRING_AGG`,
    /// `GROUP_CONCAT` or `LISTAGG` by the dialect.
    pub fn mk_string(self, sep: &str) -> Expr<String> {
        Expr::new(ExprKind::Aggregate {
            func: AggFunc::StringAgg,
            args: vec![
                self.kind,
                ExprKind::param(TypeCode::Varchar, SqlValue::Text(sep.to_string())),
            ],
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::query::SourceId;

    fn name() -> Expr<String> {
        Expr::column(SourceId::next(), "name")
    }

    #[test]
    fn test_contains_wraps_parameter() {
        let e = name().contains_str("oo");
        let (_, pattern) = e.kind().as_like().unwrap();
        assert_eq!(
            pattern.as_param().unwrap().value,
            SqlValue::Text("%oo%".to_string())
        );
    }

    #[test]
    fn test_starts_with() {
        let e = name().starts_with("Gui");
        let (_, pattern) = e.kind().as_like().unwrap();
        assert_eq!(
            pattern.as_param().unwrap().value,
            SqlValue::Text("Gui%".to_string())
        );
    }
}
