//! `CASE WHEN` builder.

use super::{Expr, ExprKind};
use crate::types::SqlType;

/// Accumulates `(condition, value)` branches for a `CASE WHEN` expression.
///
/// ```ignore
/// case_when(p.price.clone().gt(100.0), "expensive")
///     .when(p.price.clone().gt(10.0), "mid")
///     .otherwise("cheap")
/// ```
pub struct CaseWhen<T> {
    branches: Vec<(ExprKind, ExprKind)>,
    marker: std::marker::PhantomData<fn() -> T>,
}

pub fn case_when<T: SqlType>(cond: Expr<bool>, then: impl Into<Expr<T>>) -> CaseWhen<T> {
    CaseWhen {
        branches: vec![(cond.kind, then.into().kind)],
        marker: std::marker::PhantomData,
    }
}

impl<T: SqlType> CaseWhen<T> {
    pub fn when(mut self, cond: Expr<bool>, then: impl Into<Expr<T>>) -> Self {
        self.branches.push((cond.kind, then.into().kind));
        self
    }

    /// Closes the expression with an `ELSE` branch.
    pub fn otherwise(self, default: impl Into<Expr<T>>) -> Expr<T> {
        Expr::new(ExprKind::Case {
            branches: self.branches,
            otherwise: Some(Box::new(default.into().kind)),
        })
    }

    /// Closes the expression without a default; missing matches yield NULL.
    pub fn end(self) -> Expr<Option<T>> {
        Expr::new(ExprKind::Case {
            branches: self.branches,
            otherwise: None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::query::SourceId;

    #[test]
    fn test_branches_accumulate() {
        let price: Expr<f64> = Expr::column(SourceId::next(), "price");
        let e = case_when(price.clone().gt(100.0), "expensive")
            .when(price.gt(10.0), "mid")
            .otherwise("cheap");
        let (branches, otherwise) = e.kind().as_case().unwrap();
        assert_eq!(branches.len(), 2);
        assert!(otherwise.is_some());
    }

    #[test]
    fn test_open_case_is_optional() {
        let price: Expr<f64> = Expr::column(SourceId::next(), "price");
        let e: Expr<Option<String>> = case_when(price.gt(100.0), "expensive").end();
        assert!(e.kind().as_case().unwrap().1.is_none());
    }
}
