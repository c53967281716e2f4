//! Typed DELETE builder.

use std::marker::PhantomData;

use crate::expr::Expr;
use crate::queryable::Queryable;
use crate::table::Table;

use super::{DeleteIr, DmlIr, Returning, SourceId};

pub struct Delete<T: Table> {
    pub(crate) ir: DeleteIr,
    marker: PhantomData<fn() -> T>,
}

impl<T: Table> Delete<T> {
    /// `DELETE FROM t WHERE pred`; a constant `true` predicate still
    /// renders `WHERE ?` with the boolean bound.
    pub fn new(pred: impl FnOnce(T::Expr) -> Expr<bool>) -> Self {
        let source = SourceId::next();
        let pred = pred(T::exprs(source));
        Delete {
            ir: DeleteIr {
                table: T::schema(),
                source,
                where_: vec![pred.kind],
                returning: None,
            },
            marker: PhantomData,
        }
    }

    pub fn ir(&self) -> &DeleteIr {
        &self.ir
    }

    pub fn filter(mut self, pred: impl FnOnce(T::Expr) -> Expr<bool>) -> Self {
        let pred = pred(T::exprs(self.ir.source));
        self.ir.where_.push(pred.kind);
        self
    }

    /// Dialect-gated `RETURNING expr-list`.
    pub fn returning<R: Queryable>(mut self, f: impl FnOnce(T::Expr) -> R) -> Returning<R> {
        let shape = f(T::exprs(self.ir.source));
        self.ir.returning = Some(shape.projection());
        Returning {
            dml: DmlIr::Delete(self.ir),
            shape,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::Table;

    crate::table! {
        table = "purchase";
        pub struct Purchase / PurchaseExpr / PurchaseCols {
            id: i64 [primary_key auto_increment],
            product_id: i64,
            count: i32,
        }
    }

    #[test]
    fn test_delete_predicate() {
        let delete = Purchase::delete(|p| p.count.eq(0));
        assert_eq!(delete.ir().where_.len(), 1);
        assert_eq!(delete.ir().table.name, "purchase");
    }
}
