//! Typed UPDATE builder.

use std::marker::PhantomData;

use crate::expr::Expr;
use crate::queryable::Queryable;
use crate::table::Table;

use super::{DmlIr, Join, JoinSide, Returning, Select, SourceId, UpdateIr};

/// Holds the predicate until `set` supplies the assignments. A constant
/// `true` predicate still renders `WHERE ?` with the boolean bound.
pub struct UpdateBuilder<T: Table> {
    source: SourceId,
    where_: Vec<crate::expr::ExprKind>,
    marker: PhantomData<fn() -> T>,
}

impl<T: Table> UpdateBuilder<T> {
    pub fn new(pred: impl FnOnce(T::Expr) -> Expr<bool>) -> Self {
        let source = SourceId::next();
        let pred = pred(T::exprs(source));
        UpdateBuilder {
            source,
            where_: vec![pred.kind],
            marker: PhantomData,
        }
    }

    pub fn set(self, f: impl FnOnce(T::Assign) -> Vec<super::Assignment>) -> Update<T> {
        Update {
            ir: UpdateIr {
                table: T::schema(),
                source: self.source,
                assignments: f(T::cols()),
                joins: Vec::new(),
                where_: self.where_,
                returning: None,
            },
            marker: PhantomData,
        }
    }
}

pub struct Update<T: Table> {
    pub(crate) ir: UpdateIr,
    marker: PhantomData<fn() -> T>,
}

impl<T: Table> Update<T> {
    pub fn ir(&self) -> &UpdateIr {
        &self.ir
    }

    /// Joins another relation into the update; on MySQL the SET column
    /// names are table-qualified when joins are present.
    pub fn join<Q2: Queryable>(
        mut self,
        other: Select<Q2>,
        on: impl FnOnce(T::Expr, Q2) -> Expr<bool>,
    ) -> Self {
        let (source, other_shape) = match other.ir {
            super::SelectIr::Simple(simple) if simple.is_inlineable() => {
                (simple.from.into_iter().next().unwrap(), other.shape)
            }
            ir => {
                let id = SourceId::next();
                let shape = other.shape.rebound(id);
                (
                    super::FromSource {
                        id,
                        kind: super::FromKind::Subquery(Box::new(ir)),
                    },
                    shape,
                )
            }
        };
        let pred = on(T::exprs(self.ir.source), other_shape);
        self.ir.joins.push(Join {
            side: JoinSide::Inner,
            source,
            on: pred.kind,
        });
        self
    }

    /// Appends a further predicate, conjoined with the existing ones.
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
            dml: DmlIr::Update(self.ir),
            shape,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::Table;

    crate::table! {
        table = "product";
        pub struct Product / ProductExpr / ProductCols {
            id: i64 [primary_key auto_increment],
            name: String,
            price: f64,
        }
    }

    #[test]
    fn test_update_collects_assignments_and_predicate() {
        let update =
            Product::update(|p| p.name.eq("Socks")).set(|c| vec![c.price.set(4.2)]);
        assert_eq!(update.ir().assignments.len(), 1);
        assert_eq!(update.ir().assignments[0].column, "price");
        assert_eq!(update.ir().where_.len(), 1);
    }

    #[test]
    fn test_constant_predicate_is_a_parameter() {
        let update = Product::update(|_| crate::Expr::lit(true)).set(|c| vec![c.price.set(0.0)]);
        let pred = update.ir().where_[0].as_param().unwrap();
        assert_eq!(pred.value, crate::SqlValue::Bool(true));
    }

    #[test]
    fn test_joined_update() {
        let update = Product::update(|p| p.price.gt(10.0))
            .set(|c| vec![c.name.set("expensive")])
            .join(Product::select(), |a, b| a.id.eq(b.id));
        assert_eq!(update.ir().joins.len(), 1);
    }
}
