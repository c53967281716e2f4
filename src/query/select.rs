//! The select composition algebra.
//!
//! Each combinator returns a new [Select], normalizing the IR as it goes:
//! stacked filters conjoin, stacked limits take the minimum, offsets sum,
//! and operations that would change the meaning of an already-shaped query
//! (sorting a limited select, mapping a distinct one, filtering a compound)
//! first wrap it as a subquery reference.

use crate::expr::{AggFunc, Expr, ExprKind};
use crate::queryable::{Nullable, Queryable};
use crate::table::Table;
use crate::types::SqlType;
use crate::utils::OrMap;

use super::prune::prune_subqueries;
use super::{
    CompoundSelect, FromKind, FromSource, GroupBy, Join, JoinSide, NullsOrder, OrderBy, SelectIr,
    SetOp, SimpleSelect, SortDirection, SourceId,
};

/// A composable select producing rows of shape `Q`.
#[derive(Debug, Clone)]
pub struct Select<Q: Queryable> {
    pub(crate) ir: SelectIr,
    pub(crate) shape: Q,
}

impl<Q: Queryable> Select<Q> {
    pub fn from_table<T: Table<Expr = Q>>() -> Self {
        let id = SourceId::next();
        let shape = T::exprs(id);
        let from = FromSource {
            id,
            kind: FromKind::Table(T::schema()),
        };
        Select {
            ir: SelectIr::Simple(SimpleSelect::new(shape.projection(), from)),
            shape,
        }
    }

    pub(crate) fn raw(ir: SelectIr, shape: Q) -> Self {
        Select { ir, shape }
    }

    pub fn ir(&self) -> &SelectIr {
        &self.ir
    }

    pub(crate) fn shape(&self) -> &Q {
        &self.shape
    }

    /// Wraps the current query as a subquery reference and returns the
    /// enclosing simple select with the shape rebound onto it.
    fn wrap(self) -> (SimpleSelect, Q) {
        let id = SourceId::next();
        let shape = self.shape.rebound(id);
        let from = FromSource {
            id,
            kind: FromKind::Subquery(Box::new(self.ir)),
        };
        (SimpleSelect::new(shape.projection(), from), shape)
    }

    /// The query as a simple select: usable on either side of a set
    /// operator, or open to new from-sources and filters. Compounds wrap.
    fn into_simple(self) -> (SimpleSelect, Q) {
        match self.ir {
            SelectIr::Simple(simple) => (simple, self.shape),
            SelectIr::Compound(compound) => {
                Select::raw(SelectIr::Compound(compound), self.shape).wrap()
            }
        }
    }

    /// Appends a predicate: to WHERE on a plain select, to HAVING once the
    /// select is grouped, and onto a wrapping subquery for compounds.
    pub fn filter(self, f: impl FnOnce(Q) -> Expr<bool>) -> Self {
        match self.ir {
            SelectIr::Simple(mut simple) => {
                let pred = f(self.shape.clone()).kind;
                match &mut simple.group_by {
                    Some(group) => group.having.push(pred),
                    None => simple.where_.push(pred),
                }
                Select::raw(SelectIr::Simple(simple), self.shape)
            }
            SelectIr::Compound(compound) => {
                let (mut simple, shape) =
                    Select::raw(SelectIr::Compound(compound), self.shape).wrap();
                simple.where_.push(f(shape.clone()).kind);
                Select::raw(SelectIr::Simple(simple), shape)
            }
        }
    }

    /// Replaces the projection. Wraps first when the current select's
    /// grouping, distinctness or set operations would be disturbed.
    pub fn map<Q2: Queryable>(self, f: impl FnOnce(Q) -> Q2) -> Select<Q2> {
        match self.ir {
            SelectIr::Simple(simple) if simple.group_by.is_none() && !simple.distinct => {
                let shape = f(self.shape);
                let mut simple = simple;
                simple.projection = shape.projection();
                Select::raw(SelectIr::Simple(simple), shape)
            }
            SelectIr::Simple(simple) => {
                let (simple, inner_shape) =
                    Select::raw(SelectIr::Simple(simple), self.shape).wrap();
                Select::mapped_over(simple, inner_shape, f)
            }
            SelectIr::Compound(compound)
                if compound.ops.is_empty()
                    && compound.lhs.group_by.is_none()
                    && !compound.lhs.distinct =>
            {
                // projection replacement is 1:1; ordering and row bounds
                // keep their meaning, and order keys still resolve against
                // the unchanged from-sources
                let shape = f(self.shape);
                let mut compound = compound;
                compound.lhs.projection = shape.projection();
                Select::raw(SelectIr::Compound(compound), shape)
            }
            SelectIr::Compound(compound) => {
                let (simple, inner_shape) =
                    Select::raw(SelectIr::Compound(compound), self.shape).wrap();
                Select::mapped_over(simple, inner_shape, f)
            }
        }
    }

    fn mapped_over<Q2: Queryable>(
        mut simple: SimpleSelect,
        inner_shape: Q,
        f: impl FnOnce(Q) -> Q2,
    ) -> Select<Q2> {
        let shape = f(inner_shape);
        simple.projection = shape.projection();
        prune_subqueries(&mut simple);
        Select::raw(SelectIr::Simple(simple), shape)
    }

    /// Keeps at most `n` rows. Stacked takes keep the minimum.
    pub fn take(self, n: u64) -> Self {
        let mut compound = CompoundSelect::lift(self.ir);
        compound.limit = compound.limit.or_map(Some(n), u64::min);
        Select::raw(SelectIr::Compound(compound), self.shape)
    }

    /// Skips the first `n` rows. Stacked drops sum; a limit already set
    /// shrinks by the dropped count.
    pub fn drop(self, n: u64) -> Self {
        let mut compound = CompoundSelect::lift(self.ir);
        compound.offset = Some(compound.offset.unwrap_or(0) + n);
        compound.limit = compound.limit.map(|l| l.saturating_sub(n));
        Select::raw(SelectIr::Compound(compound), self.shape)
    }

    /// Prepends a sort key: the last-applied sort is the primary one.
    /// Sorting an already-limited query wraps it first.
    pub fn sort_by<E: SqlType>(self, f: impl FnOnce(Q) -> Expr<E>) -> Self {
        let (mut compound, shape) = match self.ir {
            SelectIr::Compound(c) if c.has_row_bounds() => {
                let (simple, shape) = Select::raw(SelectIr::Compound(c), self.shape).wrap();
                (CompoundSelect::of(simple), shape)
            }
            ir => (CompoundSelect::lift(ir), self.shape),
        };
        let key = OrderBy {
            expr: f(shape.clone()).kind,
            direction: None,
            nulls: None,
        };
        compound.order_by.insert(0, key);
        Select::raw(SelectIr::Compound(compound), shape)
    }

    /// Marks the most recently added sort key ascending.
    pub fn asc(self) -> Self {
        self.edit_last_sort(|key| key.direction = Some(SortDirection::Asc))
    }

    /// Marks the most recently added sort key descending.
    pub fn desc(self) -> Self {
        self.edit_last_sort(|key| key.direction = Some(SortDirection::Desc))
    }

    pub fn nulls_first(self) -> Self {
        self.edit_last_sort(|key| key.nulls = Some(NullsOrder::First))
    }

    pub fn nulls_last(self) -> Self {
        self.edit_last_sort(|key| key.nulls = Some(NullsOrder::Last))
    }

    fn edit_last_sort(mut self, f: impl FnOnce(&mut OrderBy)) -> Self {
        if let SelectIr::Compound(compound) = &mut self.ir {
            if let Some(key) = compound.order_by.first_mut() {
                f(key);
            }
        }
        self
    }

    /// `SELECT DISTINCT`. Forced into a wrapping subquery when the select
    /// is already grouped, sorted or limited.
    pub fn distinct(self) -> Self {
        match self.ir {
            SelectIr::Simple(mut simple) if simple.group_by.is_none() => {
                simple.distinct = true;
                Select::raw(SelectIr::Simple(simple), self.shape)
            }
            ir => {
                let (mut simple, shape) = Select::raw(ir, self.shape).wrap();
                simple.distinct = true;
                Select::raw(SelectIr::Simple(simple), shape)
            }
        }
    }

    fn join_with<Q2: Queryable>(
        self,
        other: Select<Q2>,
        side: JoinSide,
        on: impl FnOnce(Q, Q2) -> Expr<bool>,
    ) -> (SimpleSelect, Q, Q2) {
        let (mut simple, shape) = self.into_simple();
        let (source, other_shape) = other.into_join_source();
        let pred = on(shape.clone(), other_shape.clone());
        simple.joins.push(Join {
            side,
            source,
            on: pred.kind,
        });
        (simple, shape, other_shape)
    }

    /// This select as a join target: a plain table scan joins directly, any
    /// shaped query joins as a subquery reference.
    fn into_join_source(self) -> (FromSource, Q) {
        match self.ir {
            SelectIr::Simple(simple)
                if simple.is_inlineable() =>
            {
                (simple.from.into_iter().next().unwrap(), self.shape)
            }
            ir => {
                let id = SourceId::next();
                let shape = self.shape.rebound(id);
                (
                    FromSource {
                        id,
                        kind: FromKind::Subquery(Box::new(ir)),
                    },
                    shape,
                )
            }
        }
    }

    pub fn join<Q2: Queryable>(
        self,
        other: Select<Q2>,
        on: impl FnOnce(Q, Q2) -> Expr<bool>,
    ) -> Select<(Q, Q2)> {
        let (mut simple, a, b) = self.join_with(other, JoinSide::Inner, on);
        let shape = (a, b);
        simple.projection = shape.projection();
        Select::raw(SelectIr::Simple(simple), shape)
    }

    /// The right side of the result decodes to `None` for unmatched rows.
    pub fn left_join<Q2: Queryable>(
        self,
        other: Select<Q2>,
        on: impl FnOnce(Q, Q2) -> Expr<bool>,
    ) -> Select<(Q, Nullable<Q2>)> {
        let (mut simple, a, b) = self.join_with(other, JoinSide::Left, on);
        let shape = (a, Nullable(b));
        simple.projection = shape.projection();
        Select::raw(SelectIr::Simple(simple), shape)
    }

    pub fn right_join<Q2: Queryable>(
        self,
        other: Select<Q2>,
        on: impl FnOnce(Q, Q2) -> Expr<bool>,
    ) -> Select<(Nullable<Q>, Q2)> {
        let (mut simple, a, b) = self.join_with(other, JoinSide::Right, on);
        let shape = (Nullable(a), b);
        simple.projection = shape.projection();
        Select::raw(SelectIr::Simple(simple), shape)
    }

    /// FULL OUTER JOIN; emulated as LEFT JOIN ∪ RIGHT JOIN on dialects
    /// without it.
    pub fn outer_join<Q2: Queryable>(
        self,
        other: Select<Q2>,
        on: impl FnOnce(Q, Q2) -> Expr<bool>,
    ) -> Select<(Nullable<Q>, Nullable<Q2>)> {
        let (mut simple, a, b) = self.join_with(other, JoinSide::Full, on);
        let shape = (Nullable(a), Nullable(b));
        simple.projection = shape.projection();
        Select::raw(SelectIr::Simple(simple), shape)
    }

    /// Monadic composition: the inner query's sources fold into this one as
    /// a comma cross join, with any correlation living in WHERE.
    pub fn flat_map<Q2: Queryable>(self, f: impl FnOnce(Q) -> Select<Q2>) -> Select<Q2> {
        let (mut simple, shape) = self.into_simple();
        let inner = f(shape);
        match inner.ir {
            SelectIr::Simple(other)
                if other.group_by.is_none() && !other.distinct =>
            {
                simple.from.extend(other.from);
                simple.joins.extend(other.joins);
                simple.where_.extend(other.where_);
                simple.projection = inner.shape.projection();
                Select::raw(SelectIr::Simple(simple), inner.shape)
            }
            ir => {
                let id = SourceId::next();
                let inner_shape = inner.shape.rebound(id);
                simple.from.push(FromSource {
                    id,
                    kind: FromKind::Subquery(Box::new(ir)),
                });
                simple.projection = inner_shape.projection();
                Select::raw(SelectIr::Simple(simple), inner_shape)
            }
        }
    }

    fn compound(self, op: SetOp, other: Select<Q>) -> Self {
        let (mut compound, shape) = match self.ir {
            SelectIr::Simple(simple) => (CompoundSelect::of(simple), self.shape),
            SelectIr::Compound(c) if c.order_by.is_empty() && !c.has_row_bounds() => {
                (c, self.shape)
            }
            SelectIr::Compound(c) => {
                let (simple, shape) = Select::raw(SelectIr::Compound(c), self.shape).wrap();
                (CompoundSelect::of(simple), shape)
            }
        };
        let (rhs, _) = other.into_simple();
        compound.ops.push((op, rhs));
        Select::raw(SelectIr::Compound(compound), shape)
    }

    pub fn union(self, other: Select<Q>) -> Self {
        self.compound(SetOp::Union, other)
    }

    pub fn union_all(self, other: Select<Q>) -> Self {
        self.compound(SetOp::UnionAll, other)
    }

    pub fn intersect(self, other: Select<Q>) -> Self {
        self.compound(SetOp::Intersect, other)
    }

    pub fn except(self, other: Select<Q>) -> Self {
        self.compound(SetOp::Except, other)
    }

    /// Groups by `key` and projects `(key, aggregates)`. A `filter` applied
    /// afterwards lands in HAVING.
    pub fn group_by<K: Queryable, A: Queryable>(
        self,
        key: impl FnOnce(Q) -> K,
        agg: impl FnOnce(Q) -> A,
    ) -> Select<(K, A)> {
        let (mut simple, shape) = match self.ir {
            SelectIr::Simple(simple) if simple.group_by.is_none() && !simple.distinct => {
                (simple, self.shape)
            }
            ir => Select::raw(ir, self.shape).wrap(),
        };
        let key_shape = key(shape.clone());
        let agg_shape = agg(shape);
        let keys = key_shape
            .projection()
            .into_iter()
            .map(|c| c.expr)
            .collect();
        let shape = (key_shape, agg_shape);
        simple.projection = shape.projection();
        simple.group_by = Some(GroupBy {
            keys,
            having: Vec::new(),
        });
        prune_subqueries(&mut simple);
        Select::raw(SelectIr::Simple(simple), shape)
    }

    /// Collapses the query to a single row of aggregates.
    pub fn aggregate<A: Queryable>(self, f: impl FnOnce(Q) -> A) -> Select<A> {
        match self.ir {
            SelectIr::Simple(mut simple)
                if simple.group_by.is_none() && !simple.distinct =>
            {
                let shape = f(self.shape);
                simple.projection = shape.projection();
                Select::raw(SelectIr::Simple(simple), shape)
            }
            ir => {
                let (simple, inner_shape) = Select::raw(ir, self.shape).wrap();
                Select::mapped_over(simple, inner_shape, f)
            }
        }
    }

    /// `COUNT(1)` over the query's rows.
    pub fn count(self) -> Select<Expr<i64>> {
        self.aggregate(|_| {
            Expr::new(ExprKind::Aggregate {
                func: AggFunc::Count,
                args: Vec::new(),
            })
        })
    }

    /// `EXISTS (…)`.
    pub fn exists(self) -> Expr<bool> {
        Expr::new(ExprKind::Exists {
            query: Box::new(self.ir),
            negated: false,
        })
    }

    pub fn is_empty(self) -> Expr<bool> {
        Expr::new(ExprKind::Exists {
            query: Box::new(self.ir),
            negated: true,
        })
    }
}

impl<T: SqlType> Select<Expr<T>> {
    /// `value IN (…)` against this single-column query.
    pub fn contains(self, value: impl Into<Expr<T>>) -> Expr<bool> {
        Expr::new(ExprKind::InSubquery {
            expr: Box::new(value.into().kind),
            query: Box::new(self.ir),
        })
    }

    /// The query as a scalar subquery expression. The select must produce
    /// one column and at most one row (e.g. an aggregate).
    pub fn to_expr(self) -> Expr<T> {
        Expr::new(ExprKind::ScalarSubquery(Box::new(self.ir)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Table;

    crate::table! {
        table = "product";
        pub struct Product / ProductExpr / ProductCols {
            id: i64 [primary_key auto_increment],
            kebab_case_name: String,
            name: String,
            price: f64,
        }
    }

    #[test]
    fn test_filters_conjoin_in_where() {
        let q = Product::select()
            .filter(|p| p.price.gt(1.0))
            .filter(|p| p.name.eq("Socks"));
        let simple = q.ir().as_simple().unwrap();
        assert_eq!(simple.where_.len(), 2);
        assert!(simple.group_by.is_none());
    }

    #[test]
    fn test_filter_after_group_goes_to_having() {
        let q = Product::select()
            .group_by(|p| p.kebab_case_name, |p| p.price.sum())
            .filter(|(_, total)| total.gt(10.0));
        let group = q.ir().as_simple().unwrap().group_by.as_ref().unwrap();
        assert_eq!(group.having.len(), 1);
    }

    #[test]
    fn test_take_take_keeps_min() {
        let q = Product::select().take(5).take(3);
        assert_eq!(q.ir().as_compound().unwrap().limit, Some(3));

        let q = Product::select().take(2).take(7);
        assert_eq!(q.ir().as_compound().unwrap().limit, Some(2));
    }

    #[test]
    fn test_drop_drop_sums() {
        let q = Product::select().drop(2).drop(3);
        let c = q.ir().as_compound().unwrap();
        assert_eq!(c.offset, Some(5));
        assert_eq!(c.limit, None);
    }

    #[test]
    fn test_take_then_drop_shrinks_limit() {
        let q = Product::select().take(2).drop(1);
        let c = q.ir().as_compound().unwrap();
        assert_eq!(c.limit, Some(1));
        assert_eq!(c.offset, Some(1));
    }

    #[test]
    fn test_drop_then_take() {
        let q = Product::select().drop(4).take(3);
        let c = q.ir().as_compound().unwrap();
        assert_eq!(c.limit, Some(3));
        assert_eq!(c.offset, Some(4));
    }

    #[test]
    fn test_last_sort_is_primary() {
        let q = Product::select()
            .sort_by(|p| p.price)
            .asc()
            .sort_by(|p| p.name)
            .desc();
        let c = q.ir().as_compound().unwrap();
        assert_eq!(c.order_by.len(), 2);
        assert_eq!(c.order_by[0].direction, Some(SortDirection::Desc));
        assert_eq!(c.order_by[1].direction, Some(SortDirection::Asc));
    }

    #[test]
    fn test_filter_on_compound_wraps() {
        let q = Product::select().take(10).filter(|p| p.price.gt(1.0));
        let simple = q.ir().as_simple().unwrap();
        assert!(simple.from[0].kind.is_subquery());
        assert_eq!(simple.where_.len(), 1);
    }

    #[test]
    fn test_sort_after_limit_wraps() {
        let q = Product::select().take(3).sort_by(|p| p.price);
        let c = q.ir().as_compound().unwrap();
        assert!(c.lhs.from[0].kind.is_subquery());
        assert_eq!(c.limit, None);
    }

    #[test]
    fn test_map_on_sorted_select_stays_flat() {
        let q = Product::select().sort_by(|p| p.price).map(|p| p.name);
        let c = q.ir().as_compound().unwrap();
        assert!(c.lhs.from[0].kind.is_table());
        assert_eq!(c.lhs.projection.len(), 1);
        assert_eq!(c.order_by.len(), 1);
    }

    #[test]
    fn test_union_chains_left_to_right() {
        let names = |q: Select<ProductExpr>| q.map(|p| p.name);
        let q = names(Product::select())
            .union(names(Product::select()))
            .union_all(names(Product::select()));
        let c = q.ir().as_compound().unwrap();
        assert_eq!(c.ops.len(), 2);
        assert_eq!(c.ops[0].0, SetOp::Union);
        assert_eq!(c.ops[1].0, SetOp::UnionAll);
    }

    #[test]
    fn test_aggregate_over_union_prunes_unused() {
        let q = Product::select()
            .union(Product::select())
            .aggregate(|p| p.price.sum());
        let simple = q.ir().as_simple().unwrap();
        let inner = simple.from[0].kind.as_subquery().unwrap();
        let c = inner.as_compound().unwrap();
        assert_eq!(c.lhs.projection.len(), 1);
        assert_eq!(c.lhs.projection[0].alias(), "res__price");
        assert_eq!(c.ops[0].1.projection.len(), 1);
    }

    #[test]
    fn test_aggregate_over_except_retains_all() {
        let q = Product::select()
            .except(Product::select())
            .aggregate(|p| p.price.sum());
        let simple = q.ir().as_simple().unwrap();
        let inner = simple.from[0].kind.as_subquery().unwrap();
        let c = inner.as_compound().unwrap();
        assert_eq!(c.lhs.projection.len(), 4);
        assert_eq!(c.ops[0].1.projection.len(), 4);
    }

    #[test]
    fn test_join_table_is_inlined() {
        let q = Product::select().join(Product::select(), |a, b| a.id.eq(b.id));
        let simple = q.ir().as_simple().unwrap();
        assert_eq!(simple.joins.len(), 1);
        assert!(simple.joins[0].source.kind.is_table());
    }

    #[test]
    fn test_join_shaped_query_becomes_subquery() {
        let q = Product::select().join(Product::select().take(1), |a, b| a.id.eq(b.id));
        let simple = q.ir().as_simple().unwrap();
        assert!(simple.joins[0].source.kind.is_subquery());
    }

    #[test]
    fn test_flat_map_comma_joins() {
        let q = Product::select().flat_map(|a| {
            Product::select()
                .filter({
                    let id = a.id.clone();
                    move |b| b.id.gt(id)
                })
                .map(move |b| (a, b))
        });
        let simple = q.ir().as_simple().unwrap();
        assert_eq!(simple.from.len(), 2);
        assert!(simple.joins.is_empty());
        assert_eq!(simple.where_.len(), 1, "correlation folded into WHERE");
    }
}
