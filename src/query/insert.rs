//! Typed INSERT builders: single-row assignments, multi-row batches and
//! INSERT … SELECT, with dialect-gated RETURNING and on-conflict clauses.

use std::marker::PhantomData;

use crate::expr::ExprKind;
use crate::queryable::Queryable;
use crate::table::{Column, Table};
use crate::types::SqlType;

use super::{
    Assignment, ConflictAction, DmlIr, InsertIr, InsertSource, OnConflict, Returning, Select,
    SourceId,
};

/// A homogeneous list of column handles with the matching value tuple type.
/// Used by batched inserts, INSERT … SELECT targets and on-conflict keys.
pub trait ColumnList: Copy {
    type Values;

    fn names(&self) -> Vec<&'static str>;

    fn bind(&self, values: Self::Values) -> Vec<ExprKind>;
}

impl<A: SqlType> ColumnList for Column<A> {
    type Values = A;

    fn names(&self) -> Vec<&'static str> {
        vec![self.name()]
    }

    fn bind(&self, values: A) -> Vec<ExprKind> {
        vec![ExprKind::param(A::TYPE_CODE, values.to_value())]
    }
}

macro_rules! impl_column_list {
    ($( ($($name:ident),+) )+) => {
        $(
            #[allow(non_snake_case)]
            impl<$($name: SqlType),+> ColumnList for ($(Column<$name>,)+) {
                type Values = ($($name,)+);

                fn names(&self) -> Vec<&'static str> {
                    let ($($name,)+) = self;
                    vec![$($name.name()),+]
                }

                fn bind(&self, values: Self::Values) -> Vec<ExprKind> {
                    let ($($name,)+) = values;
                    vec![$(ExprKind::param(
                        <$name as SqlType>::TYPE_CODE,
                        $name.to_value(),
                    )),+]
                }
            }
        )+
    };
}

impl_column_list! {
    (A, B)
    (A, B, C)
    (A, B, C, D)
    (A, B, C, D, E)
    (A, B, C, D, E, F)
    (A, B, C, D, E, F, G)
    (A, B, C, D, E, F, G, H)
    (A, B, C, D, E, F, G, H, I)
    (A, B, C, D, E, F, G, H, I, J)
    (A, B, C, D, E, F, G, H, I, J, K)
    (A, B, C, D, E, F, G, H, I, J, K, L)
}

/// Entry point returned by [Table::insert].
pub struct InsertBuilder<T: Table> {
    marker: PhantomData<fn() -> T>,
}

impl<T: Table> InsertBuilder<T> {
    pub fn new() -> Self {
        InsertBuilder {
            marker: PhantomData,
        }
    }

    /// One row of `column = value` pairs. Unassigned columns are omitted,
    /// relying on database defaults and auto-increment.
    pub fn values(self, f: impl FnOnce(T::Assign) -> Vec<Assignment>) -> Insert<T> {
        let assignments = f(T::cols());
        let columns = assignments.iter().map(|a| a.column).collect();
        let row = assignments.into_iter().map(|a| a.value).collect();
        Insert::of(columns, InsertSource::Rows(vec![row]))
    }

    /// One multi-row VALUES clause; every tuple supplies the same columns.
    pub fn batched<C: ColumnList>(
        self,
        columns: impl FnOnce(T::Assign) -> C,
        rows: impl IntoIterator<Item = C::Values>,
    ) -> Insert<T> {
        let columns = columns(T::cols());
        let bound = rows.into_iter().map(|row| columns.bind(row)).collect();
        Insert::of(columns.names(), InsertSource::Rows(bound))
    }

    /// `INSERT INTO t (…) SELECT …` from the inner query.
    pub fn from_select<C, Q>(
        self,
        columns: impl FnOnce(T::Assign) -> C,
        select: Select<Q>,
    ) -> Insert<T>
    where
        C: ColumnList,
        Q: Queryable<Row = C::Values>,
    {
        let columns = columns(T::cols());
        Insert::of(
            columns.names(),
            InsertSource::Select(Box::new(select.ir)),
        )
    }
}

impl<T: Table> Default for InsertBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Insert<T: Table> {
    pub(crate) ir: InsertIr,
    marker: PhantomData<fn() -> T>,
}

impl<T: Table> Insert<T> {
    fn of(columns: Vec<&'static str>, values: InsertSource) -> Self {
        Insert {
            ir: InsertIr {
                table: T::schema(),
                source: SourceId::next(),
                columns,
                values,
                on_conflict: None,
                returning: None,
            },
            marker: PhantomData,
        }
    }

    pub fn ir(&self) -> &InsertIr {
        &self.ir
    }

    /// `ON CONFLICT (keys) DO NOTHING`. MySQL renders
    /// `ON DUPLICATE KEY UPDATE` with a no-op assignment instead.
    pub fn on_conflict_ignore<K: ColumnList>(
        mut self,
        keys: impl FnOnce(T::Assign) -> K,
    ) -> Self {
        self.ir.on_conflict = Some(OnConflict {
            keys: keys(T::cols()).names(),
            action: ConflictAction::Ignore,
        });
        self
    }

    /// `ON CONFLICT (keys) DO UPDATE SET …`; use [crate::excluded] to
    /// reference the incoming row in the assignments.
    pub fn on_conflict_update<K: ColumnList>(
        mut self,
        keys: impl FnOnce(T::Assign) -> K,
        set: impl FnOnce(T::Assign) -> Vec<Assignment>,
    ) -> Self {
        self.ir.on_conflict = Some(OnConflict {
            keys: keys(T::cols()).names(),
            action: ConflictAction::Update(set(T::cols())),
        });
        self
    }

    /// Dialect-gated `RETURNING expr-list`.
    pub fn returning<R: Queryable>(mut self, f: impl FnOnce(T::Expr) -> R) -> Returning<R> {
        let shape = f(T::exprs(self.ir.source));
        self.ir.returning = Some(shape.projection());
        Returning {
            dml: DmlIr::Insert(self.ir),
            shape,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Table;

    crate::table! {
        table = "buyer";
        pub struct Buyer / BuyerExpr / BuyerCols {
            id: i64 [primary_key auto_increment],
            name: String,
            date_of_birth: String,
        }
    }

    #[test]
    fn test_values_tracks_assigned_columns_only() {
        let insert = Buyer::insert().values(|c| vec![c.name.set("A"), c.date_of_birth.set("2001-04-07")]);
        assert_eq!(insert.ir().columns, ["name", "date_of_birth"]);
        let rows = insert.ir().values.as_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn test_batched_binds_row_tuples() {
        let insert = Buyer::insert().batched(
            |c| (c.name, c.date_of_birth),
            [
                ("A".to_string(), "2001-04-07".to_string()),
                ("B".to_string(), "2002-05-08".to_string()),
                ("C".to_string(), "2003-06-09".to_string()),
            ],
        );
        assert_eq!(insert.ir().columns, ["name", "date_of_birth"]);
        assert_eq!(insert.ir().values.as_rows().unwrap().len(), 3);
    }

    #[test]
    fn test_on_conflict_keys() {
        let insert = Buyer::insert()
            .values(|c| vec![c.name.set("A")])
            .on_conflict_ignore(|c| c.id);
        let conflict = insert.ir().on_conflict.as_ref().unwrap();
        assert_eq!(conflict.keys, ["id"]);
        assert!(matches!(conflict.action, ConflictAction::Ignore));
    }
}
