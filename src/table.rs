//! Table descriptors and the three row views of a record.
//!
//! A user record participates in queries through three parallel shapes: the
//! storage row (plain values), the expression row (one [Expr] per column,
//! bound to a table alias) and the assignment row (one [Column] handle per
//! column, used by INSERT and UPDATE). The [Table] trait relates them; the
//! [table!] macro generates all three from one definition.

use serde::Serialize;

use crate::expr::{Expr, ExprKind};
use crate::query::{Assignment, Delete, InsertBuilder, Select, SourceId, UpdateBuilder};
use crate::queryable::Queryable;
use crate::types::{SqlType, TypeCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: &'static str,
    pub type_code: TypeCode,
    pub primary_key: bool,
    pub auto_increment: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    /// Raw identifier; passed through the installed table name mapper.
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

/// Assignment-position handle for one column.
#[derive(Debug)]
pub struct Column<T> {
    name: &'static str,
    marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Column<T> {}

impl<T: SqlType> Column<T> {
    pub fn new(name: &'static str) -> Self {
        Column {
            name,
            marker: std::marker::PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `column = value` for INSERT and UPDATE SET lists.
    pub fn set(self, value: impl Into<Expr<T>>) -> Assignment {
        Assignment {
            column: self.name,
            value: value.into().kind,
        }
    }

    /// The column as an expression bound to `source`. Exists for the
    /// [crate::table!] expansion; prefer the generated expression view.
    #[doc(hidden)]
    pub fn expr(self, source: SourceId) -> Expr<T> {
        Expr::column(source, self.name)
    }
}

/// A user record mapped to a table.
pub trait Table: Sized + 'static {
    /// Storage-position shape (plain values).
    type Row;

    /// Query-position shape (expressions bound to a table alias).
    type Expr: Queryable<Row = Self::Row>;

    /// Assignment-position shape (column handles).
    type Assign: Clone;

    fn schema() -> &'static TableSchema;

    /// The expression row bound to `source`.
    fn exprs(source: SourceId) -> Self::Expr;

    fn cols() -> Self::Assign;

    fn select() -> Select<Self::Expr> {
        Select::from_table::<Self>()
    }

    fn insert() -> InsertBuilder<Self> {
        InsertBuilder::new()
    }

    fn update(pred: impl FnOnce(Self::Expr) -> Expr<bool>) -> UpdateBuilder<Self> {
        UpdateBuilder::new(pred)
    }

    fn delete(pred: impl FnOnce(Self::Expr) -> Expr<bool>) -> Delete<Self> {
        Delete::new(pred)
    }
}

/// Assignment value that references another column of the same row, for
/// `ON CONFLICT DO UPDATE` sets like `price = excluded.price`.
pub fn excluded<T: SqlType>(column: Column<T>) -> Expr<T> {
    Expr::new(ExprKind::ExcludedColumn(column.name().to_string()))
}

/// Defines a record with its storage, expression and assignment views.
///
/// ```ignore
/// relq::table! {
///     table = "product";
///     pub struct Product / ProductExpr / ProductCols {
///         id: i64 [primary_key auto_increment],
///         kebab_case_name: String,
///         name: String,
///         price: f64,
///     }
/// }
/// ```
#[macro_export]
macro_rules! table {
    (
        table = $table_name:literal;
        $vis:vis struct $row:ident / $exprs:ident / $cols:ident {
            $( $field:ident : $fty:ty $([ $($flag:ident)* ])? ),+ $(,)?
        }
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $row {
            $( pub $field : $fty, )+
        }

        #[derive(Debug, Clone)]
        $vis struct $exprs {
            $( pub $field : $crate::Expr<$fty>, )+
        }

        #[derive(Debug, Clone, Copy)]
        $vis struct $cols {
            $( pub $field : $crate::Column<$fty>, )+
        }

        impl $crate::Table for $row {
            type Row = $row;
            type Expr = $exprs;
            type Assign = $cols;

            fn schema() -> &'static $crate::TableSchema {
                static SCHEMA: $crate::TableSchema = $crate::TableSchema {
                    name: $table_name,
                    columns: &[
                        $( $crate::ColumnDef {
                            name: stringify!($field),
                            type_code: <$fty as $crate::SqlType>::TYPE_CODE,
                            primary_key: $crate::table!(@primary_key $($($flag)*)?),
                            auto_increment: $crate::table!(@auto_increment $($($flag)*)?),
                        }, )+
                    ],
                };
                &SCHEMA
            }

            fn exprs(source: $crate::SourceId) -> $exprs {
                $exprs {
                    $( $field : $crate::Column::<$fty>::new(stringify!($field)).expr(source), )+
                }
            }

            fn cols() -> $cols {
                $cols {
                    $( $field : $crate::Column::new(stringify!($field)), )+
                }
            }
        }

        impl $crate::Queryable for $exprs {
            type Row = $row;

            fn walk(
                &self,
                path: &mut Vec<&'static str>,
                out: &mut Vec<$crate::ProjectedColumn>,
            ) {
                $(
                    path.push(stringify!($field));
                    $crate::Queryable::walk(&self.$field, path, out);
                    path.pop();
                )+
            }

            fn rebind(&self, source: $crate::SourceId, path: &mut Vec<&'static str>) -> Self {
                $exprs {
                    $( $field : {
                        path.push(stringify!($field));
                        let e = $crate::Queryable::rebind(&self.$field, source, path);
                        path.pop();
                        e
                    }, )+
                }
            }

            fn type_codes(&self, out: &mut Vec<$crate::TypeCode>) {
                $( $crate::Queryable::type_codes(&self.$field, out); )+
            }

            fn decode(&self, row: &mut $crate::RowDecoder) -> $crate::Result<$row> {
                Ok($row {
                    $( $field : $crate::Queryable::decode(&self.$field, row)?, )+
                })
            }
        }
    };

    (@primary_key primary_key $($rest:ident)*) => { true };
    (@primary_key $other:ident $($rest:ident)*) => { $crate::table!(@primary_key $($rest)*) };
    (@primary_key) => { false };

    (@auto_increment auto_increment $($rest:ident)*) => { true };
    (@auto_increment $other:ident $($rest:ident)*) => { $crate::table!(@auto_increment $($rest)*) };
    (@auto_increment) => { false };
}

#[cfg(test)]
mod test {
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
    fn test_schema() {
        let schema = Product::schema();
        assert_eq!(schema.name, "product");
        assert_eq!(schema.columns.len(), 4);
        assert!(schema.columns[0].primary_key);
        assert!(schema.columns[0].auto_increment);
        assert!(!schema.columns[2].primary_key);
        assert_eq!(schema.columns[3].name, "price");
    }

    #[test]
    fn test_expr_view_binds_source() {
        let source = crate::SourceId::next();
        let exprs = Product::exprs(source);
        let (col_source, name) = exprs.name.kind().as_column().unwrap();
        assert_eq!(*col_source, source);
        assert_eq!(name, "name");
    }
}
