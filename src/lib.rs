//! relq is a typed, composable relational query builder that renders
//! dialect-aware SQL with bound parameters.
//!
//! Queries are built by composing strongly-typed fragments that read like
//! collection pipelines, and rendered to parameterized SQL text:
//!
//! ```ascii
//!        table! views
//!            │
//!            ▼
//!     Select<Q> / Insert / Update / Delete      (composition algebra)
//!            │
//!            ▼
//!        query IR                               (immutable, identity-
//!            │                                   keyed from-sources)
//!   (render) │  Context: dialect, name
//!            │  mappers, alias map
//!            ▼
//!       SqlFragment                             (text + parameter slots)
//!            │
//!            ▼
//!    SQL text + positional parameters ──► Driver ──► rows ──► Q::Row
//! ```
//!
//! Composition and rendering are pure; the only shared mutable state is
//! the driver connection owned by [DbClient].
//!
//! ```ignore
//! relq::table! {
//!     table = "product";
//!     pub struct Product / ProductExpr / ProductCols {
//!         id: i64 [primary_key auto_increment],
//!         name: String,
//!         price: f64,
//!     }
//! }
//!
//! let cheapest = Product::select()
//!     .sort_by(|p| p.price)
//!     .map(|p| p.name)
//!     .take(2);
//! let names: Vec<String> = db.run(&cheapest)?;
//! ```

mod dialect;
mod driver;
mod error;
mod exec;
mod expr;
mod fragment;
mod ident;
mod query;
mod queryable;
mod render;
mod table;
mod types;
mod utils;

pub use dialect::Dialect;
pub use driver::{Cursor, Driver, Statement};
pub use error::{downcast, Error, Reason, Result};
pub use exec::{Config, DbClient, Dml, Transaction};
pub use expr::{
    case_when, AggFunc, BinaryOp, CaseWhen, Expr, ExprKind, SqlAdd, UnaryOp,
};
pub use fragment::{Param, SqlFragment};
pub use ident::IdentMapper;
pub use query::{
    values, Assignment, ColumnList, CompoundSelect, Delete, DmlIr, Insert, InsertBuilder,
    JoinSide, NullsOrder, OrderBy, ProjectedColumn, Returning, Select, SelectIr, SetOp,
    SimpleSelect, SortDirection, SourceId, Update, UpdateBuilder,
};
pub use queryable::{Nullable, Queryable, RowDecoder};
pub use table::{excluded, Column, ColumnDef, Table, TableSchema};
pub use types::{SqlIntegral, SqlNumeric, SqlType, SqlValue, TypeCode};
pub use utils::IntoOnly;
