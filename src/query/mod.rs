//! The algebraic query IR.
//!
//! All IR values are immutable once built; composition returns new values
//! sharing the old ones. From-sources are identity-compared through
//! [SourceId]s allocated at construction, never by structural equality.

mod delete;
mod insert;
mod prune;
mod select;
mod update;
mod values;

pub use delete::Delete;
pub use insert::{ColumnList, Insert, InsertBuilder};
pub use select::Select;
pub use update::{Update, UpdateBuilder};
pub use values::values;

use enum_as_inner::EnumAsInner;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::expr::ExprKind;
use crate::fragment::Param;
use crate::table::TableSchema;

/// Identity of one from-source instance. Two references to the same table
/// are distinct sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceId(usize);

static NEXT_SOURCE_ID: AtomicUsize = AtomicUsize::new(0);

impl SourceId {
    pub fn next() -> SourceId {
        SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FromSource {
    pub id: SourceId,
    pub kind: FromKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, EnumAsInner)]
pub enum FromKind {
    Table(&'static TableSchema),
    Subquery(Box<SelectIr>),
    /// A literal inline table with a single named column.
    Values(ValuesIr),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuesIr {
    pub column: String,
    pub rows: Vec<Param>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinSide {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Join {
    pub side: JoinSide,
    pub source: FromSource,
    /// Empty only for the comma-cross-joins produced by `flat_map`; those
    /// land in `from` instead of `joins`.
    pub on: ExprKind,
}

/// One projected output column, aliased `res` / `res__<path>` in SQL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedColumn {
    pub path: Vec<String>,
    pub expr: ExprKind,
}

impl ProjectedColumn {
    /// The SQL alias re-exposing this column to outer scopes.
    pub fn alias(&self) -> String {
        if self.path.is_empty() {
            "res".to_string()
        } else {
            format!("res__{}", self.path.join("__"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupBy {
    pub keys: Vec<ExprKind>,
    /// Filled by `filter` applied after `group_by`.
    pub having: Vec<ExprKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleSelect {
    pub projection: Vec<ProjectedColumn>,
    pub distinct: bool,
    pub from: Vec<FromSource>,
    pub joins: Vec<Join>,
    pub where_: Vec<ExprKind>,
    pub group_by: Option<GroupBy>,
}

impl SimpleSelect {
    pub fn new(projection: Vec<ProjectedColumn>, from: FromSource) -> Self {
        SimpleSelect {
            projection,
            distinct: false,
            from: vec![from],
            joins: Vec::new(),
            where_: Vec::new(),
            group_by: None,
        }
    }

    /// Whether this select can be merged into an enclosing one (its from
    /// sources inlined) without changing semantics.
    pub fn is_inlineable(&self) -> bool {
        self.joins.is_empty()
            && self.where_.is_empty()
            && self.group_by.is_none()
            && !self.distinct
            && self.from.len() == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::AsRefStr)]
pub enum SetOp {
    Union,
    UnionAll,
    Intersect,
    Except,
}

impl SetOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            SetOp::Union => "UNION",
            SetOp::UnionAll => "UNION ALL",
            SetOp::Intersect => "INTERSECT",
            SetOp::Except => "EXCEPT",
        }
    }

    /// Whether dropping an unreferenced projected column from the operands
    /// preserves this operator's semantics.
    pub fn allows_projection_elision(&self) -> bool {
        matches!(self, SetOp::Union | SetOp::UnionAll)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NullsOrder {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBy {
    pub expr: ExprKind,
    pub direction: Option<SortDirection>,
    pub nulls: Option<NullsOrder>,
}

/// A select with set operations, ordering and row-count bounds layered on a
/// [SimpleSelect] head. A bare sorted or limited select is a compound with
/// no ops.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundSelect {
    pub lhs: SimpleSelect,
    pub ops: Vec<(SetOp, SimpleSelect)>,
    /// Rightmost-first order of significance: the first key is primary.
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl CompoundSelect {
    pub fn of(lhs: SimpleSelect) -> Self {
        CompoundSelect {
            lhs,
            ops: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Lifts a select into compound form without changing its meaning.
    pub fn lift(ir: SelectIr) -> CompoundSelect {
        match ir {
            SelectIr::Simple(s) => CompoundSelect::of(s),
            SelectIr::Compound(c) => c,
        }
    }

    pub fn has_row_bounds(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, EnumAsInner)]
pub enum SelectIr {
    Simple(SimpleSelect),
    Compound(CompoundSelect),
}

impl SelectIr {
    pub fn projection(&self) -> &[ProjectedColumn] {
        match self {
            SelectIr::Simple(s) => &s.projection,
            SelectIr::Compound(c) => &c.lhs.projection,
        }
    }

    /// JSON dump of the IR, for debugging query rewrites.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

/// One `column = value` pair of an INSERT or UPDATE.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub column: &'static str,
    pub value: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, EnumAsInner)]
pub enum InsertSource {
    /// Outer dimension is rows, inner is values in column order.
    Rows(Vec<Vec<ExprKind>>),
    Select(Box<SelectIr>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConflictAction {
    Ignore,
    Update(Vec<Assignment>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnConflict {
    pub keys: Vec<&'static str>,
    pub action: ConflictAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertIr {
    pub table: &'static TableSchema,
    /// Bound to the table for RETURNING projections.
    pub source: SourceId,
    pub columns: Vec<&'static str>,
    pub values: InsertSource,
    pub on_conflict: Option<OnConflict>,
    pub returning: Option<Vec<ProjectedColumn>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateIr {
    pub table: &'static TableSchema,
    pub source: SourceId,
    pub assignments: Vec<Assignment>,
    pub joins: Vec<Join>,
    pub where_: Vec<ExprKind>,
    pub returning: Option<Vec<ProjectedColumn>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteIr {
    pub table: &'static TableSchema,
    pub source: SourceId,
    pub where_: Vec<ExprKind>,
    pub returning: Option<Vec<ProjectedColumn>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, EnumAsInner)]
pub enum DmlIr {
    Insert(InsertIr),
    Update(UpdateIr),
    Delete(DeleteIr),
}

/// A DML statement with a RETURNING clause; executes to rows of `R::Row`.
#[derive(Debug, Clone)]
pub struct Returning<R: crate::queryable::Queryable> {
    pub(crate) dml: DmlIr,
    pub(crate) shape: R,
}

impl<R: crate::queryable::Queryable> Returning<R> {
    pub fn dml(&self) -> &DmlIr {
        &self.dml
    }

    pub(crate) fn shape(&self) -> &R {
        &self.shape
    }
}
