//! Renders query IR nodes into SQL fragments.
//!
//! Every entry point allocates from-source aliases before rendering any
//! expression, so references resolve no matter where a source first
//! appears. Nested subqueries render through the same context; their
//! aliases continue the outer numbering.

use itertools::Itertools;

use crate::dialect::{OnConflictStyle, UpdateJoinStyle};
use crate::error::{Error, Result};
use crate::expr::ExprKind;
use crate::fragment::SqlFragment;
use crate::query::{
    Assignment, CompoundSelect, DeleteIr, DmlIr, FromKind, FromSource, InsertIr, InsertSource,
    JoinSide, NullsOrder, OnConflict, OrderBy, ProjectedColumn, SelectIr, SimpleSelect,
    SortDirection, UpdateIr, ValuesIr,
};

use super::gen_expr::render_expr;
use super::Context;

pub(crate) fn render_select(ir: &SelectIr, ctx: &mut Context) -> Result<SqlFragment> {
    match ir {
        SelectIr::Simple(simple) => render_simple(simple, ctx),
        SelectIr::Compound(compound) => render_compound(compound, ctx),
    }
}

fn render_compound(compound: &CompoundSelect, ctx: &mut Context) -> Result<SqlFragment> {
    log::debug!(
        "rendering compound select: {} set op(s), {} order key(s)",
        compound.ops.len(),
        compound.order_by.len()
    );
    let mut out = render_simple(&compound.lhs, ctx)?;

    for (op, operand) in &compound.ops {
        out.push_str(&format!(" {} ", op.keyword()));
        out.append(render_simple(operand, ctx)?);
    }

    if !compound.order_by.is_empty() {
        let keys: Vec<_> = compound
            .order_by
            .iter()
            .map(|key| render_order_key(key, compound, ctx))
            .try_collect()?;
        out.push_str(" ORDER BY ");
        out.append(SqlFragment::join(", ", keys));
    }

    if let Some(limit) = compound.limit {
        out.push_str(&format!(" LIMIT {limit}"));
    } else if compound.offset.is_some() {
        if let Some(placeholder) = ctx.dialect.limit_required_with_offset() {
            out.push_str(&format!(" LIMIT {placeholder}"));
        }
    }
    if let Some(offset) = compound.offset {
        out.push_str(&format!(" OFFSET {offset}"));
    }

    Ok(out)
}

/// An ORDER BY key resolves through the result alias when the sorted
/// expression is part of the projection (required once set operations are
/// involved), and through the expression itself otherwise.
fn render_order_key(
    key: &OrderBy,
    compound: &CompoundSelect,
    ctx: &mut Context,
) -> Result<SqlFragment> {
    let alias = compound
        .lhs
        .projection
        .iter()
        .find(|col| col.expr == key.expr)
        .map(ProjectedColumn::alias);

    let sort_expr = match alias {
        Some(alias) => SqlFragment::raw(alias),
        None if compound.ops.is_empty() => render_expr(&key.expr, ctx)?,
        None => {
            return Err(Error::rendering(
                "order key is not exported by the compound select",
            )
            .with_help("project the sorted expression so the set operation can order by it")
            .into())
        }
    };

    let mut out = SqlFragment::new();

    // NULLS FIRST/LAST emulation via an `IS NULL` key
    let emulate_nulls = key.nulls.filter(|_| !ctx.dialect.supports_nulls_ordering());
    if let Some(nulls) = emulate_nulls {
        out.append(sort_expr.clone());
        out.push_str(match nulls {
            NullsOrder::First => " IS NULL DESC, ",
            NullsOrder::Last => " IS NULL ASC, ",
        });
    }

    out.append(sort_expr);
    if let Some(direction) = key.direction {
        out.push_str(match direction {
            SortDirection::Asc => " ASC",
            SortDirection::Desc => " DESC",
        });
    }
    if emulate_nulls.is_none() {
        if let Some(nulls) = key.nulls {
            out.push_str(match nulls {
                NullsOrder::First => " NULLS FIRST",
                NullsOrder::Last => " NULLS LAST",
            });
        }
    }
    Ok(out)
}

fn render_simple(simple: &SimpleSelect, ctx: &mut Context) -> Result<SqlFragment> {
    // aliases are allocated before anything renders
    for source in &simple.from {
        ctx.register_source(source);
    }
    for join in &simple.joins {
        ctx.register_source(&join.source);
    }

    if !ctx.dialect.supports_full_join()
        && simple.joins.iter().any(|j| j.side == JoinSide::Full)
    {
        return render_full_join_emulated(simple, ctx);
    }

    let mut out = SqlFragment::raw("SELECT ");
    if simple.distinct {
        out.push_str("DISTINCT ");
    }

    if simple.projection.is_empty() {
        return Err(Error::rendering("select with an empty projection").into());
    }
    let items: Vec<_> = simple
        .projection
        .iter()
        .map(|col| -> Result<SqlFragment> {
            let mut item = render_expr(&col.expr, ctx)?;
            item.push_str(&format!(" as {}", col.alias()));
            Ok(item)
        })
        .try_collect()?;
    out.append(SqlFragment::join(", ", items));

    out.push_str(" FROM ");
    let from_items: Vec<_> = simple
        .from
        .iter()
        .map(|source| render_from_item(source, ctx))
        .try_collect()?;
    out.append(SqlFragment::join(", ", from_items));

    for join in &simple.joins {
        out.push_str(match join.side {
            JoinSide::Inner => " JOIN ",
            JoinSide::Left => " LEFT JOIN ",
            JoinSide::Right => " RIGHT JOIN ",
            JoinSide::Full => " FULL OUTER JOIN ",
        });
        out.append(render_from_item(&join.source, ctx)?);
        out.push_str(" ON ");
        out.append(render_expr(&join.on, ctx)?);
    }

    if let Some(pred) = ExprKind::conjunction(simple.where_.clone()) {
        out.push_str(" WHERE ");
        out.append(render_expr(&pred, ctx)?);
    }

    if let Some(group) = &simple.group_by {
        let keys: Vec<_> = group
            .keys
            .iter()
            .map(|key| render_expr(key, ctx))
            .try_collect()?;
        out.push_str(" GROUP BY ");
        out.append(SqlFragment::join(", ", keys));

        if let Some(pred) = ExprKind::conjunction(group.having.clone()) {
            out.push_str(" HAVING ");
            out.append(render_expr(&pred, ctx)?);
        }
    }

    Ok(out)
}

/// FULL OUTER JOIN on engines without it: the union of the left-joined and
/// right-joined renderings. Fully-matched duplicate rows collapse, which is
/// correct for set-unique row shapes.
fn render_full_join_emulated(simple: &SimpleSelect, ctx: &mut Context) -> Result<SqlFragment> {
    let sided = |side: JoinSide| {
        let mut clone = simple.clone();
        for join in &mut clone.joins {
            if join.side == JoinSide::Full {
                join.side = side;
            }
        }
        clone
    };

    let mut out = render_simple(&sided(JoinSide::Left), ctx)?;
    out.push_str(" UNION ");
    out.append(render_simple(&sided(JoinSide::Right), ctx)?);
    Ok(out)
}

fn render_from_item(source: &FromSource, ctx: &mut Context) -> Result<SqlFragment> {
    let alias = ctx.register_source(source);
    Ok(match &source.kind {
        FromKind::Table(schema) => SqlFragment::raw(format!("{} {alias}", ctx.table_name(schema))),
        FromKind::Subquery(inner) => {
            let mut out = render_select(inner, ctx)?.parens();
            out.push_str(&format!(" {alias}"));
            out
        }
        FromKind::Values(values) => {
            let mut out = render_values(values, ctx)?;
            if ctx.dialect.values_as_union_all() {
                out.push_str(&format!(" {alias}"));
            } else {
                out.push_str(&format!(" {alias} ({})", values.column));
            }
            out
        }
    })
}

fn render_values(values: &ValuesIr, ctx: &mut Context) -> Result<SqlFragment> {
    if values.rows.is_empty() {
        return Err(Error::rendering("VALUES with no rows").into());
    }
    if ctx.dialect.values_as_union_all() {
        let selects = values.rows.iter().map(|param| {
            let mut row = SqlFragment::raw("SELECT ");
            row.push_param(param.clone());
            row.push_str(&format!(" as {}", values.column));
            row
        });
        return Ok(SqlFragment::join(" UNION ALL ", selects).parens());
    }
    let row_keyword = ctx.dialect.values_row_keyword();
    let rows = values.rows.iter().map(|param| {
        let mut row = SqlFragment::raw(row_keyword);
        row.push_str("(");
        row.push_param(param.clone());
        row.push_str(")");
        row
    });
    let mut out = SqlFragment::raw("(VALUES ");
    out.append(SqlFragment::join(", ", rows));
    out.push_str(")");
    Ok(out)
}

pub(crate) fn render_dml(ir: &DmlIr, ctx: &mut Context) -> Result<SqlFragment> {
    match ir {
        DmlIr::Insert(insert) => render_insert(insert, ctx),
        DmlIr::Update(update) => render_update(update, ctx),
        DmlIr::Delete(delete) => render_delete(delete, ctx),
    }
}

pub(crate) fn render_insert(ir: &InsertIr, ctx: &mut Context) -> Result<SqlFragment> {
    let table = ctx.register_fixed(ir.source, ir.table);
    let mut out = SqlFragment::raw(format!("INSERT INTO {table} ("));
    out.push_str(&ir.columns.iter().map(|c| ctx.column_name(c)).join(", "));
    out.push_str(") ");

    match &ir.values {
        InsertSource::Rows(rows) => {
            if rows.is_empty() {
                return Err(Error::rendering("INSERT with no rows").into());
            }
            let width = rows[0].len();
            if rows.iter().any(|row| row.len() != width) {
                return Err(Error::rendering(
                    "batched INSERT rows must all supply the same column list",
                )
                .into());
            }
            out.push_str("VALUES ");
            let rendered: Vec<_> = rows
                .iter()
                .map(|row| -> Result<SqlFragment> {
                    let cells: Vec<_> =
                        row.iter().map(|cell| render_expr(cell, ctx)).try_collect()?;
                    Ok(SqlFragment::join(", ", cells).parens())
                })
                .try_collect()?;
            out.append(SqlFragment::join(", ", rendered));
        }
        InsertSource::Select(select) => {
            out.append(render_select(select, ctx)?);
        }
    }

    if let Some(conflict) = &ir.on_conflict {
        out.append(render_on_conflict(conflict, ctx)?);
    }

    render_returning(&mut out, ir.returning.as_deref(), ctx)?;
    out.mark_complete();
    Ok(out)
}

fn render_on_conflict(conflict: &OnConflict, ctx: &mut Context) -> Result<SqlFragment> {
    use crate::query::ConflictAction;

    match ctx.dialect.on_conflict_style() {
        OnConflictStyle::Standard => {
            let keys = conflict.keys.iter().map(|k| ctx.column_name(k)).join(", ");
            let mut out = SqlFragment::raw(format!(" ON CONFLICT ({keys})"));
            match &conflict.action {
                ConflictAction::Ignore => out.push_str(" DO NOTHING"),
                ConflictAction::Update(assignments) => {
                    out.push_str(" DO UPDATE SET ");
                    out.append(render_assignments(assignments, None, ctx)?);
                }
            }
            Ok(out)
        }
        OnConflictStyle::DuplicateKey => {
            let mut out = SqlFragment::raw(" ON DUPLICATE KEY UPDATE ");
            match &conflict.action {
                ConflictAction::Ignore => {
                    // MySQL has no DO NOTHING; assign a key to itself
                    let key = ctx.column_name(conflict.keys.first().ok_or_else(|| {
                        Error::rendering("on-conflict-ignore requires at least one key column")
                    })?);
                    out.push_str(&format!("{key} = {key}"));
                }
                ConflictAction::Update(assignments) => {
                    out.append(render_assignments(assignments, None, ctx)?);
                }
            }
            Ok(out)
        }
        OnConflictStyle::Unsupported => {
            Err(Error::rendering("on-conflict clauses are not supported by this dialect").into())
        }
    }
}

fn render_assignments(
    assignments: &[Assignment],
    qualify_with: Option<&str>,
    ctx: &mut Context,
) -> Result<SqlFragment> {
    if assignments.is_empty() {
        return Err(Error::rendering("SET with no assignments").into());
    }
    let items: Vec<_> = assignments
        .iter()
        .map(|assignment| -> Result<SqlFragment> {
            let column = ctx.column_name(assignment.column);
            let mut item = match qualify_with {
                Some(table) => SqlFragment::raw(format!("{table}.{column} = ")),
                None => SqlFragment::raw(format!("{column} = ")),
            };
            item.append(render_expr(&assignment.value, ctx)?);
            Ok(item)
        })
        .try_collect()?;
    Ok(SqlFragment::join(", ", items))
}

pub(crate) fn render_update(ir: &UpdateIr, ctx: &mut Context) -> Result<SqlFragment> {
    let table = ctx.register_fixed(ir.source, ir.table);
    for join in &ir.joins {
        ctx.register_source(&join.source);
    }

    let mut out = SqlFragment::raw(format!("UPDATE {table}"));

    match ctx.dialect.update_join_style() {
        UpdateJoinStyle::FromWhere => {
            out.push_str(" SET ");
            out.append(render_assignments(&ir.assignments, None, ctx)?);
            if !ir.joins.is_empty() {
                out.push_str(" FROM ");
                let sources: Vec<_> = ir
                    .joins
                    .iter()
                    .map(|join| render_from_item(&join.source, ctx))
                    .try_collect()?;
                out.append(SqlFragment::join(", ", sources));
            }
            let mut predicates: Vec<ExprKind> =
                ir.joins.iter().map(|join| join.on.clone()).collect();
            predicates.extend(ir.where_.iter().cloned());
            if let Some(pred) = ExprKind::conjunction(predicates) {
                out.push_str(" WHERE ");
                out.append(render_expr(&pred, ctx)?);
            }
        }
        UpdateJoinStyle::JoinBeforeSet => {
            for join in &ir.joins {
                out.push_str(" JOIN ");
                out.append(render_from_item(&join.source, ctx)?);
                out.push_str(" ON ");
                out.append(render_expr(&join.on, ctx)?);
            }
            out.push_str(" SET ");
            let qualify = if ir.joins.is_empty() {
                None
            } else {
                Some(table.as_str())
            };
            out.append(render_assignments(&ir.assignments, qualify, ctx)?);
            if let Some(pred) = ExprKind::conjunction(ir.where_.clone()) {
                out.push_str(" WHERE ");
                out.append(render_expr(&pred, ctx)?);
            }
        }
    }

    render_returning(&mut out, ir.returning.as_deref(), ctx)?;
    out.mark_complete();
    Ok(out)
}

pub(crate) fn render_delete(ir: &DeleteIr, ctx: &mut Context) -> Result<SqlFragment> {
    let table = ctx.register_fixed(ir.source, ir.table);
    let mut out = SqlFragment::raw(format!("DELETE FROM {table}"));
    if let Some(pred) = ExprKind::conjunction(ir.where_.clone()) {
        out.push_str(" WHERE ");
        out.append(render_expr(&pred, ctx)?);
    }
    render_returning(&mut out, ir.returning.as_deref(), ctx)?;
    out.mark_complete();
    Ok(out)
}

fn render_returning(
    out: &mut SqlFragment,
    returning: Option<&[ProjectedColumn]>,
    ctx: &mut Context,
) -> Result<()> {
    let Some(columns) = returning else {
        return Ok(());
    };
    if !ctx.dialect.supports_returning() {
        return Err(Error::rendering("RETURNING is not supported by this dialect").into());
    }
    let items: Vec<_> = columns
        .iter()
        .map(|col| -> Result<SqlFragment> {
            let mut item = render_expr(&col.expr, ctx)?;
            item.push_str(&format!(" as {}", col.alias()));
            Ok(item)
        })
        .try_collect()?;
    out.push_str(" RETURNING ");
    out.append(SqlFragment::join(", ", items));
    Ok(())
}
