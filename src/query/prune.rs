//! Projection elision for wrapped subqueries.
//!
//! When a select is wrapped as a subquery reference, output columns the
//! outer query never touches can sometimes be eliminated from the inner
//! SELECT list. Dropping is only sound when it cannot change the inner
//! query's multiset of rows: always for a plain select, per operand for
//! UNION / UNION ALL, never for INTERSECT / EXCEPT (columns contribute to
//! row equality there), and never under DISTINCT.

use std::collections::HashSet;

use crate::expr::ExprKind;

use super::{FromKind, SelectIr, SimpleSelect, SourceId};

/// Prunes the projections of every subquery source of `select`, keeping
/// only columns the enclosing select references.
pub fn prune_subqueries(select: &mut SimpleSelect) {
    let subquery_ids: Vec<SourceId> = select
        .from
        .iter()
        .chain(select.joins.iter().map(|j| &j.source))
        .filter(|f| f.kind.is_subquery())
        .map(|f| f.id)
        .collect();

    for id in subquery_ids {
        let mut used = HashSet::new();
        collect_used(select, id, &mut used);

        let inner = select
            .from
            .iter_mut()
            .chain(select.joins.iter_mut().map(|j| &mut j.source))
            .find(|f| f.id == id)
            .unwrap();
        if let FromKind::Subquery(ir) = &mut inner.kind {
            prune_select(ir, &used);
        }
    }
}

/// Collects every column name of `source` referenced anywhere in `select`.
fn collect_used(select: &SimpleSelect, source: SourceId, used: &mut HashSet<String>) {
    let mut visit = |kind: &ExprKind| {
        if let ExprKind::Column { source: s, name } = kind {
            if *s == source {
                used.insert(name.clone());
            }
        }
    };
    for col in &select.projection {
        visit_expr(&col.expr, &mut visit);
    }
    for pred in &select.where_ {
        visit_expr(pred, &mut visit);
    }
    for join in &select.joins {
        visit_expr(&join.on, &mut visit);
    }
    if let Some(group) = &select.group_by {
        for key in &group.keys {
            visit_expr(key, &mut visit);
        }
        for pred in &group.having {
            visit_expr(pred, &mut visit);
        }
    }
}

fn prune_select(ir: &mut SelectIr, used: &HashSet<String>) {
    match ir {
        SelectIr::Simple(simple) => prune_simple(simple, used),
        SelectIr::Compound(compound) => {
            if !compound
                .ops
                .iter()
                .all(|(op, _)| op.allows_projection_elision())
            {
                return;
            }
            // columns the compound's own ORDER BY resolves through must stay
            let mut keep = used.clone();
            for key in &compound.order_by {
                for col in &compound.lhs.projection {
                    if col.expr == key.expr {
                        keep.insert(col.alias());
                    }
                }
            }
            prune_simple(&mut compound.lhs, &keep);
            for (_, operand) in &mut compound.ops {
                prune_simple(operand, &keep);
            }
        }
    }
}

fn prune_simple(simple: &mut SimpleSelect, used: &HashSet<String>) {
    if simple.distinct {
        return;
    }
    if simple.projection.iter().all(|c| used.contains(&c.alias())) {
        return;
    }
    let mut kept: Vec<_> = simple
        .projection
        .iter()
        .filter(|c| used.contains(&c.alias()))
        .cloned()
        .collect();
    // a SELECT list cannot be empty; aggregate-only outers keep one column
    if kept.is_empty() {
        kept.push(simple.projection[0].clone());
    }
    simple.projection = kept;
}

/// Visits `kind` and every expression node reachable from it, including
/// through nested subqueries.
pub fn visit_expr(kind: &ExprKind, f: &mut impl FnMut(&ExprKind)) {
    f(kind);
    match kind {
        ExprKind::Column { .. } | ExprKind::Param(_) | ExprKind::ExcludedColumn(_) => {}
        ExprKind::Binary { left, right, .. } => {
            visit_expr(left, f);
            visit_expr(right, f);
        }
        ExprKind::Unary { expr, .. } => visit_expr(expr, f),
        ExprKind::Func { args, .. } | ExprKind::Concat(args) | ExprKind::Aggregate { args, .. } => {
            for arg in args {
                visit_expr(arg, f);
            }
        }
        ExprKind::IndexOf { haystack, needle } => {
            visit_expr(haystack, f);
            visit_expr(needle, f);
        }
        ExprKind::Cast { expr, .. } => visit_expr(expr, f),
        ExprKind::Like { expr, pattern } => {
            visit_expr(expr, f);
            visit_expr(pattern, f);
        }
        ExprKind::Between { expr, low, high } => {
            visit_expr(expr, f);
            visit_expr(low, f);
            visit_expr(high, f);
        }
        ExprKind::IsNull { expr, .. } => visit_expr(expr, f),
        ExprKind::NullSafeEq { left, right, .. } => {
            visit_expr(left, f);
            visit_expr(right, f);
        }
        ExprKind::Case {
            branches,
            otherwise,
        } => {
            for (cond, value) in branches {
                visit_expr(cond, f);
                visit_expr(value, f);
            }
            if let Some(e) = otherwise {
                visit_expr(e, f);
            }
        }
        ExprKind::Exists { query, .. } => visit_select(query, f),
        ExprKind::InSubquery { expr, query } => {
            visit_expr(expr, f);
            visit_select(query, f);
        }
        ExprKind::ScalarSubquery(query) => visit_select(query, f),
    }
}

fn visit_select(ir: &SelectIr, f: &mut impl FnMut(&ExprKind)) {
    fn visit_simple(simple: &SimpleSelect, f: &mut impl FnMut(&ExprKind)) {
        for col in &simple.projection {
            visit_expr(&col.expr, f);
        }
        for source in simple
            .from
            .iter()
            .chain(simple.joins.iter().map(|j| &j.source))
        {
            if let FromKind::Subquery(inner) = &source.kind {
                visit_select(inner, f);
            }
        }
        for pred in &simple.where_ {
            visit_expr(pred, f);
        }
        for join in &simple.joins {
            visit_expr(&join.on, f);
        }
        if let Some(group) = &simple.group_by {
            for key in &group.keys {
                visit_expr(key, f);
            }
            for pred in &group.having {
                visit_expr(pred, f);
            }
        }
    }
    match ir {
        SelectIr::Simple(simple) => visit_simple(simple, f),
        SelectIr::Compound(compound) => {
            visit_simple(&compound.lhs, f);
            for (_, operand) in &compound.ops {
                visit_simple(operand, f);
            }
            for key in &compound.order_by {
                visit_expr(&key.expr, f);
            }
        }
    }
}
