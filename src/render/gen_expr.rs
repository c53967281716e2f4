//! Renders expression nodes into SQL fragments.

use itertools::Itertools;

use crate::error::Result;
use crate::expr::{AggFunc, BinaryOp, ExprKind, UnaryOp};
use crate::fragment::SqlFragment;

use super::gen_query::render_select;
use super::Context;
use crate::dialect::OnConflictStyle;

pub(crate) fn render_expr(kind: &ExprKind, ctx: &mut Context) -> Result<SqlFragment> {
    Ok(match kind {
        ExprKind::Column { source, name } => SqlFragment::raw(ctx.column_ref(*source, name)?),

        ExprKind::Param(param) => SqlFragment::param(param.clone()),

        ExprKind::Binary { op, left, right } => {
            let function_spelling = match op {
                BinaryOp::Mod if ctx.dialect.modulo_function() => Some("MOD"),
                _ if ctx.dialect.bitwise_functions() => bitwise_function(op),
                _ => None,
            };
            if let Some(name) = function_spelling {
                let mut call = SqlFragment::raw(format!("{name}("));
                call.append(render_expr(left, ctx)?);
                call.push_str(", ");
                call.append(render_expr(right, ctx)?);
                call.push_str(")");
                return Ok(call);
            }
            let strength = binding_strength(op);
            let mut out = render_operand(left, strength, false, ctx)?;
            out.push_str(&format!(" {} ", operator_text(op)));
            out.append(render_operand(right, strength, strict_right(op), ctx)?);
            out
        }

        ExprKind::Unary { op, expr } => match op {
            UnaryOp::BitNot if ctx.dialect.bitwise_functions() => {
                let mut out = SqlFragment::raw("BITNOT(");
                out.append(render_expr(expr, ctx)?);
                out.push_str(")");
                out
            }
            _ => {
                let text = match op {
                    UnaryOp::Not => "NOT ",
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                    UnaryOp::BitNot => "~",
                };
                let mut out = SqlFragment::raw(text);
                out.append(render_operand(expr, unary_strength(op), false, ctx)?);
                out
            }
        },

        ExprKind::Func { name, args } => {
            if matches!(name.as_str(), "LTRIM" | "RTRIM")
                && args.len() == 2
                && !ctx.dialect.supports_trim_chars()
            {
                return Err(crate::error::Error::rendering(
                    "two-argument trim is not supported by this dialect",
                )
                .into());
            }
            let name = ctx.dialect.translate_function_name(name)?;
            let args: Vec<_> = args.iter().map(|a| render_expr(a, ctx)).try_collect()?;
            let mut out = SqlFragment::raw(format!("{name}("));
            out.append(SqlFragment::join(", ", args));
            out.push_str(")");
            out
        }

        ExprKind::Concat(parts) => {
            if ctx.dialect.has_concat_function() {
                let parts: Vec<_> = parts.iter().map(|p| render_expr(p, ctx)).try_collect()?;
                let mut out = SqlFragment::raw("CONCAT(");
                out.append(SqlFragment::join(", ", parts));
                out.push_str(")");
                out
            } else {
                let parts: Vec<_> = parts
                    .iter()
                    .map(|p| render_operand(p, CONCAT_STRENGTH, false, ctx))
                    .try_collect()?;
                SqlFragment::join(" || ", parts)
            }
        }

        ExprKind::IndexOf { haystack, needle } => {
            if ctx.dialect.position_function() {
                let mut out = SqlFragment::raw("POSITION(");
                out.append(render_expr(needle, ctx)?);
                out.push_str(" IN ");
                out.append(render_expr(haystack, ctx)?);
                out.push_str(")");
                out
            } else {
                let mut out = SqlFragment::raw("INSTR(");
                out.append(render_expr(haystack, ctx)?);
                out.push_str(", ");
                out.append(render_expr(needle, ctx)?);
                out.push_str(")");
                out
            }
        }

        ExprKind::Cast { expr, to } => {
            let mut out = SqlFragment::raw("CAST(");
            out.append(render_expr(expr, ctx)?);
            out.push_str(&format!(" AS {})", ctx.dialect.type_name(*to)));
            out
        }

        ExprKind::Like { expr, pattern } => {
            let mut out = render_operand(expr, PREDICATE_STRENGTH, false, ctx)?;
            out.push_str(" LIKE ");
            out.append(render_operand(pattern, PREDICATE_STRENGTH, false, ctx)?);
            out
        }

        ExprKind::Between { expr, low, high } => {
            let mut out = render_operand(expr, PREDICATE_STRENGTH, false, ctx)?;
            out.push_str(" BETWEEN ");
            out.append(render_operand(low, PREDICATE_STRENGTH, true, ctx)?);
            out.push_str(" AND ");
            out.append(render_operand(high, PREDICATE_STRENGTH, true, ctx)?);
            out
        }

        ExprKind::IsNull { expr, negated } => {
            let mut out = render_operand(expr, PREDICATE_STRENGTH, false, ctx)?;
            out.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            out
        }

        ExprKind::NullSafeEq {
            left,
            right,
            negated,
        } => {
            let mut inner = if let Some(op) = ctx.dialect.null_safe_equality() {
                let mut out = render_operand(left, PREDICATE_STRENGTH, false, ctx)?;
                out.push_str(&format!(" {op} "));
                out.append(render_operand(right, PREDICATE_STRENGTH, false, ctx)?);
                out
            } else {
                // (a IS NULL AND b IS NULL) OR a = b
                let mut out = SqlFragment::raw("(");
                out.append(render_operand(left, PREDICATE_STRENGTH, false, ctx)?);
                out.push_str(" IS NULL AND ");
                out.append(render_operand(right, PREDICATE_STRENGTH, false, ctx)?);
                out.push_str(" IS NULL) OR ");
                out.append(render_operand(left, PREDICATE_STRENGTH, false, ctx)?);
                out.push_str(" = ");
                out.append(render_operand(right, PREDICATE_STRENGTH, false, ctx)?);
                out
            };
            if *negated {
                inner = inner.parens();
                let mut out = SqlFragment::raw("NOT ");
                out.append(inner);
                out
            } else {
                inner
            }
        }

        ExprKind::Case {
            branches,
            otherwise,
        } => {
            let mut out = SqlFragment::raw("CASE");
            for (cond, value) in branches {
                out.push_str(" WHEN ");
                out.append(render_expr(cond, ctx)?);
                out.push_str(" THEN ");
                out.append(render_expr(value, ctx)?);
            }
            if let Some(default) = otherwise {
                out.push_str(" ELSE ");
                out.append(render_expr(default, ctx)?);
            }
            out.push_str(" END");
            out
        }

        ExprKind::Aggregate { func, args } => match func {
            AggFunc::Count if args.is_empty() => SqlFragment::raw("COUNT(1)"),
            AggFunc::StringAgg => {
                let name = ctx.dialect.string_agg_name();
                let args: Vec<_> = args.iter().map(|a| render_expr(a, ctx)).try_collect()?;
                let mut out = SqlFragment::raw(format!("{name}("));
                out.append(SqlFragment::join(", ", args));
                out.push_str(")");
                out
            }
            _ => {
                let args: Vec<_> = args.iter().map(|a| render_expr(a, ctx)).try_collect()?;
                let mut out = SqlFragment::raw(format!("{}(", func.default_name()));
                out.append(SqlFragment::join(", ", args));
                out.push_str(")");
                out
            }
        },

        ExprKind::Exists { query, negated } => {
            let mut out = SqlFragment::raw(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
            out.append(render_select(query, ctx)?);
            out.push_str(")");
            out
        }

        ExprKind::InSubquery { expr, query } => {
            let mut out = render_operand(expr, PREDICATE_STRENGTH, false, ctx)?;
            out.push_str(" IN (");
            out.append(render_select(query, ctx)?);
            out.push_str(")");
            out
        }

        ExprKind::ScalarSubquery(query) => render_select(query, ctx)?.parens(),

        ExprKind::ExcludedColumn(name) => {
            let column = ctx.column_name(name);
            match ctx.dialect.on_conflict_style() {
                OnConflictStyle::DuplicateKey => SqlFragment::raw(format!("VALUES({column})")),
                _ => SqlFragment::raw(format!("EXCLUDED.{column}")),
            }
        }
    })
}

const PREDICATE_STRENGTH: u8 = 4;
const CONCAT_STRENGTH: u8 = 5;

fn binding_strength(op: &BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq => 4,
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::BitOr | BinaryOp::BitXor => 5,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::BitAnd => 6,
    }
}

fn strict_right(op: &BinaryOp) -> bool {
    matches!(op, BinaryOp::Sub | BinaryOp::Div | BinaryOp::Mod)
}

fn unary_strength(op: &UnaryOp) -> u8 {
    match op {
        UnaryOp::Not => 3,
        _ => 7,
    }
}

fn expr_strength(kind: &ExprKind) -> u8 {
    match kind {
        ExprKind::Binary { op, .. } => binding_strength(op),
        ExprKind::Unary { op, .. } => unary_strength(op),
        ExprKind::Like { .. }
        | ExprKind::Between { .. }
        | ExprKind::IsNull { .. }
        | ExprKind::InSubquery { .. } => PREDICATE_STRENGTH,
        // the generic expansion tops out at OR
        ExprKind::NullSafeEq { negated: false, .. } => 1,
        ExprKind::Concat(_) => CONCAT_STRENGTH,
        _ => u8::MAX,
    }
}

fn bitwise_function(op: &BinaryOp) -> Option<&'static str> {
    match op {
        BinaryOp::BitAnd => Some("BITAND"),
        BinaryOp::BitOr => Some("BITOR"),
        BinaryOp::BitXor => Some("BITXOR"),
        _ => None,
    }
}

fn operator_text(op: &BinaryOp) -> &'static str {
    match op {
        BinaryOp::Eq => "=",
        BinaryOp::NotEq => "<>",
        BinaryOp::Lt => "<",
        BinaryOp::LtEq => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::GtEq => ">=",
        BinaryOp::And => "AND",
        BinaryOp::Or => "OR",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
    }
}

/// Wraps the operand in parentheses when its operator binds looser than the
/// parent. `strict` also wraps equal strength, for non-associative parents.
fn render_operand(
    kind: &ExprKind,
    parent_strength: u8,
    strict: bool,
    ctx: &mut Context,
) -> Result<SqlFragment> {
    let strength = expr_strength(kind);
    let rendered = render_expr(kind, ctx)?;
    if strength < parent_strength || (strict && strength == parent_strength) {
        Ok(rendered.parens())
    } else {
        Ok(rendered)
    }
}
