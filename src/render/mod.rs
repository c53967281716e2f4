//! Backend translating the query IR into SQL fragments.
//!
//! Rendering is a pure, per-call walk: the [Context] owns the alias map,
//! the installed name mappers and the dialect handler, and is threaded
//! through every node. No partial SQL escapes on error.

mod gen_expr;
mod gen_query;

use gen_expr::render_expr;
pub(crate) use gen_query::{render_dml, render_select};

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::dialect::{Dialect, DialectHandler};
use crate::error::{Error, Result};
use crate::expr::ExprKind;
use crate::fragment::SqlFragment;
use crate::ident::IdentMapper;
use crate::query::{FromKind, FromSource, SourceId};
use crate::table::TableSchema;

/// Identifiers that must be quoted when they appear as table or column
/// names. Deliberately small: only words every supported engine reserves.
static RESERVED_IDENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "all", "and", "as", "asc", "between", "by", "case", "check", "create", "cross", "current",
        "default", "delete", "desc", "distinct", "drop", "else", "end", "except", "exists",
        "false", "from", "full", "group", "having", "in", "inner", "insert", "intersect", "into",
        "is", "join", "left", "like", "limit", "not", "null", "offset", "on", "or", "order",
        "outer", "primary", "right", "select", "set", "table", "then", "to", "true", "union",
        "unique", "update", "user", "using", "values", "when", "where", "with",
    ]
    .into()
});

pub(crate) struct Context {
    pub(crate) dialect: Box<dyn DialectHandler>,
    table_mapper: IdentMapper,
    column_mapper: IdentMapper,
    /// Identity-keyed: two references to the same table are distinct.
    aliases: HashMap<SourceId, SourceAlias>,
    counter: usize,
}

struct SourceAlias {
    alias: String,
    /// Column names of table sources pass through the column mapper;
    /// generated result aliases of subqueries do not.
    maps_columns: bool,
}

impl Context {
    pub(crate) fn new(
        dialect: Dialect,
        table_mapper: IdentMapper,
        column_mapper: IdentMapper,
    ) -> Self {
        Context {
            dialect: dialect.handler(),
            table_mapper,
            column_mapper,
            aliases: HashMap::new(),
            counter: 0,
        }
    }

    /// Allocates the alias for a from-source on first sight, in rendering
    /// order: `product0`, `shipping_info1`, `subquery2`, …
    pub(crate) fn register_source(&mut self, source: &FromSource) -> String {
        if let Some(known) = self.aliases.get(&source.id) {
            return known.alias.clone();
        }
        // the unquoted mapped name; `order0` is a fine alias even when
        // `order` itself needs quoting
        let (base, maps_columns) = match &source.kind {
            FromKind::Table(schema) => (self.table_mapper.apply(schema.name), true),
            FromKind::Subquery(_) => ("subquery".to_string(), false),
            FromKind::Values(_) => ("values".to_string(), false),
        };
        let alias = format!("{base}{}", self.counter);
        self.counter += 1;
        self.aliases.insert(
            source.id,
            SourceAlias {
                alias: alias.clone(),
                maps_columns,
            },
        );
        alias
    }

    /// Binds a DML statement's table under its own name, unaliased.
    pub(crate) fn register_fixed(&mut self, id: SourceId, schema: &'static TableSchema) -> String {
        let alias = self.table_name(schema);
        self.aliases.insert(
            id,
            SourceAlias {
                alias: alias.clone(),
                maps_columns: true,
            },
        );
        alias
    }

    /// Renders a column reference through the alias map.
    pub(crate) fn column_ref(&self, source: SourceId, name: &str) -> Result<String> {
        let known = self.aliases.get(&source).ok_or_else(|| {
            Error::rendering(format!(
                "column `{name}` references a from-source that is not in scope"
            ))
        })?;
        let column = if known.maps_columns {
            self.column_name(name)
        } else {
            name.to_string()
        };
        Ok(format!("{}.{column}", known.alias))
    }

    pub(crate) fn table_name(&self, schema: &TableSchema) -> String {
        self.quote_ident(&self.table_mapper.apply(schema.name))
    }

    pub(crate) fn column_name(&self, raw: &str) -> String {
        self.quote_ident(&self.column_mapper.apply(raw))
    }

    fn quote_ident(&self, name: &str) -> String {
        let needs_quoting = RESERVED_IDENTS.contains(name)
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if needs_quoting {
            let q = self.dialect.ident_quote();
            format!("{q}{name}{q}")
        } else {
            name.to_string()
        }
    }
}

/// Renders a bare expression as a one-column select, applying the
/// dialect's default suffix for engines that require a from-clause.
pub(crate) fn render_expr_select(kind: &ExprKind, ctx: &mut Context) -> Result<SqlFragment> {
    let mut out = SqlFragment::raw("SELECT ");
    out.append(render_expr(kind, ctx)?);
    out.push_str(" as res");
    out.push_str(ctx.dialect.select_suffix());
    out.mark_complete();
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    fn ctx(dialect: Dialect) -> Context {
        Context::new(dialect, IdentMapper::SnakeCase, IdentMapper::SnakeCase)
    }

    #[test]
    fn test_reserved_idents_are_quoted() {
        let ctx = ctx(Dialect::Ansi);
        assert_eq!(ctx.column_name("order"), "\"order\"");
        assert_eq!(ctx.column_name("price"), "price");
    }

    #[test]
    fn test_mysql_quote_char() {
        let ctx = ctx(Dialect::MySql);
        assert_eq!(ctx.column_name("select"), "`select`");
    }

    #[test]
    fn test_aliases_in_first_use_order() {
        use crate::query::{FromKind, FromSource, SourceId};
        static SCHEMA: TableSchema = TableSchema {
            name: "product",
            columns: &[],
        };
        let mut ctx = ctx(Dialect::Ansi);
        let a = FromSource {
            id: SourceId::next(),
            kind: FromKind::Table(&SCHEMA),
        };
        let b = FromSource {
            id: SourceId::next(),
            kind: FromKind::Table(&SCHEMA),
        };
        assert_eq!(ctx.register_source(&a), "product0");
        assert_eq!(ctx.register_source(&b), "product1");
        // idempotent for a known source
        assert_eq!(ctx.register_source(&a), "product0");
    }
}
