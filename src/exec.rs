//! Execution: binding a rendered query to a driver connection and
//! reconstructing typed results.

use itertools::Itertools;

use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::{Error, Reason, Result};
use crate::expr::Expr;
use crate::fragment::Param;
use crate::ident::IdentMapper;
use crate::query::{Delete, DmlIr, Insert, Returning, Select, Update};
use crate::queryable::{Queryable, RowDecoder};
use crate::render::{self, Context};
use crate::table::Table;
use crate::types::{SqlType, SqlValue, TypeCode};
use crate::utils::IntoOnly;

/// Client-level configuration, injected at construction and threaded
/// through every render. There is no global state.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub dialect: Dialect,
    pub table_mapper: IdentMapper,
    pub column_mapper: IdentMapper,
    /// Pretty-print SQL returned by the `render_*` methods.
    pub format: bool,
}

impl Config {
    pub fn new(dialect: Dialect) -> Self {
        Config {
            dialect,
            ..Config::default()
        }
    }
}

/// A DML statement executable for an affected-row count.
pub trait Dml {
    fn to_ir(&self) -> DmlIr;
}

impl<T: Table> Dml for Insert<T> {
    fn to_ir(&self) -> DmlIr {
        DmlIr::Insert(self.ir.clone())
    }
}

impl<T: Table> Dml for Update<T> {
    fn to_ir(&self) -> DmlIr {
        DmlIr::Update(self.ir.clone())
    }
}

impl<T: Table> Dml for Delete<T> {
    fn to_ir(&self) -> DmlIr {
        DmlIr::Delete(self.ir.clone())
    }
}

pub struct DbClient<D: Driver> {
    driver: D,
    config: Config,
}

impl<D: Driver> DbClient<D> {
    pub fn new(driver: D, config: Config) -> Self {
        DbClient { driver, config }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    fn context(&self) -> Context {
        Context::new(
            self.config.dialect,
            self.config.table_mapper.clone(),
            self.config.column_mapper.clone(),
        )
    }

    fn prettify(&self, sql: String) -> String {
        if self.config.format {
            sqlformat::format(
                &sql,
                &sqlformat::QueryParams::default(),
                sqlformat::FormatOptions::default(),
            )
        } else {
            sql
        }
    }

    /// The SQL text and parameter vector a select renders to, without
    /// executing it.
    pub fn render<Q: Queryable>(&self, query: &Select<Q>) -> Result<(String, Vec<Param>)> {
        let mut ctx = self.context();
        let (sql, params) = render::render_select(query.ir(), &mut ctx)?.into_parts();
        Ok((self.prettify(sql), params))
    }

    /// The SQL text and parameter vector a DML statement renders to.
    pub fn render_dml(&self, statement: &impl Dml) -> Result<(String, Vec<Param>)> {
        let mut ctx = self.context();
        let (sql, params) = render::render_dml(&statement.to_ir(), &mut ctx)?.into_parts();
        Ok((self.prettify(sql), params))
    }

    /// Runs a select and decodes every row into the query's result shape.
    pub fn run<Q: Queryable>(&mut self, query: &Select<Q>) -> Result<Vec<Q::Row>> {
        let mut ctx = self.context();
        let fragment = render::render_select(query.ir(), &mut ctx)?;
        let columns: Vec<String> = query.ir().projection().iter().map(|c| c.alias()).collect();
        let shape = query.shape().clone();
        self.query_shaped(fragment, &columns, &shape)
    }

    /// Runs a select expected to produce exactly one row.
    pub fn run_one<Q: Queryable>(&mut self, query: &Select<Q>) -> Result<Q::Row> {
        self.run(query)?.into_only()
    }

    /// Runs a bare expression as a one-row select.
    pub fn run_expr<T: SqlType>(&mut self, expr: &Expr<T>) -> Result<T> {
        let mut ctx = self.context();
        let fragment = render::render_expr_select(expr.kind(), &mut ctx)?;
        let (sql, params) = fragment.into_parts();
        let rows = self.query_values(&sql, &params, &[T::TYPE_CODE])?;
        let row = rows.into_only()?;
        let mut decoder = RowDecoder::new(row, vec!["res".to_string()]);
        decoder.read::<T>()
    }

    /// Runs an INSERT, UPDATE or DELETE for its affected-row count.
    pub fn run_update(&mut self, statement: &impl Dml) -> Result<u64> {
        let mut ctx = self.context();
        let fragment = render::render_dml(&statement.to_ir(), &mut ctx)?;
        let (sql, params) = fragment.into_parts();
        log::debug!("executing `{sql}` with {} parameter(s)", params.len());
        let mut stmt = prepare_bound(&mut self.driver, &sql, &params)?;
        stmt.execute_update()
            .map_err(|e| driver_error(e, &sql, params.len()))
    }

    /// Runs a DML statement with a RETURNING clause and decodes the
    /// returned rows.
    pub fn run_returning<R: Queryable>(&mut self, statement: &Returning<R>) -> Result<Vec<R::Row>> {
        let mut ctx = self.context();
        let fragment = render::render_dml(statement.dml(), &mut ctx)?;
        let returning = match statement.dml() {
            DmlIr::Insert(ir) => ir.returning.as_ref(),
            DmlIr::Update(ir) => ir.returning.as_ref(),
            DmlIr::Delete(ir) => ir.returning.as_ref(),
        };
        let columns: Vec<String> = returning
            .map(|cols| cols.iter().map(|c| c.alias()).collect())
            .unwrap_or_default();
        let shape = statement.shape().clone();
        self.query_shaped(fragment, &columns, &shape)
    }

    fn query_shaped<Q: Queryable>(
        &mut self,
        fragment: crate::fragment::SqlFragment,
        columns: &[String],
        shape: &Q,
    ) -> Result<Vec<Q::Row>> {
        let (sql, params) = fragment.into_parts();
        log::debug!("executing `{sql}` with {} parameter(s)", params.len());
        let mut codes = Vec::new();
        shape.type_codes(&mut codes);
        let rows = self.query_values(&sql, &params, &codes)?;
        rows.into_iter()
            .map(|values| {
                let mut decoder = RowDecoder::new(values, columns.to_vec());
                shape.decode(&mut decoder)
            })
            .try_collect()
    }

    fn query_values(
        &mut self,
        sql: &str,
        params: &[Param],
        codes: &[TypeCode],
    ) -> Result<Vec<Vec<SqlValue>>> {
        let mut stmt = prepare_bound(&mut self.driver, sql, params)?;
        let mut cursor = stmt
            .execute_query()
            .map_err(|e| driver_error(e, sql, params.len()))?;
        let mut rows = Vec::new();
        while cursor
            .advance()
            .map_err(|e| driver_error(e, sql, params.len()))?
        {
            let row: Vec<SqlValue> = codes
                .iter()
                .enumerate()
                .map(|(i, code)| cursor.get(i, *code))
                .try_collect()
                .map_err(|e| driver_error(e, sql, params.len()))?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Runs `f` inside a transaction: autocommit off on entry, commit on
    /// success, rollback on error or explicit [Transaction::rollback], and
    /// autocommit restored on every path.
    pub fn transaction<R>(
        &mut self,
        f: impl FnOnce(&mut Transaction<'_, D>) -> Result<R>,
    ) -> Result<R> {
        self.driver
            .set_auto_commit(false)
            .map_err(transaction_error)?;

        let mut tx = Transaction {
            client: self,
            savepoint_count: 0,
        };
        let result = f(&mut tx);

        let outcome = match result {
            Ok(value) => self
                .driver
                .commit()
                .map_err(transaction_error)
                .map(|_| value),
            Err(err) => match self.driver.rollback() {
                Ok(()) => Err(err),
                Err(rollback_err) => Err(Error::new(Reason::Transaction(format!(
                    "{err}; rollback also failed: {rollback_err}"
                )))
                .into()),
            },
        };

        let restored = self.driver.set_auto_commit(true);
        match (outcome, restored) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(transaction_error(e)),
            (outcome @ Err(_), _) => outcome,
        }
    }
}

/// A transaction scope, thread-confined for its lifetime. Queries run
/// through it on the same connection.
pub struct Transaction<'a, D: Driver> {
    client: &'a mut DbClient<D>,
    savepoint_count: usize,
}

impl<D: Driver> Transaction<'_, D> {
    pub fn run<Q: Queryable>(&mut self, query: &Select<Q>) -> Result<Vec<Q::Row>> {
        self.client.run(query)
    }

    pub fn run_one<Q: Queryable>(&mut self, query: &Select<Q>) -> Result<Q::Row> {
        self.client.run_one(query)
    }

    pub fn run_expr<T: SqlType>(&mut self, expr: &Expr<T>) -> Result<T> {
        self.client.run_expr(expr)
    }

    pub fn run_update(&mut self, statement: &impl Dml) -> Result<u64> {
        self.client.run_update(statement)
    }

    pub fn run_returning<R: Queryable>(&mut self, statement: &Returning<R>) -> Result<Vec<R::Row>> {
        self.client.run_returning(statement)
    }

    /// Abandons the transaction: the scope rolls back and the sentinel
    /// error propagates to the `transaction` caller.
    pub fn rollback<R>(&self) -> Result<R> {
        Err(Error::new(Reason::RolledBack).into())
    }

    /// A nested savepoint scope: released on success, rolled back to on
    /// error.
    pub fn savepoint<R>(
        &mut self,
        f: impl FnOnce(&mut Transaction<'_, D>) -> Result<R>,
    ) -> Result<R> {
        let name = format!("sp{}", self.savepoint_count);
        self.savepoint_count += 1;
        self.client
            .driver
            .set_savepoint(&name)
            .map_err(transaction_error)?;
        match f(&mut *self) {
            Ok(value) => {
                self.client
                    .driver
                    .release_savepoint(&name)
                    .map_err(transaction_error)?;
                Ok(value)
            }
            Err(err) => {
                match self.client.driver.rollback_to_savepoint(&name) {
                    Ok(()) => Err(err),
                    Err(rollback_err) => Err(Error::new(Reason::Transaction(format!(
                        "{err}; rollback to savepoint also failed: {rollback_err}"
                    )))
                    .into()),
                }
            }
        }
    }
}

fn prepare_bound<'d, D: Driver>(
    driver: &'d mut D,
    sql: &str,
    params: &[Param],
) -> Result<Box<dyn crate::driver::Statement + 'd>> {
    let mut stmt = driver
        .prepare(sql)
        .map_err(|e| driver_error(e, sql, params.len()))?;
    for (index, param) in params.iter().enumerate() {
        if !param.value.binds_as(param.type_code) {
            return Err(Error::new(Reason::Binding {
                expected: param.type_code.to_string(),
                found: param.value.kind_name().to_string(),
                position: index,
            })
            .into());
        }
        stmt.bind(index, param.type_code, &param.value)
            .map_err(|e| driver_error(e, sql, params.len()))?;
    }
    Ok(stmt)
}

fn driver_error(source: anyhow::Error, sql: &str, params: usize) -> anyhow::Error {
    Error::new(Reason::Driver {
        message: source.to_string(),
        sql: sql.to_string(),
        params,
    })
    .into()
}

fn transaction_error(source: anyhow::Error) -> anyhow::Error {
    Error::new(Reason::Transaction(source.to_string())).into()
}
