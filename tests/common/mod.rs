//! A scripted driver double and the shared example schema.

// not every test binary touches every table or reply variant
#![allow(dead_code)]

use std::collections::VecDeque;

use anyhow::anyhow;
use relq::{Cursor, Driver, Result, SqlValue, Statement, TypeCode};

relq::table! {
    table = "product";
    pub struct Product / ProductExpr / ProductCols {
        id: i64 [primary_key auto_increment],
        kebab_case_name: String,
        name: String,
        price: f64,
    }
}

relq::table! {
    table = "buyer";
    pub struct Buyer / BuyerExpr / BuyerCols {
        id: i64 [primary_key auto_increment],
        name: String,
        date_of_birth: String,
    }
}

relq::table! {
    table = "shipping_info";
    pub struct ShippingInfo / ShippingInfoExpr / ShippingInfoCols {
        id: i64 [primary_key auto_increment],
        buyer_id: i64,
        shipping_date: String,
    }
}

relq::table! {
    table = "purchase";
    pub struct Purchase / PurchaseExpr / PurchaseCols {
        id: i64 [primary_key auto_increment],
        shipping_info_id: i64,
        product_id: i64,
        count: i32,
        total: f64,
    }
}

relq::table! {
    table = "opt_cols";
    pub struct OptCols / OptColsExpr / OptColsCols {
        my_int: Option<i64>,
        my_str: Option<String>,
    }
}

/// One scripted reply per executed statement.
pub enum Reply {
    Rows(Vec<Vec<SqlValue>>),
    Count(u64),
    Fail(&'static str),
}

/// Records every driver call and pops one [Reply] per execution.
pub struct MockDriver {
    pub calls: Vec<String>,
    replies: VecDeque<Reply>,
}

impl MockDriver {
    pub fn new(replies: Vec<Reply>) -> Self {
        MockDriver {
            calls: Vec::new(),
            replies: replies.into(),
        }
    }

    pub fn empty() -> Self {
        MockDriver::new(Vec::new())
    }
}

impl Driver for MockDriver {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement + '_>> {
        self.calls.push(format!("prepare: {sql}"));
        Ok(Box::new(MockStatement { driver: self }))
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.calls.push(format!("set_auto_commit({enabled})"));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.calls.push("commit".to_string());
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.calls.push("rollback".to_string());
        Ok(())
    }

    fn set_savepoint(&mut self, name: &str) -> Result<()> {
        self.calls.push(format!("set_savepoint({name})"));
        Ok(())
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.calls.push(format!("rollback_to_savepoint({name})"));
        Ok(())
    }

    fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.calls.push(format!("release_savepoint({name})"));
        Ok(())
    }
}

struct MockStatement<'a> {
    driver: &'a mut MockDriver,
}

impl MockStatement<'_> {
    fn next_reply(&mut self) -> Result<Reply> {
        self.driver
            .replies
            .pop_front()
            .ok_or_else(|| anyhow!("mock driver ran out of scripted replies"))
    }
}

impl Statement for MockStatement<'_> {
    fn bind(&mut self, index: usize, code: TypeCode, value: &SqlValue) -> Result<()> {
        self.driver.calls.push(format!("bind {index} {code} {value:?}"));
        Ok(())
    }

    fn execute_query(&mut self) -> Result<Box<dyn Cursor + '_>> {
        self.driver.calls.push("execute_query".to_string());
        match self.next_reply()? {
            Reply::Rows(rows) => Ok(Box::new(MockCursor { rows, current: None })),
            Reply::Count(_) => Err(anyhow!("scripted an update reply for a query")),
            Reply::Fail(message) => Err(anyhow!(message)),
        }
    }

    fn execute_update(&mut self) -> Result<u64> {
        self.driver.calls.push("execute_update".to_string());
        match self.next_reply()? {
            Reply::Count(count) => Ok(count),
            Reply::Rows(_) => Err(anyhow!("scripted a query reply for an update")),
            Reply::Fail(message) => Err(anyhow!(message)),
        }
    }
}

struct MockCursor {
    rows: Vec<Vec<SqlValue>>,
    current: Option<usize>,
}

impl Cursor for MockCursor {
    fn advance(&mut self) -> Result<bool> {
        let next = self.current.map(|i| i + 1).unwrap_or(0);
        self.current = Some(next);
        Ok(next < self.rows.len())
    }

    fn get(&mut self, index: usize, _code: TypeCode) -> Result<SqlValue> {
        let row = self
            .current
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| anyhow!("cursor is not positioned on a row"))?;
        row.get(index)
            .cloned()
            .ok_or_else(|| anyhow!("column {index} out of range"))
    }
}
