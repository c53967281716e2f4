//! Execution: binding, decoding, and transaction scoping against a
//! scripted driver.

mod common;

use anyhow::anyhow;
use common::{Buyer, MockDriver, Product, Reply, ShippingInfo};
use relq::{downcast, Config, DbClient, Dialect, Expr, Reason, Result, SqlValue, Table};
use similar_asserts::assert_eq;

fn client(replies: Vec<Reply>) -> DbClient<MockDriver> {
    DbClient::new(MockDriver::new(replies), Config::new(Dialect::Ansi))
}

#[test]
fn decodes_mapped_scalar_rows() {
    let q = Product::select()
        .sort_by(|p| p.price)
        .map(|p| p.name)
        .take(2)
        .drop(1);
    let mut db = client(vec![Reply::Rows(vec![vec![SqlValue::Text(
        "Socks".to_string(),
    )]])]);
    assert_eq!(db.run(&q).unwrap(), vec!["Socks".to_string()]);

    let calls = &db.driver().calls;
    assert_eq!(
        calls[0],
        "prepare: SELECT product0.name as res FROM product product0 \
         ORDER BY product0.price LIMIT 1 OFFSET 1"
    );
}

#[test]
fn decodes_except_results() {
    let q = Product::select()
        .map(|p| p.name.to_lowercase())
        .except(Product::select().map(|p| p.kebab_case_name.to_lowercase()));
    let mut db = client(vec![Reply::Rows(vec![
        vec![SqlValue::Text("face mask".to_string())],
        vec![SqlValue::Text("skate board".to_string())],
    ])]);
    assert_eq!(
        db.run(&q).unwrap(),
        vec!["face mask".to_string(), "skate board".to_string()]
    );
}

#[test]
fn left_join_decodes_missing_side_to_none() {
    let q = Buyer::select().left_join(ShippingInfo::select(), |b, s| b.id.eq(s.buyer_id));
    let mut db = client(vec![Reply::Rows(vec![
        vec![
            SqlValue::Int(1),
            SqlValue::Text("A".to_string()),
            SqlValue::Text("2001-04-07".to_string()),
            SqlValue::Int(10),
            SqlValue::Int(1),
            SqlValue::Text("2010-02-03".to_string()),
        ],
        vec![
            SqlValue::Int(3),
            SqlValue::Text("C".to_string()),
            SqlValue::Text("2003-06-09".to_string()),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
        ],
    ])]);

    let rows = db.run(&q).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        (
            Buyer {
                id: 1,
                name: "A".to_string(),
                date_of_birth: "2001-04-07".to_string(),
            },
            Some(ShippingInfo {
                id: 10,
                buyer_id: 1,
                shipping_date: "2010-02-03".to_string(),
            })
        )
    );
    assert_eq!(rows[1].1, None);
    assert_eq!(rows[1].0.name, "C");
}

#[test]
fn batched_insert_reports_affected_rows() {
    let insert = Buyer::insert().batched(
        |c| (c.name, c.date_of_birth),
        [
            ("A".to_string(), "2001-04-07".to_string()),
            ("B".to_string(), "2002-05-08".to_string()),
            ("C".to_string(), "2003-06-09".to_string()),
        ],
    );
    let mut db = client(vec![Reply::Count(3)]);
    assert_eq!(db.run_update(&insert).unwrap(), 3);

    let binds = db
        .driver()
        .calls
        .iter()
        .filter(|c| c.starts_with("bind"))
        .count();
    assert_eq!(binds, 6);
}

#[test]
fn driver_errors_carry_the_failed_statement() {
    let q = Product::select().map(|p| p.name);
    let mut db = client(vec![Reply::Fail("no such table: product")]);
    let err = db.run(&q).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("no such table: product"), "got: {message}");
    assert!(message.contains("statement `SELECT"), "got: {message}");
}

#[test]
fn decoding_errors_name_the_column() {
    let q = Product::select().map(|p| p.name);
    let mut db = client(vec![Reply::Rows(vec![vec![SqlValue::Int(5)]])]);
    let err = db.run(&q).unwrap_err();
    assert!(
        err.to_string().contains("decoding error at column `res`"),
        "got: {err}"
    );
}

#[test]
fn run_one_rejects_multiple_rows() {
    let q = Product::select().map(|p| p.id);
    let mut db = client(vec![Reply::Rows(vec![
        vec![SqlValue::Int(1)],
        vec![SqlValue::Int(2)],
    ])]);
    assert!(db.run_one(&q).is_err());
}

#[test]
fn bare_expression_gets_the_dialect_suffix() {
    let sum = Expr::lit(1i64) + Expr::lit(2i64);

    let mut db = DbClient::new(
        MockDriver::new(vec![Reply::Rows(vec![vec![SqlValue::Int(3)]])]),
        Config::new(Dialect::HsqlDb),
    );
    assert_eq!(db.run_expr(&sum).unwrap(), 3);
    assert_eq!(
        db.driver().calls[0],
        "prepare: SELECT ? + ? as res FROM (VALUES (0))"
    );

    let mut db = client(vec![Reply::Rows(vec![vec![SqlValue::Int(3)]])]);
    assert_eq!(db.run_expr(&sum).unwrap(), 3);
    assert_eq!(db.driver().calls[0], "prepare: SELECT ? + ? as res");
}

#[test]
fn returning_decodes_generated_keys() {
    let insert = Buyer::insert()
        .values(|c| vec![c.name.set("A"), c.date_of_birth.set("2001-04-07")])
        .returning(|b| b.id);
    let mut db = DbClient::new(
        MockDriver::new(vec![Reply::Rows(vec![vec![SqlValue::Int(42)]])]),
        Config::new(Dialect::Postgres),
    );
    assert_eq!(db.run_returning(&insert).unwrap(), vec![42]);
}

#[test]
fn transaction_commits_on_success() {
    let insert = Buyer::insert().values(|c| vec![c.name.set("A")]);
    let mut db = client(vec![Reply::Count(1)]);

    let affected = db.transaction(|tx| tx.run_update(&insert)).unwrap();
    assert_eq!(affected, 1);

    let calls = &db.driver().calls;
    assert_eq!(calls.first().unwrap(), "set_auto_commit(false)");
    assert_eq!(calls.last().unwrap(), "set_auto_commit(true)");
    assert_eq!(calls[calls.len() - 2], "commit");
    assert!(!calls.contains(&"rollback".to_string()));
}

#[test]
fn transaction_rolls_back_on_error() {
    let insert = Buyer::insert().values(|c| vec![c.name.set("A")]);
    let mut db = client(vec![Reply::Fail("constraint violation")]);

    let result = db.transaction(|tx| tx.run_update(&insert));
    assert!(result.is_err());

    let calls = &db.driver().calls;
    assert!(calls.contains(&"rollback".to_string()));
    assert_eq!(calls.last().unwrap(), "set_auto_commit(true)");
    assert!(!calls.contains(&"commit".to_string()));
}

#[test]
fn explicit_rollback_propagates_the_marker() {
    let mut db = client(vec![]);
    let result: Result<()> = db.transaction(|tx| tx.rollback());
    let err = result.unwrap_err();
    assert!(matches!(downcast(&err).unwrap().reason, Reason::RolledBack));
    assert!(db.driver().calls.contains(&"rollback".to_string()));
}

#[test]
fn savepoints_nest_with_the_same_discipline() {
    let insert = Buyer::insert().values(|c| vec![c.name.set("A")]);
    let mut db = client(vec![Reply::Count(1)]);

    db.transaction(|tx| {
        tx.savepoint(|inner| inner.run_update(&insert))?;
        let failed: Result<()> = tx.savepoint(|_| Err(anyhow!("inner failure")));
        assert!(failed.is_err());
        Ok(())
    })
    .unwrap();

    let calls = &db.driver().calls;
    let position = |needle: &str| {
        calls
            .iter()
            .position(|c| c == needle)
            .unwrap_or_else(|| panic!("missing `{needle}` in {calls:?}"))
    };
    assert!(position("set_savepoint(sp0)") < position("release_savepoint(sp0)"));
    assert!(position("set_savepoint(sp1)") < position("rollback_to_savepoint(sp1)"));
    assert!(position("rollback_to_savepoint(sp1)") < position("commit"));
}
