//! Walking query shapes into flat projections and back.
//!
//! A [Queryable] is any shape a select can produce: a scalar expression, a
//! tuple of queryables, a table's expression row, or a [Nullable] wrapper
//! from the optional side of an outer join. The shape is walked into an
//! ordered list of named projected columns before rendering, and the same
//! walk order decodes result rows positionally.

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::query::{ProjectedColumn, SourceId};
use crate::types::{SqlType, SqlValue, TypeCode};

/// The alias a projected column is re-exposed under from a subquery.
pub fn result_alias(path: &[&'static str]) -> String {
    if path.is_empty() {
        "res".to_string()
    } else {
        format!("res__{}", path.join("__"))
    }
}

/// One result row, pre-read into values, consumed in walk order.
pub struct RowDecoder {
    values: Vec<SqlValue>,
    columns: Vec<String>,
    idx: usize,
}

impl RowDecoder {
    pub fn new(values: Vec<SqlValue>, columns: Vec<String>) -> Self {
        RowDecoder {
            values,
            columns,
            idx: 0,
        }
    }

    fn column_name(&self, idx: usize) -> String {
        self.columns
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("#{idx}"))
    }

    pub fn read<T: SqlType>(&mut self) -> Result<T> {
        let idx = self.idx;
        let value = self.values.get(idx).cloned().ok_or_else(|| {
            Error::decoding(
                self.column_name(idx),
                "missing column in result row".to_string(),
            )
        })?;
        self.idx += 1;
        T::from_value(value)
            .map_err(|e| Error::decoding(self.column_name(idx), e.to_string()).into())
    }

    /// Whether the next `width` values are all NULL.
    pub fn next_all_null(&self, width: usize) -> bool {
        (0..width).all(|i| {
            self.values
                .get(self.idx + i)
                .map(SqlValue::is_null)
                .unwrap_or(false)
        })
    }

    pub fn skip(&mut self, width: usize) {
        self.idx += width;
    }
}

pub trait Queryable: Clone {
    /// The result-side shape: identity for scalars, tuples for tuples,
    /// `Option<_>` for [Nullable].
    type Row;

    /// Flattens the shape into ordered `(column-path, expr)` pairs.
    fn walk(&self, path: &mut Vec<&'static str>, out: &mut Vec<ProjectedColumn>);

    /// Rebuilds the same shape with every leaf replaced by a reference to
    /// the column this shape exports from `source`.
    fn rebind(&self, source: SourceId, path: &mut Vec<&'static str>) -> Self;

    /// Leaf type codes in walk order, for reading the result set.
    fn type_codes(&self, out: &mut Vec<TypeCode>);

    fn width(&self) -> usize {
        let mut codes = Vec::new();
        self.type_codes(&mut codes);
        codes.len()
    }

    fn decode(&self, row: &mut RowDecoder) -> Result<Self::Row>;

    /// The full projection of this shape, walked from the root.
    fn projection(&self) -> Vec<ProjectedColumn> {
        let mut path = Vec::new();
        let mut out = Vec::new();
        self.walk(&mut path, &mut out);
        out
    }

    /// The shape as re-exported by a subquery under `source`.
    fn rebound(&self, source: SourceId) -> Self {
        let mut path = Vec::new();
        self.rebind(source, &mut path)
    }
}

impl<T: SqlType> Queryable for Expr<T> {
    type Row = T;

    fn walk(&self, path: &mut Vec<&'static str>, out: &mut Vec<ProjectedColumn>) {
        out.push(ProjectedColumn {
            path: path.iter().map(|s| s.to_string()).collect(),
            expr: self.kind.clone(),
        });
    }

    fn rebind(&self, source: SourceId, path: &mut Vec<&'static str>) -> Self {
        Expr::column(source, &result_alias(path))
    }

    fn type_codes(&self, out: &mut Vec<TypeCode>) {
        out.push(T::TYPE_CODE);
    }

    fn decode(&self, row: &mut RowDecoder) -> Result<T> {
        row.read::<T>()
    }
}

/// Query-side result of an outer-join side that may be absent. Wraps the
/// expressions of `Q`; reads back as `Option<Q::Row>`, `None` when every
/// column of the side is NULL.
#[derive(Debug, Clone)]
pub struct Nullable<Q>(pub Q);

impl<Q: Queryable> Queryable for Nullable<Q> {
    type Row = Option<Q::Row>;

    fn walk(&self, path: &mut Vec<&'static str>, out: &mut Vec<ProjectedColumn>) {
        self.0.walk(path, out);
    }

    fn rebind(&self, source: SourceId, path: &mut Vec<&'static str>) -> Self {
        Nullable(self.0.rebind(source, path))
    }

    fn type_codes(&self, out: &mut Vec<TypeCode>) {
        self.0.type_codes(out);
    }

    fn decode(&self, row: &mut RowDecoder) -> Result<Option<Q::Row>> {
        let width = self.0.width();
        if row.next_all_null(width) {
            row.skip(width);
            Ok(None)
        } else {
            self.0.decode(row).map(Some)
        }
    }
}

macro_rules! impl_queryable_for_tuple {
    ($( ($($name:ident / $seg:literal),+) )+) => {
        $(
            impl<$($name: Queryable),+> Queryable for ($($name,)+) {
                type Row = ($($name::Row,)+);

                fn walk(&self, path: &mut Vec<&'static str>, out: &mut Vec<ProjectedColumn>) {
                    #[allow(non_snake_case)]
                    let ($($name,)+) = self;
                    $(
                        path.push($seg);
                        $name.walk(path, out);
                        path.pop();
                    )+
                }

                fn rebind(&self, source: SourceId, path: &mut Vec<&'static str>) -> Self {
                    #[allow(non_snake_case)]
                    let ($($name,)+) = self;
                    ($({
                        path.push($seg);
                        let e = $name.rebind(source, path);
                        path.pop();
                        e
                    },)+)
                }

                fn type_codes(&self, out: &mut Vec<TypeCode>) {
                    #[allow(non_snake_case)]
                    let ($($name,)+) = self;
                    $( $name.type_codes(out); )+
                }

                fn decode(&self, row: &mut RowDecoder) -> Result<Self::Row> {
                    #[allow(non_snake_case)]
                    let ($($name,)+) = self;
                    Ok(($($name.decode(row)?,)+))
                }
            }
        )+
    };
}

// Arity is capped at 22; beyond that, nest tuples.
impl_queryable_for_tuple! {
    (A / "0", B / "1")
    (A / "0", B / "1", C / "2")
    (A / "0", B / "1", C / "2", D / "3")
    (A / "0", B / "1", C / "2", D / "3", E / "4")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10", L / "11")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10", L / "11", M / "12")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10", L / "11", M / "12", N / "13")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10", L / "11", M / "12", N / "13", O / "14")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10", L / "11", M / "12", N / "13", O / "14", P / "15")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10", L / "11", M / "12", N / "13", O / "14", P / "15", Q / "16")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10", L / "11", M / "12", N / "13", O / "14", P / "15", Q / "16", R / "17")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10", L / "11", M / "12", N / "13", O / "14", P / "15", Q / "16", R / "17", S / "18")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10", L / "11", M / "12", N / "13", O / "14", P / "15", Q / "16", R / "17", S / "18", T / "19")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10", L / "11", M / "12", N / "13", O / "14", P / "15", Q / "16", R / "17", S / "18", T / "19", U / "20")
    (A / "0", B / "1", C / "2", D / "3", E / "4", F / "5", G / "6", H / "7", I / "8", J / "9", K / "10", L / "11", M / "12", N / "13", O / "14", P / "15", Q / "16", R / "17", S / "18", T / "19", U / "20", V / "21")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_walk_paths() {
        let source = SourceId::next();
        let shape = (
            Expr::<i64>::column(source, "id"),
            (
                Expr::<String>::column(source, "name"),
                Expr::<f64>::column(source, "price"),
            ),
        );
        let projection = shape.projection();
        let aliases: Vec<_> = projection.iter().map(|c| c.alias()).collect();
        assert_eq!(aliases, ["res__0", "res__1__0", "res__1__1"]);
    }

    #[test]
    fn test_rebind_targets_result_aliases() {
        let source = SourceId::next();
        let shape = (
            Expr::<i64>::column(source, "id"),
            Expr::<String>::column(source, "name"),
        );
        let subquery = SourceId::next();
        let rebound = shape.rebound(subquery);
        let (src, name) = rebound.1.kind().as_column().unwrap();
        assert_eq!(*src, subquery);
        assert_eq!(name, "res__1");
    }

    #[test]
    fn test_decode_tuple() {
        let source = SourceId::next();
        let shape = (
            Expr::<i64>::column(source, "id"),
            Expr::<String>::column(source, "name"),
        );
        let mut row = RowDecoder::new(
            vec![SqlValue::Int(3), SqlValue::Text("Socks".to_string())],
            vec!["res__0".to_string(), "res__1".to_string()],
        );
        assert_eq!(shape.decode(&mut row).unwrap(), (3, "Socks".to_string()));
    }

    #[test]
    fn test_decode_nullable_all_null() {
        let source = SourceId::next();
        let shape = Nullable((
            Expr::<i64>::column(source, "id"),
            Expr::<String>::column(source, "name"),
        ));
        let mut row = RowDecoder::new(
            vec![SqlValue::Null, SqlValue::Null],
            vec!["res__0".to_string(), "res__1".to_string()],
        );
        assert_eq!(shape.decode(&mut row).unwrap(), None);
    }

    #[test]
    fn test_decode_error_carries_path() {
        let source = SourceId::next();
        let shape = Expr::<i64>::column(source, "id");
        let mut row = RowDecoder::new(
            vec![SqlValue::Text("oops".to_string())],
            vec!["res".to_string()],
        );
        let err = shape.decode(&mut row).unwrap_err();
        assert!(err.to_string().contains("`res`"));
    }
}
