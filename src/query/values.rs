//! Literal inline tables.

use crate::expr::Expr;
use crate::fragment::Param;
use crate::queryable::Queryable;
use crate::types::SqlType;

use super::{FromKind, FromSource, Select, SelectIr, SimpleSelect, SourceId, ValuesIr};

/// A select over a literal inline table with one column named `value`, e.g.
/// `(VALUES (?), (?), (?))`. Composes like any other select.
pub fn values<T, I>(items: I) -> Select<Expr<T>>
where
    T: SqlType,
    I: IntoIterator<Item = T>,
{
    let id = SourceId::next();
    let rows = items
        .into_iter()
        .map(|item| Param {
            type_code: T::TYPE_CODE,
            value: item.to_value(),
        })
        .collect();
    let from = FromSource {
        id,
        kind: FromKind::Values(ValuesIr {
            column: "value".to_string(),
            rows,
        }),
    };
    let shape = Expr::column(id, "value");
    Select::raw(
        SelectIr::Simple(SimpleSelect::new(shape.projection(), from)),
        shape,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_values_shape() {
        let q = values::<i64, _>([1, 2, 3]);
        let simple = q.ir().as_simple().unwrap();
        let values = simple.from[0].kind.as_values().unwrap();
        assert_eq!(values.rows.len(), 3);
        assert_eq!(values.column, "value");
        assert_eq!(simple.projection.len(), 1);
    }

    #[test]
    fn test_values_compose() {
        let q = values::<i64, _>([1, 2, 3]).filter(|v| v.gt(1i64));
        assert_eq!(q.ir().as_simple().unwrap().where_.len(), 1);
    }
}
