//! SQL fragments: literal text interleaved with typed parameter slots.
//!
//! User data never enters the SQL text; it travels in slots and is bound
//! positionally. The number of `?` markers in the rendered text always
//! equals the number of slots, in left-to-right order.

use serde::{Deserialize, Serialize};

use crate::types::{SqlValue, TypeCode};

/// A parameter slot: a value tagged with the type code it binds under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub type_code: TypeCode,
    pub value: SqlValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Chunk {
    Text(String),
    Param(Param),
}

/// An immutable-once-built SQL fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlFragment {
    chunks: Vec<Chunk>,

    /// A fragment known to already be a complete statement; the renderer
    /// must not append a default suffix to it.
    complete: bool,
}

impl SqlFragment {
    pub fn new() -> Self {
        SqlFragment::default()
    }

    /// A fragment of raw text. Only for keywords and identifiers already
    /// passed through a name mapper, never for user data.
    pub fn raw<S: Into<String>>(text: S) -> Self {
        SqlFragment {
            chunks: vec![Chunk::Text(text.into())],
            complete: false,
        }
    }

    pub fn param(param: Param) -> Self {
        SqlFragment {
            chunks: vec![Chunk::Param(param)],
            complete: false,
        }
    }

    pub fn push_str(&mut self, text: &str) {
        // coalesce adjacent text chunks
        if let Some(Chunk::Text(last)) = self.chunks.last_mut() {
            last.push_str(text);
        } else {
            self.chunks.push(Chunk::Text(text.to_string()));
        }
    }

    pub fn push_param(&mut self, param: Param) {
        self.chunks.push(Chunk::Param(param));
    }

    pub fn append(&mut self, other: SqlFragment) {
        let mut chunks = other.chunks.into_iter();
        if let Some(first) = chunks.next() {
            match first {
                Chunk::Text(text) => self.push_str(&text),
                param => self.chunks.push(param),
            }
        }
        self.chunks.extend(chunks);
    }

    /// Joins `items` with `sep` between each pair.
    pub fn join<I>(sep: &str, items: I) -> Self
    where
        I: IntoIterator<Item = SqlFragment>,
    {
        let mut out = SqlFragment::new();
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                out.push_str(sep);
            }
            out.append(item);
        }
        out
    }

    /// Wraps the fragment in parentheses.
    pub fn parens(self) -> Self {
        let mut out = SqlFragment::raw("(");
        out.append(self);
        out.push_str(")");
        out
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn param_count(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| matches!(c, Chunk::Param(_)))
            .count()
    }

    /// Renders the final SQL text and parameter vector in one left-to-right
    /// pass, interpolating a `?` marker per slot.
    pub fn into_parts(self) -> (String, Vec<Param>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        for chunk in self.chunks {
            match chunk {
                Chunk::Text(text) => sql.push_str(&text),
                Chunk::Param(param) => {
                    sql.push('?');
                    params.push(param);
                }
            }
        }
        (sql, params)
    }
}

impl From<&str> for SqlFragment {
    fn from(text: &str) -> Self {
        SqlFragment::raw(text)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn int(i: i64) -> Param {
        Param {
            type_code: TypeCode::BigInt,
            value: SqlValue::Int(i),
        }
    }

    #[test]
    fn test_marker_slot_invariant() {
        let mut f = SqlFragment::raw("SELECT ");
        f.push_param(int(1));
        f.push_str(" + ");
        f.push_param(int(2));

        assert_eq!(f.param_count(), 2);
        let (sql, params) = f.into_parts();
        assert_eq!(sql, "SELECT ? + ?");
        assert_eq!(sql.matches('?').count(), params.len());
        assert_eq!(params, vec![int(1), int(2)]);
    }

    #[test]
    fn test_append_preserves_order() {
        let mut left = SqlFragment::raw("a = ");
        left.push_param(int(1));
        let mut right = SqlFragment::raw(" AND b = ");
        right.push_param(int(2));
        left.append(right);

        let (sql, params) = left.into_parts();
        assert_eq!(sql, "a = ? AND b = ?");
        assert_eq!(params, vec![int(1), int(2)]);
    }

    #[test]
    fn test_join() {
        let items = vec![
            SqlFragment::param(int(1)),
            SqlFragment::param(int(2)),
            SqlFragment::param(int(3)),
        ];
        let (sql, params) = SqlFragment::join(", ", items).into_parts();
        assert_eq!(sql, "?, ?, ?");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_parens() {
        let (sql, _) = SqlFragment::raw("VALUES (0)").parens().into_parts();
        assert_eq!(sql, "(VALUES (0))");
    }

    #[test]
    fn test_complete_marker() {
        let mut f = SqlFragment::raw("DELETE FROM t");
        assert!(!f.is_complete());
        f.mark_complete();
        assert!(f.is_complete());
    }
}
