pub use anyhow::Result;

use serde::Serialize;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};

/// Error raised while building, rendering, executing or decoding a query.
#[derive(Debug, Clone)]
pub struct Error {
    pub reason: Reason,
    pub help: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub enum Reason {
    /// Malformed IR discovered during rendering. No partial SQL is returned.
    Rendering(String),

    /// A value cannot be bound under its declared type mapper.
    Binding {
        expected: String,
        found: String,
        position: usize,
    },

    /// An error reported by the underlying connection, with the failed SQL
    /// text and parameter count attached.
    Driver {
        message: String,
        sql: String,
        params: usize,
    },

    /// The result set's shape does not match the projection.
    Decoding { path: String, message: String },

    /// A failure within a `transaction` or `savepoint` scope. When rollback
    /// itself fails, the rollback failure is chained into the message.
    Transaction(String),

    /// Explicit `rollback()` inside a transaction scope. The scope performs
    /// the rollback and propagates this marker to the caller.
    RolledBack,
}

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error { reason, help: None }
    }

    pub fn rendering<S: Into<String>>(message: S) -> Self {
        Error::new(Reason::Rendering(message.into()))
    }

    pub fn decoding<S: Into<String>>(path: S, message: S) -> Self {
        Error::new(Reason::Decoding {
            path: path.into(),
            message: message.into(),
        })
    }

    pub fn with_help<S: Into<String>>(mut self, help: S) -> Self {
        self.help = Some(help.into());
        self
    }
}

// Needed for anyhow
impl StdError for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.reason, f)?;
        if let Some(help) = &self.help {
            write!(f, " (help: {help})")?;
        }
        Ok(())
    }
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Rendering(text) => write!(f, "rendering error: {text}"),
            Reason::Binding {
                expected,
                found,
                position,
            } => write!(
                f,
                "binding error at parameter {position}: expected {expected}, found {found}"
            ),
            Reason::Driver {
                message,
                sql,
                params,
            } => write!(
                f,
                "driver error: {message}; statement `{sql}` with {params} parameter(s)"
            ),
            Reason::Decoding { path, message } => {
                write!(f, "decoding error at column `{path}`: {message}")
            }
            Reason::Transaction(text) => write!(f, "transaction error: {text}"),
            Reason::RolledBack => write!(f, "transaction rolled back"),
        }
    }
}

/// Downcasts an [anyhow::Error] back into [Error], if it carries one.
pub fn downcast(error: &anyhow::Error) -> Option<&Error> {
    error.downcast_ref::<Error>()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let e = Error::new(Reason::Driver {
            message: "connection reset".to_string(),
            sql: "SELECT ?".to_string(),
            params: 1,
        });
        assert_eq!(
            e.to_string(),
            "driver error: connection reset; statement `SELECT ?` with 1 parameter(s)"
        );

        let e = Error::rendering("order key not exported").with_help("project the column first");
        assert_eq!(
            e.to_string(),
            "rendering error: order key not exported (help: project the column first)"
        );
    }

    #[test]
    fn test_downcast() {
        let e: anyhow::Error = Error::new(Reason::RolledBack).into();
        assert!(matches!(downcast(&e).unwrap().reason, Reason::RolledBack));
    }
}
