//! Identifier mapping between Rust-side names and SQL identifiers.

use std::fmt;
use std::sync::Arc;

/// Maps table and column names before they enter SQL text.
#[derive(Clone, Default)]
pub enum IdentMapper {
    Identity,
    LowerCase,
    #[default]
    SnakeCase,
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl IdentMapper {
    pub fn apply(&self, name: &str) -> String {
        match self {
            IdentMapper::Identity => name.to_string(),
            IdentMapper::LowerCase => name.to_lowercase(),
            IdentMapper::SnakeCase => snake_case(name),
            IdentMapper::Custom(f) => f(name),
        }
    }
}

impl fmt::Debug for IdentMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentMapper::Identity => write!(f, "Identity"),
            IdentMapper::LowerCase => write!(f, "LowerCase"),
            IdentMapper::SnakeCase => write!(f, "SnakeCase"),
            IdentMapper::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Converts `camelCase` / `PascalCase` to `snake_case`. Idempotent on names
/// that are already snake case.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("kebabCaseName"), "kebab_case_name");
        assert_eq!(snake_case("ShippingInfo"), "shipping_info");
        assert_eq!(snake_case("date_of_birth"), "date_of_birth");
        assert_eq!(snake_case("id"), "id");
    }

    #[test]
    fn test_mappers() {
        assert_eq!(IdentMapper::Identity.apply("MyTable"), "MyTable");
        assert_eq!(IdentMapper::LowerCase.apply("MyTable"), "mytable");
        assert_eq!(IdentMapper::SnakeCase.apply("MyTable"), "my_table");
        let custom = IdentMapper::Custom(Arc::new(|s| format!("t_{s}")));
        assert_eq!(custom.apply("buyer"), "t_buyer");
    }
}
