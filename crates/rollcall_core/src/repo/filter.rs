//! Composable `WHERE` clause builder over typed column identifiers.
//!
//! Column names come from a closed enum and every value is bound as a
//! parameter, so no caller-supplied text ever reaches the SQL string.

use rusqlite::types::Value;

/// A column that may appear in a generated predicate.
pub trait FilterColumn: Copy {
    fn sql_name(self) -> &'static str;
}

/// One typed comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<C: FilterColumn> {
    Eq(C, Value),
    Gt(C, Value),
    In(C, Vec<Value>),
}

/// Conjunction of predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter<C: FilterColumn> {
    predicates: Vec<Predicate<C>>,
}

impl<C: FilterColumn> Default for SqlFilter<C> {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }
}

impl<C: FilterColumn> SqlFilter<C> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn and(mut self, predicate: Predicate<C>) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Renders ` WHERE ...` (or an empty string) plus positional binds.
    ///
    /// An empty `In` list renders as a predicate that matches nothing.
    pub fn render(&self) -> (String, Vec<Value>) {
        if self.predicates.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut clauses = Vec::with_capacity(self.predicates.len());
        let mut binds = Vec::new();
        for predicate in &self.predicates {
            match predicate {
                Predicate::Eq(column, value) => {
                    clauses.push(format!("{} = ?", column.sql_name()));
                    binds.push(value.clone());
                }
                Predicate::Gt(column, value) => {
                    clauses.push(format!("{} > ?", column.sql_name()));
                    binds.push(value.clone());
                }
                Predicate::In(_, values) if values.is_empty() => {
                    clauses.push("0 = 1".to_string());
                }
                Predicate::In(column, values) => {
                    let placeholders = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{} IN ({placeholders})", column.sql_name()));
                    binds.extend(values.iter().cloned());
                }
            }
        }

        (format!(" WHERE {}", clauses.join(" AND ")), binds)
    }
}
