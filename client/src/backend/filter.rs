use super::Row;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;

/// Row predicate in disjunctive normal form: the row matches when every
/// `column = value` test of at least one group holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    groups: Vec<Vec<(String, Value)>>,
}

impl Filter {
    /// Matches every row.
    pub fn all() -> Self {
        Self {
            groups: vec![Vec::new()],
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            groups: vec![vec![(column.into(), value.into())]],
        }
    }

    /// Adds `column = value` to every group.
    pub fn and_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        for group in &mut self.groups {
            group.push((column.clone(), value.clone()));
        }
        self
    }

    pub fn or(mut self, other: Filter) -> Self {
        self.groups.extend(other.groups);
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.groups.iter().any(|group| {
            group
                .iter()
                .all(|(column, expected)| row.get(column) == Some(expected))
        })
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }

    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ordering = compare_values(a.get(&self.column), b.get(&self.column));
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }

    /// Stable sort, so rows with equal keys keep insertion order.
    pub fn sort(&self, rows: &mut [Row]) {
        rows.sort_by(|a, b| self.compare(a, b));
    }
}

// Missing values sort first. Timestamps compare chronologically because
// RFC 3339 strings with differing fractional precision do not sort lexically.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (parse_timestamp(a), parse_timestamp(b)) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
