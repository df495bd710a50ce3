use crate::core::{Record, Result, Value};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    IsNull,
    IsNotNull,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    /// A missing column reads as NULL.
    pub fn matches(&self, record: &Record) -> Result<bool> {
        let actual = record.get(&self.column).unwrap_or(&Value::Null);

        match self.operator {
            Operator::IsNull => return Ok(actual.is_null()),
            Operator::IsNotNull => return Ok(!actual.is_null()),
            _ => {}
        }

        // Comparisons against NULL never match
        if actual.is_null() || self.value.is_null() {
            return Ok(false);
        }

        let ordering = actual.compare(&self.value)?;
        Ok(match self.operator {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::NotEq => ordering != Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::LtEq => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::GtEq => ordering != Ordering::Less,
            Operator::IsNull | Operator::IsNotNull => unreachable!("handled above"),
        })
    }
}

/// Conjunction of conditions. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().and(column, Operator::Eq, value)
    }

    pub fn and(
        mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn and_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(column, Operator::Eq, value)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, record: &Record) -> Result<bool> {
        for condition in &self.conditions {
            if !condition.matches(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "TRUE");
        }
        let rendered: Vec<String> = self
            .conditions
            .iter()
            .map(|c| match c.operator {
                Operator::IsNull | Operator::IsNotNull => format!("{} {}", c.column, c.operator),
                _ => format!("{} {} {}", c.column, c.operator, c.value),
            })
            .collect();
        write!(f, "{}", rendered.join(" AND "))
    }
}
