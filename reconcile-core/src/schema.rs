//! Structural table metadata shared by the reader, differ, and DDL generator.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

/// Definition of a table column as reported by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    /// Name of the column.
    pub name: String,
    /// Raw column type string, e.g. `varchar(255)` or `int unsigned`.
    pub column_type: String,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Default value, if any. `None` and `Some("")` are different values.
    pub default: Option<String>,
    /// Extra attributes such as `auto_increment`. Empty when there are none.
    #[serde(default)]
    pub extra: String,
}

impl Column {
    /// True when any compared attribute differs from `other`.
    pub fn differs_from(&self, other: &Column) -> bool {
        self.column_type != other.column_type
            || self.nullable != other.nullable
            || self.default != other.default
            || self.extra != other.extra
    }
}

/// One column mapping of a foreign key constraint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyEntry {
    /// Local column name.
    pub column: String,
    /// Schema of the referenced table, when the catalog recorded it.
    pub ref_schema: Option<String>,
    /// Referenced table name.
    pub ref_table: String,
    /// Referenced column name.
    pub ref_column: String,
}

/// Unique constraints keyed by constraint name; values are ordered column lists.
pub type UniqueConstraints = BTreeMap<String, Vec<String>>;

/// Foreign keys keyed by constraint name.
pub type ForeignKeys = BTreeMap<String, Vec<ForeignKeyEntry>>;

/// Structural facts about one table on one side.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSnapshot {
    /// Columns in catalog ordinal order.
    pub columns: Vec<Column>,
    /// Primary key columns in key order. Empty when the table has no primary key.
    pub primary_key: Vec<String>,
    /// Named unique constraints.
    pub unique_constraints: UniqueConstraints,
    /// Named foreign keys.
    pub foreign_keys: ForeignKeys,
}

impl TableSnapshot {
    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Which configured side acts as the source of truth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Make the "to" side match the "from" side.
    #[default]
    FromTo,
    /// Make the "from" side match the "to" side.
    ToFrom,
}

impl Direction {
    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Direction::FromTo => Direction::ToFrom,
            Direction::ToFrom => Direction::FromTo,
        }
    }

    /// Order a `(from, to)` pair as `(source, destination)` for this direction.
    pub fn orient<T>(self, from: T, to: T) -> (T, T) {
        match self {
            Direction::FromTo => (from, to),
            Direction::ToFrom => (to, from),
        }
    }
}

impl FromStr for Direction {
    type Err = ReconcileError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "from_to" | "from-to" => Ok(Direction::FromTo),
            "to_from" | "to-from" => Ok(Direction::ToFrom),
            _ => Err(ReconcileError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::FromTo => write!(f, "from_to"),
            Direction::ToFrom => write!(f, "to_from"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, ty: &str) -> Column {
        Column {
            name: name.to_string(),
            column_type: ty.to_string(),
            nullable: false,
            default: None,
            extra: String::new(),
        }
    }

    #[test]
    fn test_column_identical_does_not_differ() {
        assert!(!col("id", "int").differs_from(&col("id", "int")));
    }

    #[test]
    fn test_column_type_difference() {
        assert!(col("email", "varchar(255)").differs_from(&col("email", "varchar(191)")));
    }

    #[test]
    fn test_column_null_default_differs_from_empty_default() {
        let mut a = col("note", "varchar(10)");
        let mut b = a.clone();
        a.default = None;
        b.default = Some(String::new());
        assert!(a.differs_from(&b));
    }

    #[test]
    fn test_column_extra_difference() {
        let a = col("id", "int");
        let mut b = a.clone();
        b.extra = "auto_increment".to_string();
        assert!(a.differs_from(&b));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("from_to".parse::<Direction>().unwrap(), Direction::FromTo);
        assert_eq!("TO_FROM".parse::<Direction>().unwrap(), Direction::ToFrom);
        assert!(matches!(
            "sideways".parse::<Direction>(),
            Err(ReconcileError::InvalidDirection(_))
        ));
    }

    #[test]
    fn test_direction_orient() {
        assert_eq!(Direction::FromTo.orient("a", "b"), ("a", "b"));
        assert_eq!(Direction::ToFrom.orient("a", "b"), ("b", "a"));
        assert_eq!(Direction::ToFrom.reversed(), Direction::FromTo);
    }
}
