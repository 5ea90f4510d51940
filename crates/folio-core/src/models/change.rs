use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id_from_value;

/// Remote tables the admin session tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Projects,
    Skills,
    BlogPosts,
    ContactSubmissions,
    PersonalInfo,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Projects,
        Table::Skills,
        Table::BlogPosts,
        Table::ContactSubmissions,
        Table::PersonalInfo,
    ];

    /// Tables whose row counts make up an analytics snapshot.
    pub const COUNTED: [Table; 4] = [
        Table::Projects,
        Table::Skills,
        Table::BlogPosts,
        Table::ContactSubmissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Projects => "projects",
            Table::Skills => "skills",
            Table::BlogPosts => "blog_posts",
            Table::ContactSubmissions => "contact_submissions",
            Table::PersonalInfo => "personal_info",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "blog" is what the content manager tab calls blog_posts
        match s {
            "blog" => Ok(Table::BlogPosts),
            "contacts" => Ok(Table::ContactSubmissions),
            _ => Self::from_name(s).ok_or_else(|| format!("unknown table: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "INSERT" => Some(Operation::Insert),
            "UPDATE" => Some(Operation::Update),
            "DELETE" => Some(Operation::Delete),
            _ => None,
        }
    }
}

/// Which operations a subscription delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationFilter {
    #[default]
    All,
    Only(Operation),
}

impl OperationFilter {
    pub fn matches(&self, operation: Operation) -> bool {
        match self {
            OperationFilter::All => true,
            OperationFilter::Only(op) => *op == operation,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            OperationFilter::All => "*",
            OperationFilter::Only(op) => op.as_wire(),
        }
    }
}

/// One remote change notification. Consumed once, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub operation: Operation,
    pub new_row: Option<Value>,
    pub old_row: Option<Value>,
}

impl ChangeEvent {
    pub fn insert(table: Table, row: Value) -> Self {
        Self {
            table,
            operation: Operation::Insert,
            new_row: Some(row),
            old_row: None,
        }
    }

    pub fn update(table: Table, new_row: Value, old_row: Option<Value>) -> Self {
        Self {
            table,
            operation: Operation::Update,
            new_row: Some(new_row),
            old_row,
        }
    }

    pub fn delete(table: Table, old_row: Value) -> Self {
        Self {
            table,
            operation: Operation::Delete,
            new_row: None,
            old_row: Some(old_row),
        }
    }

    /// The row the event is about: the new row, or the old one for deletes.
    pub fn row(&self) -> Option<&Value> {
        match self.operation {
            Operation::Delete => self.old_row.as_ref(),
            _ => self.new_row.as_ref().or(self.old_row.as_ref()),
        }
    }

    pub fn row_id(&self) -> Option<String> {
        self.row().and_then(|row| row.get("id")).and_then(id_from_value)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.row().and_then(|row| row.get(name)).and_then(Value::as_str)
    }
}
