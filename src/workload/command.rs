//! Statements sent to the client program
//!
//! The client accepts one statement per line, each ending in `;`. These
//! constructors are the whole protocol surface the harness relies on:
//!
//! - `create table <name> (<col> <type>);`
//! - `insert into <name> values (<literal>);`
//! - `delete from <name> where <col>=<literal>;`
//! - `select <agg>(*) as <alias> from <name>;`
//! - `exit;`

use std::fmt;

use serde::Serialize;

use crate::config::HarnessConfig;

/// What a statement is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Ddl,
    Insert,
    Delete,
    Aggregate,
    Terminate,
}

/// Aggregate functions used by verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Count,
    Min,
    Max,
}

impl Aggregate {
    pub fn keyword(&self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }
}

/// The single table the workload writes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSpec {
    pub name: String,
    pub column: String,
    pub column_type: String,
}

impl TableSpec {
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        column_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            column_type: column_type.into(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(&config.table, &config.column, &config.column_type)
    }
}

/// An immutable statement tagged with its intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    text: String,
    intent: Intent,
}

impl Command {
    /// `create table t (id int);`
    pub fn create_table(table: &TableSpec) -> Self {
        Self {
            text: format!(
                "create table {} ({} {});",
                table.name, table.column, table.column_type
            ),
            intent: Intent::Ddl,
        }
    }

    /// `insert into t values (7);`
    pub fn insert(table: &TableSpec, value: u64) -> Self {
        Self {
            text: format!("insert into {} values ({});", table.name, value),
            intent: Intent::Insert,
        }
    }

    /// `delete from t where id=7;`
    pub fn delete(table: &TableSpec, value: u64) -> Self {
        Self {
            text: format!("delete from {} where {}={};", table.name, table.column, value),
            intent: Intent::Delete,
        }
    }

    /// `select count(*) as cnt_id from t;`
    pub fn aggregate(table: &TableSpec, aggregate: Aggregate, alias: &str) -> Self {
        Self {
            text: format!(
                "select {}(*) as {} from {};",
                aggregate.keyword(),
                alias,
                table.name
            ),
            intent: Intent::Aggregate,
        }
    }

    /// `exit;`
    pub fn exit() -> Self {
        Self {
            text: "exit;".to_string(),
            intent: Intent::Terminate,
        }
    }

    /// Statement text including the trailing `;`
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    /// Text as written to the client's stdin
    pub fn line(&self) -> String {
        format!("{}\n", self.text)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
