use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use std::cmp::Ordering;
use std::fmt;

pub type Row = Map<String, Value>;
pub type RowId = String;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Clients,
    ClientRequests,
    Tasks,
    ProjectScopes,
    Teams,
    UserTeamMemberships,
    TeamMessages,
    DirectMessages,
    Profiles,
    DiaryEntries,
    DiaryActionItems,
    FinancialAccounts,
    Transactions,
    TransactionCategories,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Clients => "clients",
            Table::ClientRequests => "client_requests",
            Table::Tasks => "tasks",
            Table::ProjectScopes => "project_scopes",
            Table::Teams => "teams",
            Table::UserTeamMemberships => "user_team_memberships",
            Table::TeamMessages => "team_messages",
            Table::DirectMessages => "direct_messages",
            Table::Profiles => "profiles",
            Table::DiaryEntries => "diary_entries",
            Table::DiaryActionItems => "diary_action_items",
            Table::FinancialAccounts => "financial_accounts",
            Table::Transactions => "transactions",
            Table::TransactionCategories => "transaction_categories",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    IsNull(String),
    /// At least one of the alternatives matches.
    Any(Vec<Filter>),
}

impl Predicate {
    fn matches(&self, row: &Row) -> bool {
        match self {
            Predicate::Eq(column, expected) => row.get(column) == Some(expected),
            Predicate::IsNull(column) => row.get(column).map_or(true, Value::is_null),
            Predicate::Any(alternatives) => alternatives.iter().any(|f| f.matches(row)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Ascending(String),
    Descending(String),
}

/// Conjunction of column predicates with an optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
    order: Option<Order>,
    limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Filter {
        Filter::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Filter {
        self.predicates
            .push(Predicate::Eq(column.to_string(), value.into()));
        self
    }

    pub fn is_null(mut self, column: &str) -> Filter {
        self.predicates.push(Predicate::IsNull(column.to_string()));
        self
    }

    pub fn or(mut self, alternatives: Vec<Filter>) -> Filter {
        self.predicates.push(Predicate::Any(alternatives));
        self
    }

    pub fn order_asc(mut self, column: &str) -> Filter {
        self.order = Some(Order::Ascending(column.to_string()));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Filter {
        self.order = Some(Order::Descending(column.to_string()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Filter {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }

    /// Applies ordering and limit to rows that already passed `matches`.
    /// Rows arrive in insertion order; a stable sort keeps it for ties.
    pub fn arrange(&self, mut rows: Vec<Row>) -> Vec<Row> {
        match &self.order {
            Some(Order::Ascending(column)) => {
                rows.sort_by(|a, b| compare_values(a.get(column), b.get(column)))
            }
            Some(Order::Descending(column)) => {
                rows.sort_by(|a, b| compare_values(b.get(column), a.get(column)))
            }
            None => {}
        }

        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }

        rows
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, Some(_)) | (Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None) | (Some(_), Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A realtime notification: a row was inserted, updated or deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub table: Table,
    pub kind: ChangeKind,
    pub row: Row,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
}
