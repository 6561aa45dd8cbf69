use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::data::{Row, Table};
use super::error::GatewayResult;

/// Who is issuing a request against the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Trusted server-side code; bypasses row policies.
    Service,
    Anonymous,
    User(String),
}

/// Row-level access rule for one table.
enum Rule {
    /// The named column must equal the caller.
    Owner(&'static str),
    /// Rows belong to a team; members read, authors write.
    TeamScoped(&'static str),
    Team,
    Membership,
    Participants {
        sender: &'static str,
        recipient: &'static str,
    },
    Profile,
    /// Anyone may submit; nobody but the service may read.
    Intake,
}

fn rule_for(table: Table) -> Rule {
    match table {
        Table::Clients
        | Table::Tasks
        | Table::ProjectScopes
        | Table::DiaryEntries
        | Table::DiaryActionItems
        | Table::FinancialAccounts
        | Table::Transactions
        | Table::TransactionCategories => Rule::Owner("user_id"),
        Table::TeamMessages => Rule::TeamScoped("team_id"),
        Table::Teams => Rule::Team,
        Table::UserTeamMemberships => Rule::Membership,
        Table::DirectMessages => Rule::Participants {
            sender: "sender_id",
            recipient: "receiver_id",
        },
        Table::Profiles => Rule::Profile,
        Table::ClientRequests => Rule::Intake,
    }
}

fn column_is(row: &Row, column: &str, user: &str) -> bool {
    row.get(column).and_then(Value::as_str) == Some(user)
}

fn str_column<'a>(row: &'a Row, column: &str) -> &'a str {
    row.get(column).and_then(Value::as_str).unwrap_or_default()
}

fn membership_role(
    db_connection: &Connection,
    team_id: &str,
    user: &str,
) -> GatewayResult<Option<String>> {
    let role = db_connection
        .query_row(
            "SELECT json_extract(data, '$.role') FROM rows
             WHERE tbl = 'user_team_memberships'
             AND json_extract(data, '$.team_id') = (?1)
             AND json_extract(data, '$.user_id') = (?2)",
            params![team_id, user],
            |row| row.get::<usize, Option<String>>(0),
        )
        .optional()?;

    Ok(role.map(|r| r.unwrap_or_default()))
}

fn team_created_by(db_connection: &Connection, team_id: &str, user: &str) -> GatewayResult<bool> {
    let found = db_connection
        .query_row(
            "SELECT 1 FROM rows WHERE tbl = 'teams' AND id = (?1)
             AND json_extract(data, '$.created_by') = (?2)",
            params![team_id, user],
            |_| Ok(()),
        )
        .optional()?;

    Ok(found.is_some())
}

fn is_plain_member(row: &Row) -> bool {
    row.get("role").and_then(Value::as_str) == Some("member")
}

fn is_member(db_connection: &Connection, team_id: &str, user: &str) -> GatewayResult<bool> {
    Ok(membership_role(db_connection, team_id, user)?.is_some())
}

pub fn can_read(
    db_connection: &Connection,
    principal: &Principal,
    table: Table,
    row: &Row,
) -> GatewayResult<bool> {
    let user = match principal {
        Principal::Service => return Ok(true),
        Principal::Anonymous => return Ok(matches!(rule_for(table), Rule::Profile)),
        Principal::User(user) => user.as_str(),
    };

    Ok(match rule_for(table) {
        Rule::Owner(column) => column_is(row, column, user),
        Rule::TeamScoped(column) => is_member(db_connection, str_column(row, column), user)?,
        Rule::Team => true,
        Rule::Membership => {
            column_is(row, "user_id", user)
                || is_member(db_connection, str_column(row, "team_id"), user)?
        }
        Rule::Participants { sender, recipient } => {
            column_is(row, sender, user) || column_is(row, recipient, user)
        }
        Rule::Profile => true,
        Rule::Intake => false,
    })
}

pub fn can_insert(
    db_connection: &Connection,
    principal: &Principal,
    table: Table,
    row: &Row,
) -> GatewayResult<bool> {
    let user = match principal {
        Principal::Service => return Ok(true),
        Principal::Anonymous => return Ok(matches!(rule_for(table), Rule::Intake)),
        Principal::User(user) => user.as_str(),
    };

    Ok(match rule_for(table) {
        Rule::Owner(column) => column_is(row, column, user),
        Rule::TeamScoped(column) => {
            column_is(row, "user_id", user)
                && is_member(db_connection, str_column(row, column), user)?
        }
        Rule::Team => column_is(row, "created_by", user),
        Rule::Membership => {
            column_is(row, "user_id", user)
                && (is_plain_member(row)
                    || team_created_by(db_connection, str_column(row, "team_id"), user)?)
        }
        Rule::Participants { sender, .. } => column_is(row, sender, user),
        Rule::Profile => column_is(row, "id", user),
        Rule::Intake => true,
    })
}

/// Update and delete rights over an existing row.
pub fn can_write(
    db_connection: &Connection,
    principal: &Principal,
    table: Table,
    row: &Row,
) -> GatewayResult<bool> {
    let user = match principal {
        Principal::Service => return Ok(true),
        Principal::Anonymous => return Ok(false),
        Principal::User(user) => user.as_str(),
    };

    Ok(match rule_for(table) {
        Rule::Owner(column) => column_is(row, column, user),
        Rule::TeamScoped(_) => column_is(row, "user_id", user),
        Rule::Team => {
            let team_id = str_column(row, "id");
            column_is(row, "created_by", user)
                || membership_role(db_connection, team_id, user)?.as_deref() == Some("owner")
        }
        Rule::Membership => {
            column_is(row, "user_id", user)
                || team_created_by(db_connection, str_column(row, "team_id"), user)?
        }
        Rule::Participants { sender, recipient } => {
            column_is(row, sender, user) || column_is(row, recipient, user)
        }
        Rule::Profile => column_is(row, "id", user),
        Rule::Intake => false,
    })
}

/// Whether a row may be stored after a patch. On top of the write rule, only
/// a team's creator may give a membership any role but `member`.
pub fn can_update(
    db_connection: &Connection,
    principal: &Principal,
    table: Table,
    row: &Row,
) -> GatewayResult<bool> {
    if !can_write(db_connection, principal, table, row)? {
        return Ok(false);
    }

    match (principal, rule_for(table)) {
        (Principal::User(user), Rule::Membership) => Ok(is_plain_member(row)
            || team_created_by(db_connection, str_column(row, "team_id"), user)?),
        _ => Ok(true),
    }
}
