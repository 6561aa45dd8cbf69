use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub type DBConnection = Arc<Mutex<Connection>>;

/// Unique constraints the backend enforces on row documents.
const UNIQUE_INDEXES: [&str; 3] = [
    "CREATE UNIQUE INDEX IF NOT EXISTS teams_slug ON rows (json_extract(data, '$.slug'))
     WHERE tbl = 'teams'",
    "CREATE UNIQUE INDEX IF NOT EXISTS clients_user_slug
     ON rows (json_extract(data, '$.user_id'), json_extract(data, '$.project_slug'))
     WHERE tbl = 'clients'",
    "CREATE UNIQUE INDEX IF NOT EXISTS memberships_team_user
     ON rows (json_extract(data, '$.team_id'), json_extract(data, '$.user_id'))
     WHERE tbl = 'user_team_memberships'",
];

pub fn create_schema(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS rows (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            tbl TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            UNIQUE (tbl, id)
        )",
        params![],
    )?;
    connection.execute(
        "CREATE TABLE IF NOT EXISTS sessions (token TEXT PRIMARY KEY, user_id TEXT NOT NULL, created_at TEXT NOT NULL)",
        params![],
    )?;

    for statement in UNIQUE_INDEXES.iter() {
        connection.execute(statement, params![])?;
    }

    Ok(())
}
