use rusqlite::Connection;
use tracing::info;

use crate::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                email                   TEXT NOT NULL UNIQUE,
                password_hash           TEXT NOT NULL,
                security_question       TEXT NOT NULL,
                security_answer_hash    TEXT NOT NULL,
                role                    TEXT NOT NULL DEFAULT 'Consumer'
                                        CHECK (role IN ('Consumer', 'Administrator')),
                created_at              TEXT NOT NULL
            );

            CREATE TABLE requests (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                type            TEXT NOT NULL DEFAULT 'Repair',
                title           TEXT NOT NULL CHECK (length(title) > 0),
                description     TEXT NOT NULL CHECK (length(description) > 0),
                status          TEXT NOT NULL DEFAULT 'Pending Approval',
                date_requested  TEXT NOT NULL,
                last_modified   TEXT NOT NULL,
                requested_by    TEXT NOT NULL,
                version         INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX idx_requests_user ON requests(user_id);

            CREATE TABLE tokens (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                jti         TEXT NOT NULL UNIQUE,
                expires     TEXT NOT NULL
            );

            CREATE INDEX idx_tokens_expires ON tokens(expires);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
