use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, ErrorCode, Row};
use tracker_types::models::{MaintenanceRequest, RequestPatch, Role};

use crate::models::{NewRequest, NewUser, TokenRow, UserRow};
use crate::{Database, Store, StoreError, StoreResult};

const USER_COLUMNS: &str =
    "id, email, password_hash, security_question, security_answer_hash, role, created_at";

const REQUEST_COLUMNS: &str = "id, user_id, type, title, description, status, date_requested, \
     last_modified, requested_by, version";

impl Store for Database {
    // -- Users --

    fn get_user_by_id(&self, id: i64) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;
            Ok(stmt.query_row([email], map_user).optional()?)
        })
    }

    fn get_users(&self) -> StoreResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn save_user(&self, user: &NewUser) -> StoreResult<UserRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (email, password_hash, security_question, security_answer_hash, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.email,
                    user.password_hash,
                    user.security_question,
                    user.security_answer_hash,
                    user.role.as_str(),
                    Utc::now(),
                ],
            )
            .map_err(unique_violation_as_duplicate)?;

            let id = tx.last_insert_rowid();
            let row = query_user_by_id(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(row)
        })
    }

    fn change_role(&self, user_id: i64, role: Role) -> StoreResult<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(current) = query_user_by_id(&tx, user_id)? else {
                return Ok(None);
            };

            if current.role == Role::Administrator && role != Role::Administrator {
                let admins: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM users WHERE role = ?1",
                    [Role::Administrator.as_str()],
                    |r| r.get(0),
                )?;
                if admins <= 1 {
                    return Err(StoreError::LastAdministrator(user_id));
                }
            }

            tx.execute(
                "UPDATE users SET role = ?1 WHERE id = ?2",
                rusqlite::params![role.as_str(), user_id],
            )?;
            let row = query_user_by_id(&tx, user_id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    fn update_password(&self, user_id: i64, password_hash: &str) -> StoreResult<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                rusqlite::params![password_hash, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Requests --

    fn get_requests(&self) -> StoreResult<Vec<MaintenanceRequest>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {REQUEST_COLUMNS} FROM requests ORDER BY id"))?;
            let rows = stmt
                .query_map([], map_request)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn get_my_requests(&self, user_id: i64) -> StoreResult<Vec<MaintenanceRequest>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM requests WHERE user_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([user_id], map_request)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn get_request_by_id(&self, id: i64) -> StoreResult<Option<MaintenanceRequest>> {
        self.with_conn(|conn| query_request_by_id(conn, id))
    }

    fn save_request(&self, request: &NewRequest) -> StoreResult<MaintenanceRequest> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO requests (user_id, type, title, description, date_requested, last_modified, requested_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6)",
                rusqlite::params![
                    request.user_id,
                    request.kind.as_str(),
                    request.title,
                    request.description,
                    request.date_requested,
                    request.requested_by,
                ],
            )?;

            let id = tx.last_insert_rowid();
            let row = query_request_by_id(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(row)
        })
    }

    fn update_request(
        &self,
        id: i64,
        patch: &RequestPatch,
        expected_version: i64,
        modified_at: DateTime<Utc>,
    ) -> StoreResult<Option<MaintenanceRequest>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let found: Option<i64> = tx
                .query_row("SELECT version FROM requests WHERE id = ?1", [id], |r| r.get(0))
                .optional()?;
            let Some(found) = found else {
                return Ok(None);
            };
            if found != expected_version {
                return Err(StoreError::Conflict { id, expected: expected_version, found });
            }
            if patch.is_empty() {
                return query_request_by_id(&tx, id);
            }

            // Column names come from this fixed list only; every value is bound.
            let kind = patch.kind.map(|k| k.as_str());
            let status = patch.status.map(|s| s.as_str());
            let mut columns: Vec<&'static str> = Vec::new();
            let mut values: Vec<&dyn ToSql> = Vec::new();
            if let Some(kind) = &kind {
                columns.push("type");
                values.push(kind);
            }
            if let Some(title) = &patch.title {
                columns.push("title");
                values.push(title);
            }
            if let Some(description) = &patch.description {
                columns.push("description");
                values.push(description);
            }
            if let Some(status) = &status {
                columns.push("status");
                values.push(status);
            }
            columns.push("last_modified");
            values.push(&modified_at);

            let assignments: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(i, col)| format!("{} = ?{}", col, i + 1))
                .collect();
            let sql = format!(
                "UPDATE requests SET {}, version = version + 1 WHERE id = ?{} AND version = ?{}",
                assignments.join(", "),
                values.len() + 1,
                values.len() + 2,
            );
            values.push(&id);
            values.push(&expected_version);

            let changed = tx.execute(&sql, values.as_slice())?;
            if changed == 0 {
                return Err(StoreError::Conflict { id, expected: expected_version, found });
            }

            let row = query_request_by_id(&tx, id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    // -- Token blacklist --

    fn get_token_by_jti(&self, jti: &str) -> StoreResult<Option<TokenRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row("SELECT jti, expires FROM tokens WHERE jti = ?1", [jti], |row| {
                    Ok(TokenRow {
                        jti: row.get(0)?,
                        expires: row.get(1)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    fn save_token(&self, jti: &str, expires: DateTime<Utc>) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO tokens (jti, expires) VALUES (?1, ?2)",
                rusqlite::params![jti, expires],
            )?;
            Ok(())
        })
    }

    fn purge_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM tokens WHERE expires <= ?1", [now])?))
    }
}

fn query_user_by_id(conn: &Connection, id: i64) -> StoreResult<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
    Ok(stmt.query_row([id], map_user).optional()?)
}

fn query_request_by_id(conn: &Connection, id: i64) -> StoreResult<Option<MaintenanceRequest>> {
    let mut stmt = conn.prepare(&format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1"))?;
    Ok(stmt.query_row([id], map_request).optional()?)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        security_question: row.get(3)?,
        security_answer_hash: row.get(4)?,
        role: parse_label(row, 5)?,
        created_at: row.get(6)?,
    })
}

fn map_request(row: &Row<'_>) -> rusqlite::Result<MaintenanceRequest> {
    Ok(MaintenanceRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: parse_label(row, 2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        status: parse_label(row, 5)?,
        date_requested: row.get(6)?,
        last_modified: row.get(7)?,
        requested_by: row.get(8)?,
        version: row.get(9)?,
    })
}

/// Read a TEXT column holding an enum label.
fn parse_label<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn unique_violation_as_duplicate(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::DuplicateEmail
        }
        _ => StoreError::Sqlite(err),
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
