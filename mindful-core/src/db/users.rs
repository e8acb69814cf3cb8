use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_enum, col_opt_uuid, col_ts, col_uuid, ts, Database};
use crate::error::{is_unique_violation, CoreError, CoreResult};
use crate::models::{Account, CreateUserInput, Principal, Role, User};

const ACCOUNT_COLUMNS: &str = "u.id, u.username, u.email, u.role, u.created_at,
     r.id AS researcher_id, p.id AS participant_id";

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        user: User {
            id: col_uuid(row, "id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            role: col_enum(row, "role", Role::from_str)?,
            created_at: col_ts(row, "created_at")?,
        },
        researcher_id: col_opt_uuid(row, "researcher_id")?,
        participant_id: col_opt_uuid(row, "participant_id")?,
    })
}

pub(crate) fn find_account(conn: &Connection, user_id: Uuid) -> CoreResult<Option<Account>> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS}
         FROM users u
         LEFT JOIN researcher_profiles r ON r.user_id = u.id
         LEFT JOIN participant_profiles p ON p.user_id = u.id
         WHERE u.id = ?1"
    );
    Ok(conn
        .query_row(&sql, params![user_id.to_string()], row_to_account)
        .optional()?)
}

/// `local@domain` with no whitespace and a dotted domain.
fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl Database {
    /// Create a user and the profile its role implies, atomically.
    pub fn create_user(&self, input: CreateUserInput) -> CoreResult<Account> {
        let username = input.username.trim().to_string();
        if username.is_empty() {
            return Err(CoreError::validation("username must not be empty"));
        }
        let email = input.email.trim().to_string();
        if !valid_email(&email) {
            return Err(CoreError::validation(format!("invalid email address {email:?}")));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            role: input.role,
            created_at: now,
        };

        let account = self.transaction(|tx| {
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                params![user.username],
                |row| row.get(0),
            )?;
            if taken {
                return Err(CoreError::validation(format!(
                    "username {:?} is already taken",
                    user.username
                )));
            }

            tx.execute(
                "INSERT INTO users (id, username, email, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.to_string(),
                    user.username,
                    user.email,
                    user.role.as_str(),
                    ts(&now),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CoreError::validation(format!("username {:?} is already taken", user.username))
                } else {
                    e.into()
                }
            })?;

            let profile_id = Uuid::new_v4();
            let (researcher_id, participant_id) = match user.role {
                Role::Admin => (None, None),
                Role::Researcher => {
                    tx.execute(
                        "INSERT INTO researcher_profiles (id, user_id, created_at) VALUES (?1, ?2, ?3)",
                        params![profile_id.to_string(), user.id.to_string(), ts(&now)],
                    )?;
                    (Some(profile_id), None)
                }
                Role::Participant => {
                    tx.execute(
                        "INSERT INTO participant_profiles (id, user_id, created_at) VALUES (?1, ?2, ?3)",
                        params![profile_id.to_string(), user.id.to_string(), ts(&now)],
                    )?;
                    (None, Some(profile_id))
                }
            };

            Ok(Account {
                user: user.clone(),
                researcher_id,
                participant_id,
            })
        })?;

        tracing::info!(user_id = %account.user.id, role = account.user.role.as_str(), "user created");
        Ok(account)
    }

    pub fn get_account(&self, user_id: Uuid) -> CoreResult<Option<Account>> {
        self.with_connection(|conn| find_account(conn, user_id))
    }

    /// Resolve the principal for an authenticated user id.
    pub fn principal(&self, user_id: Uuid) -> CoreResult<Principal> {
        let account = self
            .get_account(user_id)?
            .ok_or_else(|| CoreError::not_found("user", user_id))?;
        Ok(Principal::from(&account))
    }

    pub fn list_accounts(&self) -> CoreResult<Vec<Account>> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {ACCOUNT_COLUMNS}
                 FROM users u
                 LEFT JOIN researcher_profiles r ON r.user_id = u.id
                 LEFT JOIN participant_profiles p ON p.user_id = u.id
                 ORDER BY u.created_at, u.username"
            );
            let mut stmt = conn.prepare(&sql)?;
            let accounts = stmt
                .query_map([], row_to_account)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(accounts)
        })
    }
}
