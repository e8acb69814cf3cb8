use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::programs::{ensure_owner, ensure_visible, load_program, touch};
use super::{col_enum, col_ts, col_uuid, invalid_column, ts, Database};
use crate::error::{is_unique_violation, CoreError, CoreResult};
use crate::models::{
    ContentType, CreateSessionInput, Principal, Session, SessionContent, UpdateSessionInput,
};
use crate::publication;

const SESSION_COLUMNS: &str = "id, program_id, title, description, week_number, estimated_minutes,
     practice_type, content_type, content_payload, background_media, created_at, updated_at";

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let content_type = col_enum(row, "content_type", ContentType::from_str)?;
    let payload: String = row.get("content_payload")?;
    let content = SessionContent::from_parts(content_type, &payload)
        .map_err(|e| invalid_column("content_payload", e))?;

    Ok(Session {
        id: col_uuid(row, "id")?,
        program_id: col_uuid(row, "program_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        week_number: row.get("week_number")?,
        estimated_minutes: row.get("estimated_minutes")?,
        practice_type: row.get("practice_type")?,
        content,
        background_media: row.get("background_media")?,
        created_at: col_ts(row, "created_at")?,
        updated_at: col_ts(row, "updated_at")?,
    })
}

pub(crate) fn find_session(conn: &Connection, id: Uuid) -> CoreResult<Option<Session>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id.to_string()], row_to_session)
        .optional()?)
}

pub(crate) fn load_session(conn: &Connection, id: Uuid) -> CoreResult<Session> {
    find_session(conn, id)?.ok_or_else(|| CoreError::not_found("session", id))
}

pub(crate) fn find_by_week(
    conn: &Connection,
    program_id: Uuid,
    week_number: u32,
) -> CoreResult<Option<Session>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE program_id = ?1 AND week_number = ?2");
    Ok(conn
        .query_row(&sql, params![program_id.to_string(), week_number], row_to_session)
        .optional()?)
}

/// Sessions of a program ordered by week.
pub(crate) fn list_for_program(conn: &Connection, program_id: Uuid) -> CoreResult<Vec<Session>> {
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE program_id = ?1 ORDER BY week_number ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let sessions = stmt
        .query_map(params![program_id.to_string()], row_to_session)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sessions)
}

pub(crate) fn week_numbers(conn: &Connection, program_id: Uuid) -> CoreResult<Vec<u32>> {
    let mut stmt = conn.prepare("SELECT week_number FROM sessions WHERE program_id = ?1")?;
    let weeks = stmt
        .query_map(params![program_id.to_string()], |row| row.get(0))?
        .collect::<Result<Vec<u32>, _>>()?;
    Ok(weeks)
}

pub(crate) fn insert_session(conn: &Connection, session: &Session) -> CoreResult<()> {
    conn.execute(
        "INSERT INTO sessions (id, program_id, title, description, week_number, estimated_minutes,
             practice_type, content_type, content_payload, background_media, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            session.id.to_string(),
            session.program_id.to_string(),
            session.title,
            session.description,
            session.week_number,
            session.estimated_minutes,
            session.practice_type,
            session.content.content_type().as_str(),
            session.content.payload(),
            session.background_media,
            ts(&session.created_at),
            ts(&session.updated_at),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            CoreError::DuplicateWeek {
                week: session.week_number,
            }
        } else {
            e.into()
        }
    })?;
    Ok(())
}

fn validate_session(session: &Session) -> CoreResult<()> {
    if session.title.trim().is_empty() {
        return Err(CoreError::validation("session title must not be empty"));
    }
    if session.week_number == 0 {
        return Err(CoreError::validation("week_number starts at 1"));
    }
    if session.practice_type.trim().is_empty() {
        return Err(CoreError::validation("practice_type must not be empty"));
    }
    session.content.validate()
}

impl Database {
    /// Add a session to a draft program.
    pub fn add_session(
        &self,
        principal: &Principal,
        program_id: Uuid,
        input: CreateSessionInput,
    ) -> CoreResult<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            program_id,
            title: input.title.trim().to_string(),
            description: input.description,
            week_number: input.week_number,
            estimated_minutes: input.estimated_minutes,
            practice_type: input.practice_type.trim().to_string(),
            content: input.content,
            background_media: input.background_media,
            created_at: now,
            updated_at: now,
        };

        self.transaction(|tx| {
            let program = load_program(tx, program_id)?;
            ensure_owner(principal, &program)?;
            publication::ensure_editable(&program, "session")?;
            validate_session(&session)?;

            if find_by_week(tx, program_id, session.week_number)?.is_some() {
                return Err(CoreError::DuplicateWeek {
                    week: session.week_number,
                });
            }
            insert_session(tx, &session)?;
            touch(tx, program_id, now)
        })?;

        tracing::info!(session_id = %session.id, %program_id, week = session.week_number, "session added");
        Ok(session)
    }

    pub fn update_session(
        &self,
        principal: &Principal,
        session_id: Uuid,
        input: UpdateSessionInput,
    ) -> CoreResult<Session> {
        let now = Utc::now();
        self.transaction(|tx| {
            let mut session = load_session(tx, session_id)?;
            let program = load_program(tx, session.program_id)?;
            ensure_owner(principal, &program)?;
            publication::ensure_editable(&program, "session")?;

            if let Some(title) = input.title {
                session.title = title.trim().to_string();
            }
            if let Some(description) = input.description {
                session.description = description;
            }
            if let Some(week) = input.week_number {
                if week != session.week_number
                    && find_by_week(tx, session.program_id, week)?.is_some()
                {
                    return Err(CoreError::DuplicateWeek { week });
                }
                session.week_number = week;
            }
            if let Some(minutes) = input.estimated_minutes {
                session.estimated_minutes = minutes;
            }
            if let Some(practice_type) = input.practice_type {
                session.practice_type = practice_type.trim().to_string();
            }
            if let Some(content) = input.content {
                session.content = content;
            }
            if let Some(media) = input.background_media {
                session.background_media = Some(media).filter(|m| !m.trim().is_empty());
            }
            validate_session(&session)?;
            session.updated_at = now;

            tx.execute(
                "UPDATE sessions SET title = ?2, description = ?3, week_number = ?4,
                     estimated_minutes = ?5, practice_type = ?6, content_type = ?7,
                     content_payload = ?8, background_media = ?9, updated_at = ?10
                 WHERE id = ?1",
                params![
                    session.id.to_string(),
                    session.title,
                    session.description,
                    session.week_number,
                    session.estimated_minutes,
                    session.practice_type,
                    session.content.content_type().as_str(),
                    session.content.payload(),
                    session.background_media,
                    ts(&now),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CoreError::DuplicateWeek {
                        week: session.week_number,
                    }
                } else {
                    e.into()
                }
            })?;
            touch(tx, session.program_id, now)?;
            Ok(session)
        })
    }

    pub fn delete_session(&self, principal: &Principal, session_id: Uuid) -> CoreResult<()> {
        let now = Utc::now();
        self.transaction(|tx| {
            let session = load_session(tx, session_id)?;
            let program = load_program(tx, session.program_id)?;
            ensure_owner(principal, &program)?;
            publication::ensure_editable(&program, "session")?;
            tx.execute("DELETE FROM sessions WHERE id = ?1", params![session_id.to_string()])?;
            touch(tx, session.program_id, now)
        })?;
        tracing::info!(%session_id, "session deleted");
        Ok(())
    }

    pub fn get_session(&self, principal: &Principal, session_id: Uuid) -> CoreResult<Session> {
        self.with_connection(|conn| {
            let session = load_session(conn, session_id)?;
            let program = load_program(conn, session.program_id)?;
            ensure_visible(principal, &program)?;
            Ok(session)
        })
    }

    /// Sessions of a program, ordered by week ascending.
    pub fn list_sessions(&self, principal: &Principal, program_id: Uuid) -> CoreResult<Vec<Session>> {
        self.with_connection(|conn| {
            let program = load_program(conn, program_id)?;
            ensure_visible(principal, &program)?;
            list_for_program(conn, program_id)
        })
    }
}
