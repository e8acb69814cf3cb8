use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::programs::{ensure_owner, load_program};
use super::{col_ts, col_uuid, enrollments, sessions, ts, Database};
use crate::availability::{self, Availability, GateInput};
use crate::error::{is_unique_violation, CoreError, CoreResult};
use crate::models::{CreateDiaryEntryInput, DiaryEntry, Principal, Session, SessionAvailability};

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<DiaryEntry> {
    Ok(DiaryEntry {
        id: col_uuid(row, "id")?,
        session_id: col_uuid(row, "session_id")?,
        participant_id: col_uuid(row, "participant_id")?,
        rating: row.get("rating")?,
        comment: row.get("comment")?,
        created_at: col_ts(row, "created_at")?,
    })
}

pub(crate) fn has_entry(conn: &Connection, session_id: Uuid, participant_id: Uuid) -> CoreResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM diary_entries WHERE session_id = ?1 AND participant_id = ?2)",
        params![session_id.to_string(), participant_id.to_string()],
        |row| row.get(0),
    )?)
}

/// Gather the gate inputs for `session` and evaluate them at `now`.
pub(crate) fn evaluate_gate(
    conn: &Connection,
    session: &Session,
    participant_id: Uuid,
    now: DateTime<Utc>,
) -> CoreResult<Availability> {
    let enrollment = enrollments::find_enrollment(conn, session.program_id, participant_id)?;
    let journaled = has_entry(conn, session.id, participant_id)?;
    let previous_week_journaled = if session.week_number > 1 {
        match sessions::find_by_week(conn, session.program_id, session.week_number - 1)? {
            Some(previous) => Some(has_entry(conn, previous.id, participant_id)?),
            None => None,
        }
    } else {
        None
    };

    let result = availability::evaluate(
        &GateInput {
            enrollment: enrollment.as_ref(),
            week_number: session.week_number,
            journaled,
            previous_week_journaled,
        },
        now,
    );
    tracing::debug!(
        session_id = %session.id,
        %participant_id,
        week = session.week_number,
        available = result.is_available(),
        "availability evaluated"
    );
    Ok(result)
}

pub(crate) fn availability_view(
    conn: &Connection,
    session: Session,
    participant_id: Uuid,
    now: DateTime<Utc>,
) -> CoreResult<SessionAvailability> {
    let result = evaluate_gate(conn, &session, participant_id, now)?;
    let window = enrollments::find_enrollment(conn, session.program_id, participant_id)?
        .map(|e| availability::week_window(e.start_time, session.week_number));

    Ok(SessionAvailability {
        available: result.is_available(),
        journaled: has_entry(conn, session.id, participant_id)?,
        window_start: window.map(|(start, _)| start),
        window_end: window.map(|(_, end)| end),
        reason: result.describe(),
        session,
    })
}

impl Database {
    /// Whether `participant_id` may open the session at `now`.
    pub fn is_session_available(
        &self,
        session_id: Uuid,
        participant_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        self.with_connection(|conn| {
            let session = sessions::load_session(conn, session_id)?;
            Ok(evaluate_gate(conn, &session, participant_id, now)?.is_available())
        })
    }

    /// The calling participant's view of one session.
    pub fn session_availability(
        &self,
        principal: &Principal,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<SessionAvailability> {
        let participant_id = principal.participant()?;
        self.with_connection(|conn| {
            let session = sessions::load_session(conn, session_id)?;
            availability_view(conn, session, participant_id, now)
        })
    }

    /// Write the caller's diary entry for a session the gate currently opens.
    pub fn submit_diary_entry(
        &self,
        principal: &Principal,
        session_id: Uuid,
        input: CreateDiaryEntryInput,
        now: DateTime<Utc>,
    ) -> CoreResult<DiaryEntry> {
        let participant_id = principal.participant()?;
        input.validate()?;

        let entry = self.transaction(|tx| {
            let session = sessions::load_session(tx, session_id)?;
            if has_entry(tx, session_id, participant_id)? {
                return Err(CoreError::DuplicateDiaryEntry);
            }

            let gate = evaluate_gate(tx, &session, participant_id, now)?;
            if !gate.is_available() {
                return Err(CoreError::invalid_state(format!(
                    "session for week {} is not available: {}",
                    session.week_number,
                    gate.describe()
                )));
            }

            let entry = DiaryEntry {
                id: Uuid::new_v4(),
                session_id,
                participant_id,
                rating: input.rating,
                comment: input.comment.clone().filter(|c| !c.trim().is_empty()),
                created_at: now,
            };
            tx.execute(
                "INSERT INTO diary_entries (id, session_id, participant_id, rating, comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id.to_string(),
                    session_id.to_string(),
                    participant_id.to_string(),
                    entry.rating,
                    entry.comment,
                    ts(&now),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CoreError::DuplicateDiaryEntry
                } else {
                    e.into()
                }
            })?;
            Ok(entry)
        })?;

        tracing::info!(entry_id = %entry.id, %session_id, %participant_id, "diary entry written");
        Ok(entry)
    }

    /// The caller's diary entries for one program, by week.
    pub fn list_own_diary_entries(
        &self,
        principal: &Principal,
        program_id: Uuid,
    ) -> CoreResult<Vec<DiaryEntry>> {
        let participant_id = principal.participant()?;
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.id, d.session_id, d.participant_id, d.rating, d.comment, d.created_at
                 FROM diary_entries d
                 JOIN sessions s ON s.id = d.session_id
                 WHERE s.program_id = ?1 AND d.participant_id = ?2
                 ORDER BY s.week_number",
            )?;
            let entries = stmt
                .query_map(
                    params![program_id.to_string(), participant_id.to_string()],
                    row_to_entry,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }

    /// Every diary entry for a session; owner researchers and admins only.
    pub fn list_session_diary_entries(
        &self,
        principal: &Principal,
        session_id: Uuid,
    ) -> CoreResult<Vec<DiaryEntry>> {
        self.with_connection(|conn| {
            let session = sessions::load_session(conn, session_id)?;
            let program = load_program(conn, session.program_id)?;
            ensure_owner(principal, &program)?;

            let mut stmt = conn.prepare(
                "SELECT id, session_id, participant_id, rating, comment, created_at
                 FROM diary_entries WHERE session_id = ?1 ORDER BY created_at",
            )?;
            let entries = stmt
                .query_map(params![session_id.to_string()], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }
}
