use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::programs::{ensure_owner, load_program};
use super::{col_enum, col_opt_ts, col_ts, col_uuid, diary, sessions, ts, Database};
use crate::error::{is_unique_violation, CoreError, CoreResult};
use crate::models::{Enrollment, EnrollmentProgress, EnrollmentState, Principal, Program};
use crate::publication;

const ENROLLMENT_COLUMNS: &str =
    "id, program_id, participant_id, state, start_time, end_time, completed_at";

fn row_to_enrollment(row: &Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: col_uuid(row, "id")?,
        program_id: col_uuid(row, "program_id")?,
        participant_id: col_uuid(row, "participant_id")?,
        state: col_enum(row, "state", EnrollmentState::from_str)?,
        start_time: col_ts(row, "start_time")?,
        end_time: col_opt_ts(row, "end_time")?,
        completed_at: col_opt_ts(row, "completed_at")?,
    })
}

pub(crate) fn load_enrollment(conn: &Connection, id: Uuid) -> CoreResult<Enrollment> {
    let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_enrollment)
        .optional()?
        .ok_or_else(|| CoreError::not_found("enrollment", id))
}

pub(crate) fn find_enrollment(
    conn: &Connection,
    program_id: Uuid,
    participant_id: Uuid,
) -> CoreResult<Option<Enrollment>> {
    let sql = format!(
        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE program_id = ?1 AND participant_id = ?2"
    );
    Ok(conn
        .query_row(
            &sql,
            params![program_id.to_string(), participant_id.to_string()],
            row_to_enrollment,
        )
        .optional()?)
}

/// The participant's in-progress enrollment, latest start first.
pub(crate) fn current_for_participant(
    conn: &Connection,
    participant_id: Uuid,
) -> CoreResult<Option<Enrollment>> {
    let sql = format!(
        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
         WHERE participant_id = ?1 AND state = 'in_progress'
         ORDER BY start_time DESC LIMIT 1"
    );
    Ok(conn
        .query_row(&sql, params![participant_id.to_string()], row_to_enrollment)
        .optional()?)
}

pub(crate) fn list_for_program(conn: &Connection, program_id: Uuid) -> CoreResult<Vec<Enrollment>> {
    let sql = format!(
        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE program_id = ?1 ORDER BY start_time"
    );
    let mut stmt = conn.prepare(&sql)?;
    let enrollments = stmt
        .query_map(params![program_id.to_string()], row_to_enrollment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(enrollments)
}

/// Flip the participant's in-progress enrollment in `program_id` to completed.
///
/// Returns `None`, leaving everything untouched, when there is no
/// in-progress enrollment for the pair.
pub(crate) fn complete_via_post_questionnaire(
    conn: &Connection,
    program_id: Uuid,
    participant_id: Uuid,
    now: DateTime<Utc>,
) -> CoreResult<Option<Enrollment>> {
    let Some(enrollment) = find_enrollment(conn, program_id, participant_id)?
        .filter(Enrollment::is_in_progress)
    else {
        tracing::warn!(
            %program_id,
            %participant_id,
            "post questionnaire answered without an in-progress enrollment; completion skipped"
        );
        return Ok(None);
    };

    conn.execute(
        "UPDATE enrollments SET state = 'completed', completed_at = ?2
         WHERE id = ?1 AND state = 'in_progress'",
        params![enrollment.id.to_string(), ts(&now)],
    )?;
    tracing::info!(enrollment_id = %enrollment.id, "enrollment completed");

    Ok(Some(Enrollment {
        state: EnrollmentState::Completed,
        completed_at: Some(now),
        ..enrollment
    }))
}

fn ensure_participant_or_admin(principal: &Principal, enrollment: &Enrollment) -> CoreResult<()> {
    if principal.is_admin() || principal.participant_id == Some(enrollment.participant_id) {
        Ok(())
    } else {
        Err(CoreError::forbidden(format!(
            "enrollment {} belongs to another participant",
            enrollment.id
        )))
    }
}

impl Database {
    /// Enroll the calling participant in a published program.
    pub fn enroll(
        &self,
        principal: &Principal,
        program_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<Enrollment> {
        let participant_id = principal.participant()?;

        let enrollment = self.transaction(|tx| {
            let program = load_program(tx, program_id)?;
            publication::ensure_accepts_participants(&program)?;

            if find_enrollment(tx, program_id, participant_id)?.is_some() {
                return Err(CoreError::AlreadyEnrolled);
            }
            if let Some(active) = current_for_participant(tx, participant_id)? {
                return Err(CoreError::AlreadyInAnotherProgram {
                    program_id: active.program_id,
                });
            }

            let enrollment = Enrollment {
                id: Uuid::new_v4(),
                program_id,
                participant_id,
                state: EnrollmentState::InProgress,
                start_time: now,
                end_time: None,
                completed_at: None,
            };
            tx.execute(
                "INSERT INTO enrollments (id, program_id, participant_id, state, start_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    enrollment.id.to_string(),
                    program_id.to_string(),
                    participant_id.to_string(),
                    enrollment.state.as_str(),
                    ts(&now),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CoreError::AlreadyEnrolled
                } else {
                    e.into()
                }
            })?;
            Ok(enrollment)
        })?;

        tracing::info!(enrollment_id = %enrollment.id, %program_id, %participant_id, "participant enrolled");
        Ok(enrollment)
    }

    /// Abandon an in-progress enrollment, stamping its end time.
    pub fn abandon(
        &self,
        principal: &Principal,
        enrollment_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<Enrollment> {
        let enrollment = self.transaction(|tx| {
            let enrollment = load_enrollment(tx, enrollment_id)?;
            ensure_participant_or_admin(principal, &enrollment)?;
            if enrollment.state.is_terminal() {
                return Err(CoreError::invalid_state(format!(
                    "enrollment is {}, only in-progress enrollments can be abandoned",
                    enrollment.state.as_str()
                )));
            }

            tx.execute(
                "UPDATE enrollments SET state = 'abandoned', end_time = ?2
                 WHERE id = ?1 AND state = 'in_progress'",
                params![enrollment_id.to_string(), ts(&now)],
            )?;
            Ok(Enrollment {
                state: EnrollmentState::Abandoned,
                end_time: Some(now),
                ..enrollment
            })
        })?;

        tracing::info!(%enrollment_id, "enrollment abandoned");
        Ok(enrollment)
    }

    pub fn get_enrollment(&self, principal: &Principal, enrollment_id: Uuid) -> CoreResult<Enrollment> {
        self.with_connection(|conn| {
            let enrollment = load_enrollment(conn, enrollment_id)?;
            if ensure_participant_or_admin(principal, &enrollment).is_err() {
                let program = load_program(conn, enrollment.program_id)?;
                ensure_owner(principal, &program)?;
            }
            Ok(enrollment)
        })
    }

    /// The calling participant's enrollments, newest first.
    pub fn list_own_enrollments(&self, principal: &Principal) -> CoreResult<Vec<Enrollment>> {
        let participant_id = principal.participant()?;
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE participant_id = ?1
                 ORDER BY start_time DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let enrollments = stmt
                .query_map(params![participant_id.to_string()], row_to_enrollment)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(enrollments)
        })
    }

    /// Enrollments of a program; owner researchers and admins only.
    pub fn list_program_enrollments(
        &self,
        principal: &Principal,
        program_id: Uuid,
    ) -> CoreResult<Vec<Enrollment>> {
        self.with_connection(|conn| {
            let program = load_program(conn, program_id)?;
            ensure_owner(principal, &program)?;
            list_for_program(conn, program_id)
        })
    }

    /// The calling participant's current program and enrollment, if any.
    pub fn current_program(&self, principal: &Principal) -> CoreResult<Option<(Enrollment, Program)>> {
        let participant_id = principal.participant()?;
        self.with_connection(|conn| {
            match current_for_participant(conn, participant_id)? {
                Some(enrollment) => {
                    let program = load_program(conn, enrollment.program_id)?;
                    Ok(Some((enrollment, program)))
                }
                None => Ok(None),
            }
        })
    }

    /// Every session of an enrollment's program with its availability at `now`.
    pub fn enrollment_progress(
        &self,
        principal: &Principal,
        enrollment_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<EnrollmentProgress> {
        self.with_connection(|conn| {
            let enrollment = load_enrollment(conn, enrollment_id)?;
            ensure_participant_or_admin(principal, &enrollment)?;
            let program = load_program(conn, enrollment.program_id)?;

            let mut views = Vec::new();
            for session in sessions::list_for_program(conn, program.id)? {
                views.push(diary::availability_view(conn, session, enrollment.participant_id, now)?);
            }

            Ok(EnrollmentProgress {
                end_time: enrollment.effective_end_time(program.duration_weeks),
                current_week: enrollment.current_week(program.duration_weeks, now),
                journaled_sessions: views.iter().filter(|v| v.journaled).count(),
                sessions: views,
                enrollment,
                program,
            })
        })
    }
}
