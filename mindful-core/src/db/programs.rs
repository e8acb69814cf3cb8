use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_enum, col_opt_ts, col_opt_uuid, col_ts, col_uuid, questionnaires, sessions, ts, Database};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    CreateProgramInput, Moment, Principal, Program, ProgramDetail, ProgramState, Role,
    UpdateProgramInput,
};
use crate::publication;

const PROGRAM_COLUMNS: &str = "id, researcher_id, name, description, context_type, methodology,
     target_population, duration_weeks, state, pre_questionnaire_id, post_questionnaire_id,
     created_at, updated_at, published_at";

fn row_to_program(row: &Row<'_>) -> rusqlite::Result<Program> {
    Ok(Program {
        id: col_uuid(row, "id")?,
        researcher_id: col_uuid(row, "researcher_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        context_type: row.get("context_type")?,
        methodology: row.get("methodology")?,
        target_population: row.get("target_population")?,
        duration_weeks: row.get("duration_weeks")?,
        state: col_enum(row, "state", ProgramState::from_str)?,
        pre_questionnaire_id: col_opt_uuid(row, "pre_questionnaire_id")?,
        post_questionnaire_id: col_opt_uuid(row, "post_questionnaire_id")?,
        created_at: col_ts(row, "created_at")?,
        updated_at: col_ts(row, "updated_at")?,
        published_at: col_opt_ts(row, "published_at")?,
    })
}

pub(crate) fn find_program(conn: &Connection, id: Uuid) -> CoreResult<Option<Program>> {
    let sql = format!("SELECT {PROGRAM_COLUMNS} FROM programs WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id.to_string()], row_to_program)
        .optional()?)
}

pub(crate) fn load_program(conn: &Connection, id: Uuid) -> CoreResult<Program> {
    find_program(conn, id)?.ok_or_else(|| CoreError::not_found("program", id))
}

pub(crate) fn list_programs_where(
    conn: &Connection,
    filter: &str,
    param: Option<String>,
) -> CoreResult<Vec<Program>> {
    let sql = format!("SELECT {PROGRAM_COLUMNS} FROM programs {filter} ORDER BY created_at DESC, name");
    let mut stmt = conn.prepare(&sql)?;
    let programs = match param {
        Some(p) => stmt.query_map(params![p], row_to_program)?.collect::<Result<Vec<_>, _>>()?,
        None => stmt.query_map([], row_to_program)?.collect::<Result<Vec<_>, _>>()?,
    };
    Ok(programs)
}

/// Owner researchers may change a program; admins may as well.
pub(crate) fn ensure_owner(principal: &Principal, program: &Program) -> CoreResult<()> {
    if principal.is_admin() || principal.researcher_id == Some(program.researcher_id) {
        Ok(())
    } else {
        Err(CoreError::forbidden(format!(
            "program {} belongs to another researcher",
            program.id
        )))
    }
}

/// Drafts are only visible to their owner and admins.
pub(crate) fn ensure_visible(principal: &Principal, program: &Program) -> CoreResult<()> {
    if program.is_published() || ensure_owner(principal, program).is_ok() {
        Ok(())
    } else {
        Err(CoreError::not_found("program", program.id))
    }
}

pub(crate) fn touch(conn: &Connection, id: Uuid, now: DateTime<Utc>) -> CoreResult<()> {
    conn.execute(
        "UPDATE programs SET updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), ts(&now)],
    )?;
    Ok(())
}

pub(crate) fn set_questionnaire_ref(
    conn: &Connection,
    program_id: Uuid,
    moment: Moment,
    questionnaire_id: Option<Uuid>,
) -> CoreResult<()> {
    let column = match moment {
        Moment::Pre => "pre_questionnaire_id",
        Moment::Post => "post_questionnaire_id",
    };
    conn.execute(
        &format!("UPDATE programs SET {column} = ?2 WHERE id = ?1"),
        params![program_id.to_string(), questionnaire_id.map(|id| id.to_string())],
    )?;
    Ok(())
}

fn insert_program(conn: &Connection, program: &Program) -> CoreResult<()> {
    conn.execute(
        "INSERT INTO programs (id, researcher_id, name, description, context_type, methodology,
             target_population, duration_weeks, state, pre_questionnaire_id, post_questionnaire_id,
             created_at, updated_at, published_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            program.id.to_string(),
            program.researcher_id.to_string(),
            program.name,
            program.description,
            program.context_type,
            program.methodology,
            program.target_population,
            program.duration_weeks,
            program.state.as_str(),
            program.pre_questionnaire_id.map(|id| id.to_string()),
            program.post_questionnaire_id.map(|id| id.to_string()),
            ts(&program.created_at),
            ts(&program.updated_at),
            program.published_at.as_ref().map(ts),
        ],
    )?;
    Ok(())
}

fn require_text(field: &str, value: &str) -> CoreResult<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(CoreError::validation(format!("{field} must not be empty")))
    } else {
        Ok(value.to_string())
    }
}

fn require_duration(weeks: u32) -> CoreResult<u32> {
    if weeks == 0 {
        Err(CoreError::validation("duration_weeks must be at least 1"))
    } else {
        Ok(weeks)
    }
}

impl Database {
    /// Create a draft program owned by the calling researcher.
    pub fn create_program(
        &self,
        principal: &Principal,
        input: CreateProgramInput,
    ) -> CoreResult<Program> {
        let researcher_id = principal.researcher()?;
        let now = Utc::now();
        let program = Program {
            id: Uuid::new_v4(),
            researcher_id,
            name: require_text("name", &input.name)?,
            description: input.description.trim().to_string(),
            context_type: input.context_type.trim().to_string(),
            methodology: input.methodology.trim().to_string(),
            target_population: input.target_population.trim().to_string(),
            duration_weeks: require_duration(input.duration_weeks)?,
            state: ProgramState::Draft,
            pre_questionnaire_id: None,
            post_questionnaire_id: None,
            created_at: now,
            updated_at: now,
            published_at: None,
        };

        self.with_connection(|conn| insert_program(conn, &program))?;
        tracing::info!(program_id = %program.id, %researcher_id, "program created");
        Ok(program)
    }

    pub fn get_program(&self, principal: &Principal, id: Uuid) -> CoreResult<Program> {
        self.with_connection(|conn| {
            let program = load_program(conn, id)?;
            ensure_visible(principal, &program)?;
            Ok(program)
        })
    }

    /// Program with its sessions (by week) and questionnaires.
    pub fn get_program_detail(&self, principal: &Principal, id: Uuid) -> CoreResult<ProgramDetail> {
        self.with_connection(|conn| {
            let program = load_program(conn, id)?;
            ensure_visible(principal, &program)?;
            Ok(ProgramDetail {
                sessions: sessions::list_for_program(conn, id)?,
                questionnaires: questionnaires::list_for_program(conn, id)?,
                program,
            })
        })
    }

    /// Researchers see their own programs, participants the published ones,
    /// admins everything.
    pub fn list_programs(&self, principal: &Principal) -> CoreResult<Vec<Program>> {
        self.with_connection(|conn| match principal.role {
            Role::Admin => list_programs_where(conn, "", None),
            Role::Researcher => list_programs_where(
                conn,
                "WHERE researcher_id = ?1",
                Some(principal.researcher()?.to_string()),
            ),
            Role::Participant => list_programs_where(conn, "WHERE state = 'published'", None),
        })
    }

    pub fn update_program(
        &self,
        principal: &Principal,
        id: Uuid,
        input: UpdateProgramInput,
    ) -> CoreResult<Program> {
        let now = Utc::now();
        self.transaction(|tx| {
            let mut program = load_program(tx, id)?;
            ensure_owner(principal, &program)?;
            publication::ensure_editable(&program, "program")?;

            if input.is_empty() {
                return Ok(program);
            }
            if let Some(name) = &input.name {
                program.name = require_text("name", name)?;
            }
            if let Some(description) = input.description {
                program.description = description.trim().to_string();
            }
            if let Some(context_type) = input.context_type {
                program.context_type = context_type.trim().to_string();
            }
            if let Some(methodology) = input.methodology {
                program.methodology = methodology.trim().to_string();
            }
            if let Some(target_population) = input.target_population {
                program.target_population = target_population.trim().to_string();
            }
            if let Some(weeks) = input.duration_weeks {
                program.duration_weeks = require_duration(weeks)?;
            }
            program.updated_at = now;

            tx.execute(
                "UPDATE programs SET name = ?2, description = ?3, context_type = ?4, methodology = ?5,
                     target_population = ?6, duration_weeks = ?7, updated_at = ?8
                 WHERE id = ?1",
                params![
                    program.id.to_string(),
                    program.name,
                    program.description,
                    program.context_type,
                    program.methodology,
                    program.target_population,
                    program.duration_weeks,
                    ts(&now),
                ],
            )?;
            Ok(program)
        })
    }

    /// Delete a draft program together with its sessions and questionnaires.
    pub fn delete_program(&self, principal: &Principal, id: Uuid) -> CoreResult<()> {
        self.transaction(|tx| {
            let program = load_program(tx, id)?;
            ensure_owner(principal, &program)?;
            publication::ensure_editable(&program, "program")?;
            tx.execute("DELETE FROM programs WHERE id = ?1", params![id.to_string()])?;
            Ok(())
        })?;
        tracing::info!(program_id = %id, "program deleted");
        Ok(())
    }

    /// Publish a draft program. See [`publication::check_publishable`].
    pub fn publish_program(
        &self,
        principal: &Principal,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<Program> {
        let program = self.transaction(|tx| {
            let program = load_program(tx, id)?;
            ensure_owner(principal, &program)?;
            publication::ensure_not_published(&program)?;

            let weeks = sessions::week_numbers(tx, id)?;
            publication::check_publishable(&program, &weeks).map_err(|blocker| {
                tracing::warn!(program_id = %id, %blocker, "publish rejected");
                CoreError::PublicationPrecondition(blocker)
            })?;

            let changed = tx.execute(
                "UPDATE programs SET state = 'published', published_at = ?2, updated_at = ?2
                 WHERE id = ?1 AND state = 'draft'",
                params![id.to_string(), ts(&now)],
            )?;
            if changed != 1 {
                return Err(CoreError::invalid_state(format!(
                    "program {id} is already published"
                )));
            }

            Ok(Program {
                state: ProgramState::Published,
                published_at: Some(now),
                updated_at: now,
                ..program
            })
        })?;

        tracing::info!(program_id = %program.id, "program published");
        Ok(program)
    }

    /// Deep-copy a program into a new draft owned by the caller.
    ///
    /// Sessions and questionnaires are rebuilt with fresh ids pointing at the
    /// new program; the originals are never touched.
    pub fn duplicate_program(&self, principal: &Principal, id: Uuid) -> CoreResult<ProgramDetail> {
        let researcher_id = principal.researcher()?;
        let now = Utc::now();

        let detail = self.transaction(|tx| {
            let source = load_program(tx, id)?;
            ensure_owner(principal, &source)?;

            let program = Program {
                id: Uuid::new_v4(),
                researcher_id,
                name: format!("{} (copy)", source.name),
                state: ProgramState::Draft,
                pre_questionnaire_id: None,
                post_questionnaire_id: None,
                created_at: now,
                updated_at: now,
                published_at: None,
                ..source
            };
            insert_program(tx, &program)?;

            let mut copied_sessions = Vec::new();
            for session in sessions::list_for_program(tx, id)? {
                let copy = crate::models::Session {
                    id: Uuid::new_v4(),
                    program_id: program.id,
                    created_at: now,
                    updated_at: now,
                    ..session
                };
                sessions::insert_session(tx, &copy)?;
                copied_sessions.push(copy);
            }

            let mut copied_questionnaires = Vec::new();
            let mut program = program;
            for questionnaire in questionnaires::list_for_program(tx, id)? {
                let copy = crate::models::Questionnaire {
                    id: Uuid::new_v4(),
                    program_id: program.id,
                    created_at: now,
                    updated_at: now,
                    ..questionnaire
                };
                questionnaires::insert_questionnaire(tx, &copy)?;
                set_questionnaire_ref(tx, program.id, copy.moment, Some(copy.id))?;
                match copy.moment {
                    Moment::Pre => program.pre_questionnaire_id = Some(copy.id),
                    Moment::Post => program.post_questionnaire_id = Some(copy.id),
                }
                copied_questionnaires.push(copy);
            }

            Ok(ProgramDetail {
                program,
                sessions: copied_sessions,
                questionnaires: copied_questionnaires,
            })
        })?;

        tracing::info!(source_id = %id, program_id = %detail.program.id, "program duplicated");
        Ok(detail)
    }
}
