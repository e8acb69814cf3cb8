use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::programs::{ensure_owner, ensure_visible, load_program, set_questionnaire_ref, touch};
use super::{col_enum, col_json, col_ts, col_uuid, enrollments, invalid_column, ts, Database};
use crate::error::{is_unique_violation, CoreError, CoreResult};
use crate::models::{
    CreateQuestionnaireInput, Moment, Principal, Questionnaire, QuestionnaireKind,
    QuestionnaireResponse, SubmissionOutcome, SubmitResponseInput, UpdateQuestionnaireInput,
};
use crate::publication;
use crate::questions::QuestionnaireForm;

const QUESTIONNAIRE_COLUMNS: &str =
    "id, program_id, moment, kind, title, description, form, created_at, updated_at";

fn row_to_questionnaire(row: &Row<'_>) -> rusqlite::Result<Questionnaire> {
    let kind = col_enum(row, "kind", QuestionnaireKind::from_str)?;
    let raw_form = col_json(row, "form")?;
    let form = QuestionnaireForm::parse(kind, &raw_form).map_err(|e| invalid_column("form", e))?;

    Ok(Questionnaire {
        id: col_uuid(row, "id")?,
        program_id: col_uuid(row, "program_id")?,
        moment: col_enum(row, "moment", Moment::from_str)?,
        kind,
        title: row.get("title")?,
        description: row.get("description")?,
        form,
        created_at: col_ts(row, "created_at")?,
        updated_at: col_ts(row, "updated_at")?,
    })
}

fn row_to_response(row: &Row<'_>) -> rusqlite::Result<QuestionnaireResponse> {
    Ok(QuestionnaireResponse {
        id: col_uuid(row, "id")?,
        questionnaire_id: col_uuid(row, "questionnaire_id")?,
        participant_id: col_uuid(row, "participant_id")?,
        answers: col_json(row, "answers")?,
        submitted_at: col_ts(row, "submitted_at")?,
    })
}

pub(crate) fn find_questionnaire(conn: &Connection, id: Uuid) -> CoreResult<Option<Questionnaire>> {
    let sql = format!("SELECT {QUESTIONNAIRE_COLUMNS} FROM questionnaires WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id.to_string()], row_to_questionnaire)
        .optional()?)
}

pub(crate) fn load_questionnaire(conn: &Connection, id: Uuid) -> CoreResult<Questionnaire> {
    find_questionnaire(conn, id)?.ok_or_else(|| CoreError::not_found("questionnaire", id))
}

/// Questionnaires of a program, pre before post.
pub(crate) fn list_for_program(
    conn: &Connection,
    program_id: Uuid,
) -> CoreResult<Vec<Questionnaire>> {
    let sql = format!(
        "SELECT {QUESTIONNAIRE_COLUMNS} FROM questionnaires WHERE program_id = ?1
         ORDER BY CASE moment WHEN 'pre' THEN 0 ELSE 1 END"
    );
    let mut stmt = conn.prepare(&sql)?;
    let questionnaires = stmt
        .query_map(params![program_id.to_string()], row_to_questionnaire)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(questionnaires)
}

fn moment_taken(conn: &Connection, program_id: Uuid, moment: Moment) -> CoreResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM questionnaires WHERE program_id = ?1 AND moment = ?2)",
        params![program_id.to_string(), moment.as_str()],
        |row| row.get(0),
    )?)
}

pub(crate) fn insert_questionnaire(conn: &Connection, questionnaire: &Questionnaire) -> CoreResult<()> {
    conn.execute(
        "INSERT INTO questionnaires (id, program_id, moment, kind, title, description, form,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            questionnaire.id.to_string(),
            questionnaire.program_id.to_string(),
            questionnaire.moment.as_str(),
            questionnaire.kind.as_str(),
            questionnaire.title,
            questionnaire.description,
            serde_json::to_string(&questionnaire.form)?,
            ts(&questionnaire.created_at),
            ts(&questionnaire.updated_at),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            CoreError::DuplicateMoment {
                moment: questionnaire.moment.as_str(),
            }
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub(crate) fn find_response(
    conn: &Connection,
    questionnaire_id: Uuid,
    participant_id: Uuid,
) -> CoreResult<Option<QuestionnaireResponse>> {
    Ok(conn
        .query_row(
            "SELECT id, questionnaire_id, participant_id, answers, submitted_at
             FROM questionnaire_responses
             WHERE questionnaire_id = ?1 AND participant_id = ?2",
            params![questionnaire_id.to_string(), participant_id.to_string()],
            row_to_response,
        )
        .optional()?)
}

pub(crate) fn list_responses(
    conn: &Connection,
    questionnaire_id: Uuid,
) -> CoreResult<Vec<QuestionnaireResponse>> {
    let mut stmt = conn.prepare(
        "SELECT id, questionnaire_id, participant_id, answers, submitted_at
         FROM questionnaire_responses WHERE questionnaire_id = ?1
         ORDER BY submitted_at",
    )?;
    let responses = stmt
        .query_map(params![questionnaire_id.to_string()], row_to_response)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(responses)
}

fn require_title(title: &str) -> CoreResult<String> {
    let title = title.trim();
    if title.is_empty() {
        Err(CoreError::validation("questionnaire title must not be empty"))
    } else {
        Ok(title.to_string())
    }
}

impl Database {
    /// Attach the pre or post questionnaire to a draft program.
    pub fn create_questionnaire(
        &self,
        principal: &Principal,
        program_id: Uuid,
        input: CreateQuestionnaireInput,
    ) -> CoreResult<Questionnaire> {
        let now = Utc::now();
        let questionnaire = self.transaction(|tx| {
            let program = load_program(tx, program_id)?;
            ensure_owner(principal, &program)?;
            publication::ensure_editable(&program, "questionnaire")?;

            if moment_taken(tx, program_id, input.moment)? {
                return Err(CoreError::DuplicateMoment {
                    moment: input.moment.as_str(),
                });
            }

            let questionnaire = Questionnaire {
                id: Uuid::new_v4(),
                program_id,
                moment: input.moment,
                kind: input.kind,
                title: require_title(&input.title)?,
                description: input.description.clone(),
                form: QuestionnaireForm::parse(input.kind, &input.form)?,
                created_at: now,
                updated_at: now,
            };
            insert_questionnaire(tx, &questionnaire)?;
            set_questionnaire_ref(tx, program_id, questionnaire.moment, Some(questionnaire.id))?;
            touch(tx, program_id, now)?;
            Ok(questionnaire)
        })?;

        tracing::info!(
            questionnaire_id = %questionnaire.id,
            %program_id,
            moment = questionnaire.moment.as_str(),
            "questionnaire created"
        );
        Ok(questionnaire)
    }

    pub fn update_questionnaire(
        &self,
        principal: &Principal,
        questionnaire_id: Uuid,
        input: UpdateQuestionnaireInput,
    ) -> CoreResult<Questionnaire> {
        let now = Utc::now();
        self.transaction(|tx| {
            let mut questionnaire = load_questionnaire(tx, questionnaire_id)?;
            let program = load_program(tx, questionnaire.program_id)?;
            ensure_owner(principal, &program)?;
            publication::ensure_editable(&program, "questionnaire")?;

            if let Some(title) = &input.title {
                questionnaire.title = require_title(title)?;
            }
            if let Some(description) = input.description {
                questionnaire.description = Some(description).filter(|d| !d.trim().is_empty());
            }
            let kind = input.kind.unwrap_or(questionnaire.kind);
            let raw_form = match input.form {
                Some(form) => form,
                None => serde_json::to_value(&questionnaire.form)?,
            };
            questionnaire.form = QuestionnaireForm::parse(kind, &raw_form)?;
            questionnaire.kind = kind;
            questionnaire.updated_at = now;

            tx.execute(
                "UPDATE questionnaires SET title = ?2, description = ?3, kind = ?4, form = ?5,
                     updated_at = ?6
                 WHERE id = ?1",
                params![
                    questionnaire.id.to_string(),
                    questionnaire.title,
                    questionnaire.description,
                    questionnaire.kind.as_str(),
                    serde_json::to_string(&questionnaire.form)?,
                    ts(&now),
                ],
            )?;
            touch(tx, questionnaire.program_id, now)?;
            Ok(questionnaire)
        })
    }

    /// Delete a questionnaire of a draft program and clear the program's reference.
    pub fn delete_questionnaire(&self, principal: &Principal, questionnaire_id: Uuid) -> CoreResult<()> {
        let now = Utc::now();
        self.transaction(|tx| {
            let questionnaire = load_questionnaire(tx, questionnaire_id)?;
            let program = load_program(tx, questionnaire.program_id)?;
            ensure_owner(principal, &program)?;
            publication::ensure_editable(&program, "questionnaire")?;

            set_questionnaire_ref(tx, program.id, questionnaire.moment, None)?;
            tx.execute(
                "DELETE FROM questionnaires WHERE id = ?1",
                params![questionnaire_id.to_string()],
            )?;
            touch(tx, program.id, now)
        })?;
        tracing::info!(%questionnaire_id, "questionnaire deleted");
        Ok(())
    }

    pub fn get_questionnaire(
        &self,
        principal: &Principal,
        questionnaire_id: Uuid,
    ) -> CoreResult<Questionnaire> {
        self.with_connection(|conn| {
            let questionnaire = load_questionnaire(conn, questionnaire_id)?;
            let program = load_program(conn, questionnaire.program_id)?;
            ensure_visible(principal, &program)?;
            Ok(questionnaire)
        })
    }

    /// Record a participant's answers. Each participant answers once.
    ///
    /// Answering the post questionnaire completes the participant's
    /// in-progress enrollment in the program, if there is one.
    pub fn submit_response(
        &self,
        principal: &Principal,
        questionnaire_id: Uuid,
        input: SubmitResponseInput,
        now: DateTime<Utc>,
    ) -> CoreResult<SubmissionOutcome> {
        let participant_id = principal.participant()?;

        let outcome = self.transaction(|tx| {
            let questionnaire = load_questionnaire(tx, questionnaire_id)?;
            let program = load_program(tx, questionnaire.program_id)?;
            publication::ensure_accepts_participants(&program)?;

            if find_response(tx, questionnaire_id, participant_id)?.is_some() {
                return Err(CoreError::DuplicateResponse);
            }
            questionnaire.form.check_answers(&input.answers)?;

            let response = QuestionnaireResponse {
                id: Uuid::new_v4(),
                questionnaire_id,
                participant_id,
                answers: input.answers.clone(),
                submitted_at: now,
            };
            tx.execute(
                "INSERT INTO questionnaire_responses (id, questionnaire_id, participant_id, answers, submitted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    response.id.to_string(),
                    questionnaire_id.to_string(),
                    participant_id.to_string(),
                    serde_json::to_string(&response.answers)?,
                    ts(&now),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CoreError::DuplicateResponse
                } else {
                    e.into()
                }
            })?;

            let completed_enrollment = match questionnaire.moment {
                Moment::Pre => None,
                Moment::Post => {
                    enrollments::complete_via_post_questionnaire(tx, program.id, participant_id, now)?
                }
            };

            Ok(SubmissionOutcome {
                response,
                completed_enrollment,
            })
        })?;

        tracing::info!(
            %questionnaire_id,
            %participant_id,
            completed = outcome.completed_enrollment.is_some(),
            "questionnaire response stored"
        );
        Ok(outcome)
    }

    /// The caller's own response to a questionnaire, if any.
    pub fn get_own_response(
        &self,
        principal: &Principal,
        questionnaire_id: Uuid,
    ) -> CoreResult<Option<QuestionnaireResponse>> {
        let participant_id = principal.participant()?;
        self.with_connection(|conn| find_response(conn, questionnaire_id, participant_id))
    }

    /// All responses to a questionnaire; owner researchers and admins only.
    pub fn list_responses(
        &self,
        principal: &Principal,
        questionnaire_id: Uuid,
    ) -> CoreResult<Vec<QuestionnaireResponse>> {
        self.with_connection(|conn| {
            let questionnaire = load_questionnaire(conn, questionnaire_id)?;
            let program = load_program(conn, questionnaire.program_id)?;
            ensure_owner(principal, &program)?;
            list_responses(conn, questionnaire_id)
        })
    }
}
