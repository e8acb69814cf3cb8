use rusqlite::{params, Connection};
use uuid::Uuid;

use super::programs::{ensure_owner, list_programs_where, load_program};
use super::{col_enum, col_json, col_uuid, Database};
use crate::error::CoreResult;
use crate::models::{
    DiaryExportRow, Moment, Principal, Program, ProgramState, ProgramStats, QuestionnaireStats,
    ResearcherOverview, ResponseExportRow, SessionStats,
};

fn stats_for(conn: &Connection, program: &Program) -> CoreResult<ProgramStats> {
    let id = program.id.to_string();

    let (total, in_progress, completed, abandoned): (u64, u64, u64, u64) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(state = 'in_progress'), 0),
                COALESCE(SUM(state = 'completed'), 0),
                COALESCE(SUM(state = 'abandoned'), 0)
         FROM enrollments WHERE program_id = ?1",
        params![id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    let mut stmt = conn.prepare(
        "SELECT s.id, s.week_number, s.title, COUNT(d.id) AS entries, AVG(d.rating) AS average
         FROM sessions s
         LEFT JOIN diary_entries d ON d.session_id = s.id
         WHERE s.program_id = ?1
         GROUP BY s.id
         ORDER BY s.week_number",
    )?;
    let sessions = stmt
        .query_map(params![id], |row| {
            Ok(SessionStats {
                session_id: col_uuid(row, "id")?,
                week_number: row.get("week_number")?,
                title: row.get("title")?,
                diary_entries: row.get("entries")?,
                average_rating: row.get("average")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT q.id, q.moment, q.title, COUNT(r.id) AS responses
         FROM questionnaires q
         LEFT JOIN questionnaire_responses r ON r.questionnaire_id = q.id
         WHERE q.program_id = ?1
         GROUP BY q.id
         ORDER BY CASE q.moment WHEN 'pre' THEN 0 ELSE 1 END",
    )?;
    let questionnaires = stmt
        .query_map(params![id], |row| {
            Ok(QuestionnaireStats {
                questionnaire_id: col_uuid(row, "id")?,
                moment: col_enum(row, "moment", Moment::from_str)?,
                title: row.get("title")?,
                responses: row.get("responses")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let completion_rate = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64
    };

    Ok(ProgramStats {
        program_id: program.id,
        program_name: program.name.clone(),
        state: program.state,
        total_enrollments: total,
        in_progress,
        completed,
        abandoned,
        completion_rate,
        sessions,
        questionnaires,
    })
}

impl Database {
    /// Enrollment, diary and questionnaire rollups for one program.
    pub fn program_stats(&self, principal: &Principal, program_id: Uuid) -> CoreResult<ProgramStats> {
        self.with_connection(|conn| {
            let program = load_program(conn, program_id)?;
            ensure_owner(principal, &program)?;
            stats_for(conn, &program)
        })
    }

    /// Rollup over every program owned by the calling researcher.
    pub fn researcher_overview(&self, principal: &Principal) -> CoreResult<ResearcherOverview> {
        let researcher_id = principal.researcher()?;
        self.with_connection(|conn| {
            let programs = list_programs_where(
                conn,
                "WHERE researcher_id = ?1",
                Some(researcher_id.to_string()),
            )?;
            let stats = programs
                .iter()
                .map(|p| stats_for(conn, p))
                .collect::<CoreResult<Vec<_>>>()?;

            Ok(ResearcherOverview {
                researcher_id,
                total_programs: stats.len() as u64,
                published_programs: stats
                    .iter()
                    .filter(|s| s.state == ProgramState::Published)
                    .count() as u64,
                total_enrollments: stats.iter().map(|s| s.total_enrollments).sum(),
                completed_enrollments: stats.iter().map(|s| s.completed).sum(),
                programs: stats,
            })
        })
    }

    /// Diary entries of a program flattened for export.
    pub fn diary_export_rows(
        &self,
        principal: &Principal,
        program_id: Uuid,
    ) -> CoreResult<Vec<DiaryExportRow>> {
        self.with_connection(|conn| {
            let program = load_program(conn, program_id)?;
            ensure_owner(principal, &program)?;

            let mut stmt = conn.prepare(
                "SELECT d.participant_id, u.username, s.week_number, s.title,
                        d.rating, d.comment, d.created_at
                 FROM diary_entries d
                 JOIN sessions s ON s.id = d.session_id
                 JOIN participant_profiles p ON p.id = d.participant_id
                 JOIN users u ON u.id = p.user_id
                 WHERE s.program_id = ?1
                 ORDER BY u.username, s.week_number",
            )?;
            let rows = stmt
                .query_map(params![program_id.to_string()], |row| {
                    Ok(DiaryExportRow {
                        participant_id: col_uuid(row, "participant_id")?,
                        username: row.get("username")?,
                        week_number: row.get("week_number")?,
                        session_title: row.get("title")?,
                        rating: row.get("rating")?,
                        comment: row.get("comment")?,
                        created_at: row.get("created_at")?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Questionnaire responses of a program flattened for export.
    pub fn response_export_rows(
        &self,
        principal: &Principal,
        program_id: Uuid,
    ) -> CoreResult<Vec<ResponseExportRow>> {
        self.with_connection(|conn| {
            let program = load_program(conn, program_id)?;
            ensure_owner(principal, &program)?;

            let mut stmt = conn.prepare(
                "SELECT r.participant_id, u.username, q.moment, q.title, r.answers, r.submitted_at
                 FROM questionnaire_responses r
                 JOIN questionnaires q ON q.id = r.questionnaire_id
                 JOIN participant_profiles p ON p.id = r.participant_id
                 JOIN users u ON u.id = p.user_id
                 WHERE q.program_id = ?1
                 ORDER BY u.username, CASE q.moment WHEN 'pre' THEN 0 ELSE 1 END",
            )?;
            let rows = stmt
                .query_map(params![program_id.to_string()], |row| {
                    Ok(ResponseExportRow {
                        participant_id: col_uuid(row, "participant_id")?,
                        username: row.get("username")?,
                        moment: col_enum(row, "moment", Moment::from_str)?,
                        questionnaire_title: row.get("title")?,
                        answers: col_json(row, "answers")?,
                        submitted_at: row.get("submitted_at")?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
