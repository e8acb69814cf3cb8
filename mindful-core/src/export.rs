//! Rendering of read-only aggregates for download.
//!
//! Pure presentation: everything here takes rows already produced by the
//! database layer and turns them into delimited text or JSON.

use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{CoreError, CoreResult};
use crate::models::{DiaryExportRow, Principal, ProgramStats, ResponseExportRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(CoreError::validation(format!("unknown export format {other:?}"))),
        }
    }
}

/// What to export for a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Stats,
    Diary,
    Responses,
}

impl FromStr for ExportKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stats" => Ok(Self::Stats),
            "diary" => Ok(Self::Diary),
            "responses" => Ok(Self::Responses),
            other => Err(CoreError::validation(format!("unknown export kind {other:?}"))),
        }
    }
}

/// Load and render one export for a program the caller owns.
pub fn render(
    db: &Database,
    principal: &Principal,
    program_id: Uuid,
    kind: ExportKind,
    format: ExportFormat,
) -> CoreResult<String> {
    match kind {
        ExportKind::Stats => program_stats(&db.program_stats(principal, program_id)?, format),
        ExportKind::Diary => diary_entries(&db.diary_export_rows(principal, program_id)?, format),
        ExportKind::Responses => {
            questionnaire_responses(&db.response_export_rows(principal, program_id)?, format)
        }
    }
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn push_row(out: &mut String, fields: &[String]) {
    let line = fields
        .iter()
        .map(|f| field(f))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> CoreResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn program_stats(stats: &ProgramStats, format: ExportFormat) -> CoreResult<String> {
    match format {
        ExportFormat::Json => to_json(stats),
        ExportFormat::Csv => {
            let mut out = String::new();
            push_row(
                &mut out,
                &[
                    "program".into(),
                    "enrollments".into(),
                    "in_progress".into(),
                    "completed".into(),
                    "abandoned".into(),
                    "completion_rate".into(),
                ],
            );
            push_row(
                &mut out,
                &[
                    stats.program_name.clone(),
                    stats.total_enrollments.to_string(),
                    stats.in_progress.to_string(),
                    stats.completed.to_string(),
                    stats.abandoned.to_string(),
                    format!("{:.4}", stats.completion_rate),
                ],
            );
            out.push_str("\r\n");
            push_row(
                &mut out,
                &[
                    "week".into(),
                    "session".into(),
                    "diary_entries".into(),
                    "average_rating".into(),
                ],
            );
            for session in &stats.sessions {
                push_row(
                    &mut out,
                    &[
                        session.week_number.to_string(),
                        session.title.clone(),
                        session.diary_entries.to_string(),
                        session
                            .average_rating
                            .map(|r| format!("{r:.2}"))
                            .unwrap_or_default(),
                    ],
                );
            }
            out.push_str("\r\n");
            push_row(
                &mut out,
                &["moment".into(), "questionnaire".into(), "responses".into()],
            );
            for questionnaire in &stats.questionnaires {
                push_row(
                    &mut out,
                    &[
                        questionnaire.moment.as_str().into(),
                        questionnaire.title.clone(),
                        questionnaire.responses.to_string(),
                    ],
                );
            }
            Ok(out)
        }
    }
}

pub fn diary_entries(rows: &[DiaryExportRow], format: ExportFormat) -> CoreResult<String> {
    match format {
        ExportFormat::Json => to_json(rows),
        ExportFormat::Csv => {
            let mut out = String::new();
            push_row(
                &mut out,
                &[
                    "participant_id".into(),
                    "username".into(),
                    "week".into(),
                    "session".into(),
                    "rating".into(),
                    "comment".into(),
                    "created_at".into(),
                ],
            );
            for row in rows {
                push_row(
                    &mut out,
                    &[
                        row.participant_id.to_string(),
                        row.username.clone(),
                        row.week_number.to_string(),
                        row.session_title.clone(),
                        row.rating.to_string(),
                        row.comment.clone().unwrap_or_default(),
                        row.created_at.clone(),
                    ],
                );
            }
            Ok(out)
        }
    }
}

/// Answers go into a single JSON-encoded column in CSV output.
pub fn questionnaire_responses(rows: &[ResponseExportRow], format: ExportFormat) -> CoreResult<String> {
    match format {
        ExportFormat::Json => to_json(rows),
        ExportFormat::Csv => {
            let mut out = String::new();
            push_row(
                &mut out,
                &[
                    "participant_id".into(),
                    "username".into(),
                    "moment".into(),
                    "questionnaire".into(),
                    "answers".into(),
                    "submitted_at".into(),
                ],
            );
            for row in rows {
                push_row(
                    &mut out,
                    &[
                        row.participant_id.to_string(),
                        row.username.clone(),
                        row.moment.as_str().into(),
                        row.questionnaire_title.clone(),
                        serde_json::to_string(&row.answers)?,
                        row.submitted_at.clone(),
                    ],
                );
            }
            Ok(out)
        }
    }
}
