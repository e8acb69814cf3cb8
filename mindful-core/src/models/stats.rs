use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Moment, ProgramState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramStats {
    pub program_id: Uuid,
    pub program_name: String,
    pub state: ProgramState,
    pub total_enrollments: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub abandoned: u64,
    pub completion_rate: f64,
    pub sessions: Vec<SessionStats>,
    pub questionnaires: Vec<QuestionnaireStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: Uuid,
    pub week_number: u32,
    pub title: String,
    pub diary_entries: u64,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionnaireStats {
    pub questionnaire_id: Uuid,
    pub moment: Moment,
    pub title: String,
    pub responses: u64,
}

/// Rollup over every program a researcher owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearcherOverview {
    pub researcher_id: Uuid,
    pub total_programs: u64,
    pub published_programs: u64,
    pub total_enrollments: u64,
    pub completed_enrollments: u64,
    pub programs: Vec<ProgramStats>,
}

/// One diary entry flattened for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiaryExportRow {
    pub participant_id: Uuid,
    pub username: String,
    pub week_number: u32,
    pub session_title: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: String,
}

/// One questionnaire response flattened for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseExportRow {
    pub participant_id: Uuid,
    pub username: String,
    pub moment: Moment,
    pub questionnaire_title: String,
    pub answers: serde_json::Value,
    pub submitted_at: String,
}
