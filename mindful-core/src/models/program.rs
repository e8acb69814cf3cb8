use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Questionnaire, Session};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub researcher_id: Uuid,
    pub name: String,
    pub description: String,
    pub context_type: String,
    pub methodology: String,
    pub target_population: String,
    pub duration_weeks: u32,
    pub state: ProgramState,
    pub pre_questionnaire_id: Option<Uuid>,
    pub post_questionnaire_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Program {
    pub fn is_draft(&self) -> bool {
        self.state == ProgramState::Draft
    }

    pub fn is_published(&self) -> bool {
        self.state == ProgramState::Published
    }
}

/// Publication state. `Published` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgramState {
    Draft,
    Published,
}

impl ProgramState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProgramInput {
    pub name: String,
    pub description: String,
    pub context_type: String,
    pub methodology: String,
    pub target_population: String,
    pub duration_weeks: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProgramInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub context_type: Option<String>,
    pub methodology: Option<String>,
    pub target_population: Option<String>,
    pub duration_weeks: Option<u32>,
}

impl UpdateProgramInput {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.context_type.is_none()
            && self.methodology.is_none()
            && self.target_population.is_none()
            && self.duration_weeks.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramDetail {
    #[serde(flatten)]
    pub program: Program,
    pub sessions: Vec<Session>,
    pub questionnaires: Vec<Questionnaire>,
}
