use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::Enrollment;
use crate::questions::QuestionnaireForm;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Questionnaire {
    pub id: Uuid,
    pub program_id: Uuid,
    pub moment: Moment,
    pub kind: QuestionnaireKind,
    pub title: String,
    pub description: Option<String>,
    pub form: QuestionnaireForm,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// When in the program a questionnaire is administered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Moment {
    Pre,
    Post,
}

impl Moment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pre" => Some(Self::Pre),
            "post" => Some(Self::Post),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionnaireKind {
    Custom,
    Likert,
    Predefined,
}

impl QuestionnaireKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Likert => "likert",
            Self::Predefined => "predefined",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "custom" => Some(Self::Custom),
            "likert" => Some(Self::Likert),
            "predefined" => Some(Self::Predefined),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuestionnaireInput {
    pub moment: Moment,
    pub kind: QuestionnaireKind,
    pub title: String,
    pub description: Option<String>,
    /// Raw form, validated against `kind` before anything is written.
    pub form: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateQuestionnaireInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: Option<QuestionnaireKind>,
    pub form: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionnaireResponse {
    pub id: Uuid,
    pub questionnaire_id: Uuid,
    pub participant_id: Uuid,
    pub answers: Value,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponseInput {
    pub answers: Value,
}

/// Result of a questionnaire submission.
///
/// `completed_enrollment` is set when a post questionnaire closed the
/// participant's in-progress enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub response: QuestionnaireResponse,
    pub completed_enrollment: Option<Enrollment>,
}
