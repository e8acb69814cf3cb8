//! Questionnaire forms and answer checking.
//!
//! A questionnaire form is either a list of typed questions (custom and
//! predefined questionnaires) or a Likert grid of statements sharing one
//! scale. Forms are validated as a whole when written; the first violation
//! rejects the write.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::models::QuestionnaireKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Text {
        #[serde(default)]
        multiline: bool,
    },
    SingleSelect {
        options: Vec<String>,
    },
    MultiSelect {
        options: Vec<String>,
    },
    Rating {
        stars: u8,
        icon: String,
    },
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::SingleSelect { .. } => "single_select",
            Self::MultiSelect { .. } => "multi_select",
            Self::Rating { .. } => "rating",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LikertScale {
    pub scale_labels: Vec<String>,
    pub statements: Vec<String>,
}

/// The body of a questionnaire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum QuestionnaireForm {
    Likert(LikertScale),
    Questions(Vec<Question>),
}

impl QuestionnaireForm {
    /// Parses and validates a raw form for the given questionnaire kind.
    pub fn parse(kind: QuestionnaireKind, raw: &Value) -> CoreResult<Self> {
        let form = match kind {
            QuestionnaireKind::Likert => {
                if !raw.is_object() {
                    return Err(CoreError::validation(
                        "likert questionnaires need an object with scale_labels and statements",
                    ));
                }
                let scale: LikertScale = serde_json::from_value(raw.clone())
                    .map_err(|e| CoreError::validation(format!("malformed likert form: {e}")))?;
                Self::Likert(scale)
            }
            QuestionnaireKind::Custom | QuestionnaireKind::Predefined => {
                let items = raw.as_array().ok_or_else(|| {
                    CoreError::validation("questionnaire form must be a list of questions")
                })?;
                let mut questions = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let question: Question = serde_json::from_value(item.clone()).map_err(|e| {
                        CoreError::validation(format!("question {}: {e}", index + 1))
                    })?;
                    questions.push(question);
                }
                Self::Questions(questions)
            }
        };
        form.validate()?;
        Ok(form)
    }

    pub fn validate(&self) -> CoreResult<()> {
        match self {
            Self::Likert(scale) => validate_likert(scale),
            Self::Questions(questions) => validate_questions(questions),
        }
    }

    /// Checks a participant's answers against this form.
    ///
    /// Likert forms take a list of scale positions (1-based) aligned with the
    /// statements; question forms take an object keyed by question id.
    pub fn check_answers(&self, answers: &Value) -> CoreResult<()> {
        match self {
            Self::Likert(scale) => check_likert_answers(scale, answers),
            Self::Questions(questions) => check_question_answers(questions, answers),
        }
    }
}

fn validate_likert(scale: &LikertScale) -> CoreResult<()> {
    if scale.scale_labels.len() < 2 {
        return Err(CoreError::validation(
            "likert scale needs at least two labels",
        ));
    }
    if scale.statements.is_empty() {
        return Err(CoreError::validation("likert form needs at least one statement"));
    }
    if let Some(pos) = scale.scale_labels.iter().position(|l| l.trim().is_empty()) {
        return Err(CoreError::validation(format!("scale label {} is empty", pos + 1)));
    }
    if let Some(pos) = scale.statements.iter().position(|s| s.trim().is_empty()) {
        return Err(CoreError::validation(format!("statement {} is empty", pos + 1)));
    }
    Ok(())
}

fn validate_questions(questions: &[Question]) -> CoreResult<()> {
    if questions.is_empty() {
        return Err(CoreError::validation("questionnaire needs at least one question"));
    }

    let mut seen = HashSet::new();
    for (index, question) in questions.iter().enumerate() {
        let n = index + 1;
        if question.id.trim().is_empty() {
            return Err(CoreError::validation(format!("question {n}: missing id")));
        }
        if !seen.insert(question.id.as_str()) {
            return Err(CoreError::validation(format!(
                "question {n}: duplicate id {:?}",
                question.id
            )));
        }
        if question.prompt.trim().is_empty() {
            return Err(CoreError::validation(format!("question {n}: missing prompt")));
        }
        match &question.kind {
            QuestionKind::Text { .. } => {}
            QuestionKind::SingleSelect { options } | QuestionKind::MultiSelect { options } => {
                if options.is_empty() {
                    return Err(CoreError::validation(format!(
                        "question {n}: {} needs at least one option",
                        question.kind.as_str()
                    )));
                }
                if options.iter().any(|o| o.trim().is_empty()) {
                    return Err(CoreError::validation(format!(
                        "question {n}: options must not be empty"
                    )));
                }
                let distinct: HashSet<_> = options.iter().collect();
                if distinct.len() != options.len() {
                    return Err(CoreError::validation(format!(
                        "question {n}: options must be distinct"
                    )));
                }
            }
            QuestionKind::Rating { stars, icon } => {
                if *stars == 0 {
                    return Err(CoreError::validation(format!(
                        "question {n}: rating needs a star count"
                    )));
                }
                if icon.trim().is_empty() {
                    return Err(CoreError::validation(format!(
                        "question {n}: rating needs an icon"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn check_likert_answers(scale: &LikertScale, answers: &Value) -> CoreResult<()> {
    let values = answers
        .as_array()
        .ok_or_else(|| CoreError::validation("likert answers must be a list"))?;
    if values.len() != scale.statements.len() {
        return Err(CoreError::validation(format!(
            "expected {} likert answers, got {}",
            scale.statements.len(),
            values.len()
        )));
    }
    let max = scale.scale_labels.len() as u64;
    for (index, value) in values.iter().enumerate() {
        match value.as_u64() {
            Some(v) if (1..=max).contains(&v) => {}
            _ => {
                return Err(CoreError::validation(format!(
                    "answer {} must be between 1 and {max}",
                    index + 1
                )))
            }
        }
    }
    Ok(())
}

fn check_question_answers(questions: &[Question], answers: &Value) -> CoreResult<()> {
    let map: BTreeMap<String, Value> = serde_json::from_value(answers.clone())
        .map_err(|_| CoreError::validation("answers must be an object keyed by question id"))?;

    for key in map.keys() {
        if !questions.iter().any(|q| &q.id == key) {
            return Err(CoreError::validation(format!("unknown question id {key:?}")));
        }
    }

    for question in questions {
        let Some(answer) = map.get(&question.id).filter(|v| !v.is_null()) else {
            if question.required {
                return Err(CoreError::validation(format!(
                    "question {:?} is required",
                    question.id
                )));
            }
            continue;
        };
        let ok = match &question.kind {
            QuestionKind::Text { .. } => answer.is_string(),
            QuestionKind::SingleSelect { options } => answer
                .as_str()
                .is_some_and(|a| options.iter().any(|o| o == a)),
            QuestionKind::MultiSelect { options } => answer.as_array().is_some_and(|items| {
                items
                    .iter()
                    .all(|i| i.as_str().is_some_and(|a| options.iter().any(|o| o == a)))
            }),
            QuestionKind::Rating { stars, .. } => answer
                .as_u64()
                .is_some_and(|v| (1..=u64::from(*stars)).contains(&v)),
        };
        if !ok {
            return Err(CoreError::validation(format!(
                "invalid answer for {} question {:?}",
                question.kind.as_str(),
                question.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn custom(raw: Value) -> CoreResult<QuestionnaireForm> {
        QuestionnaireForm::parse(QuestionnaireKind::Custom, &raw)
    }

    #[test]
    fn parses_every_question_type() {
        let form = custom(json!([
            {"id": "q1", "type": "text", "prompt": "How do you feel?"},
            {"id": "q2", "type": "single_select", "prompt": "Pick one", "options": ["a", "b"]},
            {"id": "q3", "type": "multi_select", "prompt": "Pick many", "options": ["x", "y"]},
            {"id": "q4", "type": "rating", "prompt": "Rate", "stars": 5, "icon": "star"}
        ]))
        .unwrap();
        let QuestionnaireForm::Questions(questions) = form else {
            panic!("expected a question list");
        };
        assert_eq!(questions.len(), 4);
        assert!(matches!(questions[3].kind, QuestionKind::Rating { stars: 5, .. }));
    }

    #[test]
    fn rejects_missing_type() {
        let err = custom(json!([{"id": "q1", "prompt": "?"}])).unwrap_err();
        assert!(err.to_string().contains("question 1"));
    }

    #[test]
    fn rejects_select_without_options() {
        let err = custom(json!([
            {"id": "q1", "type": "single_select", "prompt": "Pick", "options": []}
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn rejects_rating_without_icon() {
        assert!(custom(json!([
            {"id": "q1", "type": "rating", "prompt": "Rate", "stars": 5, "icon": ""}
        ]))
        .is_err());
        assert!(custom(json!([
            {"id": "q1", "type": "rating", "prompt": "Rate", "stars": 5}
        ]))
        .is_err());
    }

    #[test]
    fn rejects_duplicate_ids_and_blank_prompt() {
        assert!(custom(json!([
            {"id": "q1", "type": "text", "prompt": "a"},
            {"id": "q1", "type": "text", "prompt": "b"}
        ]))
        .is_err());
        assert!(custom(json!([{"id": "q1", "type": "text", "prompt": " "}])).is_err());
    }

    #[test]
    fn likert_requires_top_level_shape() {
        let ok = QuestionnaireForm::parse(
            QuestionnaireKind::Likert,
            &json!({"scale_labels": ["never", "sometimes", "always"], "statements": ["I notice my breath"]}),
        )
        .unwrap();
        assert!(matches!(ok, QuestionnaireForm::Likert(_)));

        let per_question = QuestionnaireForm::parse(
            QuestionnaireKind::Likert,
            &json!([{"id": "q1", "type": "text", "prompt": "?"}]),
        );
        assert!(per_question.is_err());
    }

    #[test]
    fn checks_likert_answers_by_position() {
        let form = QuestionnaireForm::parse(
            QuestionnaireKind::Likert,
            &json!({"scale_labels": ["1", "2", "3", "4", "5"], "statements": ["a", "b"]}),
        )
        .unwrap();
        assert!(form.check_answers(&json!([1, 5])).is_ok());
        assert!(form.check_answers(&json!([1])).is_err());
        assert!(form.check_answers(&json!([0, 6])).is_err());
    }

    #[test]
    fn checks_answers_by_question_id() {
        let form = custom(json!([
            {"id": "mood", "type": "single_select", "prompt": "Mood", "options": ["calm", "tense"], "required": true},
            {"id": "stars", "type": "rating", "prompt": "Rate", "stars": 5, "icon": "heart"}
        ]))
        .unwrap();

        assert!(form.check_answers(&json!({"mood": "calm", "stars": 4})).is_ok());
        assert!(form.check_answers(&json!({"mood": "calm"})).is_ok());
        assert!(form.check_answers(&json!({"stars": 4})).is_err());
        assert!(form.check_answers(&json!({"mood": "angry"})).is_err());
        assert!(form.check_answers(&json!({"mood": "calm", "other": 1})).is_err());
        assert!(form.check_answers(&json!({"mood": "calm", "stars": 9})).is_err());
    }
}
