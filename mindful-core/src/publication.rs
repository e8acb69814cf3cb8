//! Program publication state machine.
//!
//! `Draft -> Published` is the only transition and it happens once. Every
//! caller that needs to know whether a program may be published, edited or
//! joined goes through this module.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::models::{Moment, Program};

/// The first publication check a program failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum PublishBlocker {
    MissingField { field: &'static str },
    MissingQuestionnaire { moment: Moment },
    DuplicateWeeks { weeks: Vec<u32> },
    MissingWeeks { weeks: Vec<u32> },
    UnexpectedWeeks { weeks: Vec<u32> },
}

impl fmt::Display for PublishBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "required field `{field}` is empty"),
            Self::MissingQuestionnaire { moment } => {
                write!(f, "the {} questionnaire is missing", moment.as_str())
            }
            Self::DuplicateWeeks { weeks } => {
                write!(f, "more than one session for weeks {}", join(weeks))
            }
            Self::MissingWeeks { weeks } => write!(f, "no session for weeks {}", join(weeks)),
            Self::UnexpectedWeeks { weeks } => {
                write!(f, "sessions outside the program duration: weeks {}", join(weeks))
            }
        }
    }
}

fn join(weeks: &[u32]) -> String {
    weeks
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks whether `program` with sessions on `week_numbers` can be published.
///
/// Checks run in a fixed order (scalar fields, questionnaires, weeks) and the
/// first failure is reported.
pub fn check_publishable(program: &Program, week_numbers: &[u32]) -> Result<(), PublishBlocker> {
    let fields: [(&'static str, &str); 5] = [
        ("name", &program.name),
        ("description", &program.description),
        ("context_type", &program.context_type),
        ("methodology", &program.methodology),
        ("target_population", &program.target_population),
    ];
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(PublishBlocker::MissingField { field });
        }
    }
    if program.duration_weeks == 0 {
        return Err(PublishBlocker::MissingField {
            field: "duration_weeks",
        });
    }
    if program.researcher_id.is_nil() {
        return Err(PublishBlocker::MissingField { field: "owner" });
    }

    if program.pre_questionnaire_id.is_none() {
        return Err(PublishBlocker::MissingQuestionnaire { moment: Moment::Pre });
    }
    if program.post_questionnaire_id.is_none() {
        return Err(PublishBlocker::MissingQuestionnaire {
            moment: Moment::Post,
        });
    }

    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for week in week_numbers {
        *counts.entry(*week).or_default() += 1;
    }

    let duplicates: Vec<u32> = counts
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(w, _)| *w)
        .collect();
    if !duplicates.is_empty() {
        return Err(PublishBlocker::DuplicateWeeks { weeks: duplicates });
    }

    let missing: Vec<u32> = (1..=program.duration_weeks)
        .filter(|w| !counts.contains_key(w))
        .collect();
    if !missing.is_empty() {
        return Err(PublishBlocker::MissingWeeks { weeks: missing });
    }

    let unexpected: Vec<u32> = counts
        .keys()
        .copied()
        .filter(|w| *w == 0 || *w > program.duration_weeks)
        .collect();
    if !unexpected.is_empty() {
        return Err(PublishBlocker::UnexpectedWeeks { weeks: unexpected });
    }

    Ok(())
}

/// Fails with `ImmutableResource` unless the program is still a draft.
pub fn ensure_editable(program: &Program, resource: &'static str) -> CoreResult<()> {
    if program.is_draft() {
        Ok(())
    } else {
        tracing::warn!(program_id = %program.id, resource, "rejected edit of published program");
        Err(CoreError::ImmutableResource { resource })
    }
}

/// Fails with `InvalidState` unless participants may be attached to the program.
pub fn ensure_accepts_participants(program: &Program) -> CoreResult<()> {
    if program.is_published() {
        Ok(())
    } else {
        Err(CoreError::invalid_state(format!(
            "program {} is a draft; participants can only join published programs",
            program.id
        )))
    }
}

/// Fails with `InvalidState` if the program was already published.
pub fn ensure_not_published(program: &Program) -> CoreResult<()> {
    if program.is_published() {
        Err(CoreError::invalid_state(format!(
            "program {} is already published",
            program.id
        )))
    } else {
        Ok(())
    }
}
