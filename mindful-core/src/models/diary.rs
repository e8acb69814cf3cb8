use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: Uuid,
    pub session_id: Uuid,
    pub participant_id: Uuid,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDiaryEntryInput {
    pub rating: u8,
    pub comment: Option<String>,
}

impl CreateDiaryEntryInput {
    pub fn validate(&self) -> CoreResult<()> {
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(CoreError::validation(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING}"
            )));
        }
        Ok(())
    }
}
