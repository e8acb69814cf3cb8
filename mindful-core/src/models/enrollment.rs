use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Program, SessionAvailability};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub program_id: Uuid,
    pub participant_id: Uuid,
    pub state: EnrollmentState,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    /// The stored end time, or `start_time + duration_weeks` when unset.
    pub fn effective_end_time(&self, duration_weeks: u32) -> DateTime<Utc> {
        self.end_time
            .unwrap_or_else(|| self.start_time + Duration::weeks(i64::from(duration_weeks)))
    }

    /// 1-based week the enrollment is in at `now`, if inside its span.
    pub fn current_week(&self, duration_weeks: u32, now: DateTime<Utc>) -> Option<u32> {
        if now < self.start_time || now > self.effective_end_time(duration_weeks) {
            return None;
        }
        let week = (now - self.start_time).num_weeks() + 1;
        Some((week as u32).min(duration_weeks.max(1)))
    }

    pub fn is_in_progress(&self) -> bool {
        self.state == EnrollmentState::InProgress
    }
}

/// Enrollment lifecycle. `Completed` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    InProgress,
    Completed,
    Abandoned,
}

impl EnrollmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// A participant's view of one enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentProgress {
    pub enrollment: Enrollment,
    pub program: Program,
    pub end_time: DateTime<Utc>,
    pub current_week: Option<u32>,
    pub journaled_sessions: usize,
    pub sessions: Vec<SessionAvailability>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn enrollment(start: DateTime<Utc>) -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            program_id: Uuid::new_v4(),
            participant_id: Uuid::new_v4(),
            state: EnrollmentState::InProgress,
            start_time: start,
            end_time: None,
            completed_at: None,
        }
    }

    #[test]
    fn end_time_defaults_to_program_duration() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let e = enrollment(start);
        assert_eq!(e.effective_end_time(4), start + Duration::weeks(4));

        let stamped = Enrollment {
            end_time: Some(start + Duration::days(3)),
            ..e
        };
        assert_eq!(stamped.effective_end_time(4), start + Duration::days(3));
    }

    #[test]
    fn current_week_counts_from_start() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let e = enrollment(start);
        assert_eq!(e.current_week(3, start), Some(1));
        assert_eq!(e.current_week(3, start + Duration::days(8)), Some(2));
        assert_eq!(e.current_week(3, start + Duration::weeks(3)), Some(3));
        assert_eq!(e.current_week(3, start + Duration::weeks(3) + Duration::seconds(1)), None);
        assert_eq!(e.current_week(3, start - Duration::seconds(1)), None);
    }
}
