//! Session availability gate.
//!
//! Whether a participant may open a session is derived from timestamps and
//! diary entries on every call. Nothing about unlocking is persisted.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::Enrollment;

/// Everything the gate needs to decide, gathered by the caller.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    /// The participant's in-progress enrollment in the session's program.
    pub enrollment: Option<&'a Enrollment>,
    pub week_number: u32,
    /// A diary entry exists for this session.
    pub journaled: bool,
    /// `Some(journaled)` when the previous week's session exists.
    pub previous_week_journaled: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability {
    Available,
    NotEnrolled,
    NotYetOpen { opens_at: DateTime<Utc> },
    Closed { closed_at: DateTime<Utc> },
    AlreadyJournaled,
    PreviousWeekPending { week: u32 },
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Available => "available".to_string(),
            Self::NotEnrolled => "no enrollment in progress for this program".to_string(),
            Self::NotYetOpen { opens_at } => format!("opens at {}", opens_at.to_rfc3339()),
            Self::Closed { closed_at } => format!("closed at {}", closed_at.to_rfc3339()),
            Self::AlreadyJournaled => "diary entry already written".to_string(),
            Self::PreviousWeekPending { week } => {
                format!("week {week} diary entry is still pending")
            }
        }
    }
}

/// The `[start, end]` window during which a week's session may be opened.
pub fn week_window(start_time: DateTime<Utc>, week_number: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = i64::from(week_number.saturating_sub(1));
    let window_start = start_time + Duration::weeks(offset);
    (window_start, window_start + Duration::weeks(1))
}

/// Applies the gate rules in order: enrollment, calendar window, own diary
/// entry, previous week's diary entry.
pub fn evaluate(input: &GateInput<'_>, now: DateTime<Utc>) -> Availability {
    let Some(enrollment) = input.enrollment.filter(|e| e.is_in_progress()) else {
        return Availability::NotEnrolled;
    };

    let (window_start, window_end) = week_window(enrollment.start_time, input.week_number);
    if now < window_start {
        return Availability::NotYetOpen {
            opens_at: window_start,
        };
    }
    if now > window_end {
        return Availability::Closed {
            closed_at: window_end,
        };
    }

    if input.journaled {
        return Availability::AlreadyJournaled;
    }

    if input.week_number > 1 && input.previous_week_journaled == Some(false) {
        return Availability::PreviousWeekPending {
            week: input.week_number - 1,
        };
    }

    Availability::Available
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;
    use crate::models::EnrollmentState;

    fn enrollment(state: EnrollmentState) -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            program_id: Uuid::new_v4(),
            participant_id: Uuid::new_v4(),
            state,
            start_time: Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
            end_time: None,
            completed_at: None,
        }
    }

    fn input(enrollment: Option<&Enrollment>, week_number: u32) -> GateInput<'_> {
        GateInput {
            enrollment,
            week_number,
            journaled: false,
            previous_week_journaled: if week_number > 1 { Some(false) } else { None },
        }
    }

    #[test]
    fn needs_in_progress_enrollment() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        assert_eq!(evaluate(&input(None, 1), t0), Availability::NotEnrolled);

        let abandoned = enrollment(EnrollmentState::Abandoned);
        assert_eq!(
            evaluate(&input(Some(&abandoned), 1), t0),
            Availability::NotEnrolled
        );
    }

    #[test]
    fn first_week_open_for_one_week_inclusive() {
        let e = enrollment(EnrollmentState::InProgress);
        let t0 = e.start_time;
        let gate = input(Some(&e), 1);

        assert!(evaluate(&gate, t0).is_available());
        assert!(evaluate(&gate, t0 + Duration::days(7)).is_available());
        assert_eq!(
            evaluate(&gate, t0 + Duration::days(7) + Duration::seconds(1)),
            Availability::Closed {
                closed_at: t0 + Duration::days(7)
            }
        );
        assert!(matches!(
            evaluate(&gate, t0 - Duration::seconds(1)),
            Availability::NotYetOpen { .. }
        ));
    }

    #[test]
    fn journaled_session_is_closed() {
        let e = enrollment(EnrollmentState::InProgress);
        let gate = GateInput {
            journaled: true,
            ..input(Some(&e), 1)
        };
        assert_eq!(evaluate(&gate, e.start_time), Availability::AlreadyJournaled);
    }

    #[test]
    fn later_weeks_wait_for_previous_diary() {
        let e = enrollment(EnrollmentState::InProgress);
        let in_week_two = e.start_time + Duration::days(8);

        let pending = input(Some(&e), 2);
        assert_eq!(
            evaluate(&pending, in_week_two),
            Availability::PreviousWeekPending { week: 1 }
        );

        let unlocked = GateInput {
            previous_week_journaled: Some(true),
            ..pending
        };
        assert!(evaluate(&unlocked, in_week_two).is_available());
        assert!(matches!(
            evaluate(&unlocked, e.start_time + Duration::days(6)),
            Availability::NotYetOpen { .. }
        ));
    }

    #[test]
    fn missing_previous_session_does_not_block() {
        let e = enrollment(EnrollmentState::InProgress);
        let gate = GateInput {
            previous_week_journaled: None,
            ..input(Some(&e), 3)
        };
        assert!(evaluate(&gate, e.start_time + Duration::days(15)).is_available());
    }
}
