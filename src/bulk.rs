//! Bulk attendance marking.
//!
//! Bulk-marking fills gaps: every selected student without a record for the day
//! gets one, and existing records are left exactly as they are. Because the
//! ledger is keyed by `(student_email, date)` and the write is an
//! insert-if-absent, running the same bulk-mark twice (or twice at once) never
//! produces a second record for anyone.

use crate::models::{AttendanceRecord, AttendanceStatus, Event, User};
use crate::store::UserFilter;
use chrono::{NaiveDate, NaiveDateTime};

/// Picks the event a bulk-mark is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSelector {
    Id(String),
    /// Matches the first event in the catalog with exactly this name.
    Name(String),
}

/// A teacher's request to mark a group of students.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkMark {
    pub status: AttendanceStatus,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    pub filter: UserFilter,
    pub event: Option<EventSelector>,
}

impl BulkMark {
    pub fn new(status: AttendanceStatus) -> Self {
        Self {
            status,
            date: None,
            filter: UserFilter::students(),
            event: None,
        }
    }
}

/// What a bulk-mark did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOutcome {
    pub date: NaiveDate,
    /// Students selected by the filter.
    pub matched: usize,
    /// Records written.
    pub created: usize,
    /// Students who already had a record for the day.
    pub skipped: usize,
}

/// Builds a fresh record for `student` on `date`, copying the student's identity
/// and the event details onto it.
pub fn new_record(
    student: &User,
    date: NaiveDate,
    status: AttendanceStatus,
    event: Option<&Event>,
    marked_by: &str,
    now: NaiveDateTime,
) -> AttendanceRecord {
    AttendanceRecord {
        student_email: student.email.clone(),
        date,
        student_name: student.name.clone(),
        student_department: student.department.clone(),
        student_section: student.section.clone(),
        status,
        event_id: event.map(|e| e.id.clone()),
        event_name: event.map(|e| e.name.clone()),
        event_venue: event.and_then(|e| e.venue.clone()),
        created_at: now,
        updated_at: now,
        marked_by: marked_by.to_string(),
    }
}

/// The records a bulk-mark would write, one per student, before existing ones
/// are skipped by the ledger.
pub fn plan(
    students: &[User],
    date: NaiveDate,
    status: AttendanceStatus,
    event: Option<&Event>,
    marked_by: &str,
    now: NaiveDateTime,
) -> Vec<AttendanceRecord> {
    students
        .iter()
        .map(|student| new_record(student, date, status, event, marked_by, now))
        .collect()
}

/// Resolves `selector` against the catalog. `None` if nothing matches.
pub fn select_event<'e>(events: &'e [Event], selector: &EventSelector) -> Option<&'e Event> {
    match selector {
        EventSelector::Id(id) => events.iter().find(|e| &e.id == id),
        EventSelector::Name(name) => events.iter().find(|e| &e.name == name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CredentialState, Role};

    fn student(email: &str) -> User {
        User {
            email: email.to_string(),
            name: email.split('@').next().unwrap().to_string(),
            role: Role::Student,
            department: "CSE".to_string(),
            section: "A".to_string(),
            year: "2".to_string(),
            credential_state: CredentialState::Set,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    fn hackathon() -> Event {
        Event {
            id: "e1".to_string(),
            name: "Hackathon".to_string(),
            description: None,
            venue: Some("Lab 2".to_string()),
            organizer: "club@college.edu".to_string(),
            from_date: now(),
            to_date: now(),
            created_by: "t@college.edu".to_string(),
            created_at: now(),
        }
    }

    #[test]
    fn plan_denormalizes_student_and_event() {
        let students = vec![student("ana@college.edu"), student("ben@college.edu")];
        let event = hackathon();
        let records = plan(
            &students,
            now().date(),
            AttendanceStatus::Present,
            Some(&event),
            "t@college.edu",
            now(),
        );

        assert_eq!(records.len(), 2);
        let ana = &records[0];
        assert_eq!(ana.key(), "ana@college.edu/2024-03-10");
        assert_eq!(ana.student_name, "ana");
        assert_eq!(ana.student_department, "CSE");
        assert_eq!(ana.event_id.as_deref(), Some("e1"));
        assert_eq!(ana.event_name.as_deref(), Some("Hackathon"));
        assert_eq!(ana.event_venue.as_deref(), Some("Lab 2"));
        assert_eq!(ana.marked_by, "t@college.edu");
    }

    #[test]
    fn plan_without_event_leaves_event_fields_empty() {
        let records = plan(
            &[student("ana@college.edu")],
            now().date(),
            AttendanceStatus::Absent,
            None,
            "t@college.edu",
            now(),
        );
        assert_eq!(records[0].event_id, None);
        assert_eq!(records[0].event_name, None);
    }

    #[test]
    fn select_event_by_id_or_name() {
        let events = vec![hackathon()];
        assert!(select_event(&events, &EventSelector::Id("e1".to_string())).is_some());
        assert!(select_event(&events, &EventSelector::Name("Hackathon".to_string())).is_some());
        assert!(select_event(&events, &EventSelector::Name("hackathon".to_string())).is_none());
    }
}
