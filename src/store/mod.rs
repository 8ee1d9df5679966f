//! The collections the tracker reads and writes, independent of where they live.
//!
//! [`sqlite::SqliteStore`] keeps them in a SQLite database through diesel;
//! [`memory::MemoryStore`] keeps them in process, for tests and dry runs.

pub mod memory;
pub mod sqlite;

use crate::error::OdResult;
use crate::models::{AttendanceRecord, CredentialState, Event, OdRequest, OdStatus, Role, User};
use chrono::{NaiveDate, NaiveDateTime};

/// Selects users. Every field that is set must match; unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub department: Option<String>,
    pub section: Option<String>,
    pub year: Option<String>,
}

impl UserFilter {
    pub fn students() -> Self {
        Self {
            role: Some(Role::Student),
            ..Self::default()
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        self.role.is_none_or(|role| user.role == role)
            && matches_opt(&self.department, &user.department)
            && matches_opt(&self.section, &user.section)
            && matches_opt(&self.year, &user.year)
    }
}

/// Selects OD requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub student_email: Option<String>,
    pub status: Option<OdStatus>,
    /// Matches the event name copied onto the request.
    pub event_name: Option<String>,
    pub department: Option<String>,
    pub section: Option<String>,
}

impl RequestFilter {
    pub fn matches(&self, request: &OdRequest) -> bool {
        matches_opt(&self.student_email, &request.student_email)
            && self.status.is_none_or(|status| request.status == status)
            && matches_opt(&self.event_name, &request.event_name)
            && matches_opt(&self.department, &request.student_department)
            && matches_opt(&self.section, &request.student_section)
    }
}

/// Selects attendance records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub student_email: Option<String>,
    pub date: Option<NaiveDate>,
    pub department: Option<String>,
    pub section: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        matches_opt(&self.student_email, &record.student_email)
            && self.date.is_none_or(|date| record.date == date)
            && matches_opt(&self.department, &record.student_department)
            && matches_opt(&self.section, &record.student_section)
    }
}

fn matches_opt(wanted: &Option<String>, actual: &str) -> bool {
    wanted.as_deref().is_none_or(|wanted| wanted == actual)
}

/// The user directory.
pub trait DirectoryStore {
    fn get_user(&mut self, email: &str) -> OdResult<Option<User>>;

    /// Users matching `filter`, ordered by name.
    fn list_users(&mut self, filter: &UserFilter) -> OdResult<Vec<User>>;

    /// Creates the user, or replaces the user with the same email.
    fn upsert_user(&mut self, user: &User) -> OdResult<()>;

    fn set_credential_state(&mut self, email: &str, state: CredentialState) -> OdResult<()>;

    fn delete_user(&mut self, email: &str) -> OdResult<()>;
}

/// The event catalog.
pub trait EventCatalog {
    /// Stores `event` and returns its id.
    fn create_event(&mut self, event: &Event) -> OdResult<String>;

    fn get_event(&mut self, id: &str) -> OdResult<Option<Event>>;

    /// All events, newest first.
    fn list_events(&mut self) -> OdResult<Vec<Event>>;

    fn delete_event(&mut self, id: &str) -> OdResult<()>;
}

/// The OD request ledger.
pub trait OdLedger {
    /// Stores `request` and returns its id.
    fn create_request(&mut self, request: &OdRequest) -> OdResult<String>;

    fn get_request(&mut self, id: &str) -> OdResult<Option<OdRequest>>;

    /// Requests matching `filter` in ledger order: oldest first, ties broken by id.
    fn list_requests(&mut self, filter: &RequestFilter) -> OdResult<Vec<OdRequest>>;

    /// Moves a still-pending request to `status` and records who decided and when.
    ///
    /// Returns `false`, changing nothing, if no pending request has that id.
    fn set_status(
        &mut self,
        id: &str,
        status: OdStatus,
        actor: &str,
        at: NaiveDateTime,
    ) -> OdResult<bool>;
}

/// The attendance ledger, keyed by `(student_email, date)`.
pub trait AttendanceLedger {
    fn find_record(
        &mut self,
        student_email: &str,
        date: NaiveDate,
    ) -> OdResult<Option<AttendanceRecord>>;

    /// Writes `record`, replacing any record with the same key.
    fn upsert_record(&mut self, record: &AttendanceRecord) -> OdResult<()>;

    /// Writes each record whose key is not taken yet and leaves the others alone.
    ///
    /// Returns how many records were written.
    fn insert_missing(&mut self, records: &[AttendanceRecord]) -> OdResult<usize>;

    /// Records matching `filter`, ordered by date and then student name.
    fn list_records(&mut self, filter: &RecordFilter) -> OdResult<Vec<AttendanceRecord>>;
}

/// Everything the tracker needs from a backend.
pub trait Store: DirectoryStore + EventCatalog + OdLedger + AttendanceLedger {}

impl<T: DirectoryStore + EventCatalog + OdLedger + AttendanceLedger> Store for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(department: &str, section: &str, year: &str) -> User {
        User {
            email: "ana@college.edu".to_string(),
            name: "Ana".to_string(),
            role: Role::Student,
            department: department.to_string(),
            section: section.to_string(),
            year: year.to_string(),
            credential_state: CredentialState::Temporary,
        }
    }

    #[test]
    fn user_filter_is_and_composed() {
        let filter = UserFilter {
            department: Some("CSE".to_string()),
            section: Some("A".to_string()),
            ..UserFilter::students()
        };
        assert!(filter.matches(&user("CSE", "A", "2")));
        assert!(!filter.matches(&user("CSE", "B", "2")));
        assert!(!filter.matches(&user("ECE", "A", "2")));

        let mut teacher = user("CSE", "A", "2");
        teacher.role = Role::Teacher;
        assert!(!filter.matches(&teacher));
        assert!(UserFilter::default().matches(&teacher));
    }
}
