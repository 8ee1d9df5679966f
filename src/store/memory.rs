use crate::error::{OdError, OdResult};
use crate::models::{AttendanceRecord, CredentialState, Event, OdRequest, OdStatus, User};
use crate::store::{
    AttendanceLedger, DirectoryStore, EventCatalog, OdLedger, RecordFilter, RequestFilter,
    UserFilter,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// A [`Store`](crate::store::Store) that lives in process memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    users: BTreeMap<String, User>,
    events: Vec<Event>,
    requests: Vec<OdRequest>,
    attendance: BTreeMap<(String, NaiveDate), AttendanceRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DirectoryStore for MemoryStore {
    fn get_user(&mut self, email: &str) -> OdResult<Option<User>> {
        Ok(self.users.get(email).cloned())
    }

    fn list_users(&mut self, filter: &UserFilter) -> OdResult<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .values()
            .filter(|user| filter.matches(user))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    fn upsert_user(&mut self, user: &User) -> OdResult<()> {
        self.users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    fn set_credential_state(&mut self, email: &str, state: CredentialState) -> OdResult<()> {
        let user = self
            .users
            .get_mut(email)
            .ok_or_else(|| OdError::not_found("user", email))?;
        user.credential_state = state;
        Ok(())
    }

    fn delete_user(&mut self, email: &str) -> OdResult<()> {
        self.users
            .remove(email)
            .map(|_| ())
            .ok_or_else(|| OdError::not_found("user", email))
    }
}

impl EventCatalog for MemoryStore {
    fn create_event(&mut self, event: &Event) -> OdResult<String> {
        self.events.push(event.clone());
        Ok(event.id.clone())
    }

    fn get_event(&mut self, id: &str) -> OdResult<Option<Event>> {
        Ok(self.events.iter().find(|e| e.id == id).cloned())
    }

    fn list_events(&mut self) -> OdResult<Vec<Event>> {
        let mut events = self.events.clone();
        events.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(events)
    }

    fn delete_event(&mut self, id: &str) -> OdResult<()> {
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        if self.events.len() == before {
            return Err(OdError::not_found("event", id));
        }
        Ok(())
    }
}

impl OdLedger for MemoryStore {
    fn create_request(&mut self, request: &OdRequest) -> OdResult<String> {
        self.requests.push(request.clone());
        Ok(request.id.clone())
    }

    fn get_request(&mut self, id: &str) -> OdResult<Option<OdRequest>> {
        Ok(self.requests.iter().find(|r| r.id == id).cloned())
    }

    fn list_requests(&mut self, filter: &RequestFilter) -> OdResult<Vec<OdRequest>> {
        let mut requests: Vec<OdRequest> = self
            .requests
            .iter()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect();
        requests.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(requests)
    }

    fn set_status(
        &mut self,
        id: &str,
        status: OdStatus,
        actor: &str,
        at: NaiveDateTime,
    ) -> OdResult<bool> {
        match self
            .requests
            .iter_mut()
            .find(|r| r.id == id && r.status == OdStatus::Pending)
        {
            Some(request) => {
                request.status = status;
                request.approved_by = Some(actor.to_string());
                request.approved_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl AttendanceLedger for MemoryStore {
    fn find_record(
        &mut self,
        student_email: &str,
        date: NaiveDate,
    ) -> OdResult<Option<AttendanceRecord>> {
        Ok(self
            .attendance
            .get(&(student_email.to_string(), date))
            .cloned())
    }

    fn upsert_record(&mut self, record: &AttendanceRecord) -> OdResult<()> {
        self.attendance.insert(
            (record.student_email.clone(), record.date),
            record.clone(),
        );
        Ok(())
    }

    fn insert_missing(&mut self, records: &[AttendanceRecord]) -> OdResult<usize> {
        let mut inserted = 0;
        for record in records {
            if let Entry::Vacant(slot) = self
                .attendance
                .entry((record.student_email.clone(), record.date))
            {
                slot.insert(record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn list_records(&mut self, filter: &RecordFilter) -> OdResult<Vec<AttendanceRecord>> {
        let mut records: Vec<AttendanceRecord> = self
            .attendance
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| (a.date, &a.student_name).cmp(&(b.date, &b.student_name)));
        Ok(records)
    }
}
