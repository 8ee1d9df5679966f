use crate::error::{OdError, OdResult};
use crate::models::{
    Attachment, AttendanceRecord, CredentialState, Event, OdRequest, OdStatus, User,
};
use crate::schema::{attendance, events, od_requests, users};
use crate::store::{
    AttendanceLedger, DirectoryStore, EventCatalog, OdLedger, RecordFilter, RequestFilter,
    UserFilter,
};
use chrono::{NaiveDate, NaiveDateTime};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use std::time::Duration;
use tracing::debug;

/// Creates every table the store uses, leaving existing ones alone.
///
/// Keep in step with `crate::schema`.
pub const MIGRATIONS: &str = "
CREATE TABLE IF NOT EXISTS users (
    email TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    role TEXT NOT NULL,
    department TEXT NOT NULL,
    section TEXT NOT NULL,
    year TEXT NOT NULL,
    credential_state TEXT NOT NULL DEFAULT 'temporary'
);

CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    venue TEXT,
    organizer TEXT NOT NULL,
    from_date TIMESTAMP NOT NULL,
    to_date TIMESTAMP NOT NULL,
    created_by TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS od_requests (
    id TEXT PRIMARY KEY NOT NULL,
    student_email TEXT NOT NULL,
    student_name TEXT NOT NULL,
    student_department TEXT NOT NULL,
    student_section TEXT NOT NULL,
    event_id TEXT,
    event_name TEXT NOT NULL,
    from_date DATE NOT NULL,
    to_date DATE NOT NULL,
    attachment_data TEXT,
    attachment_mime TEXT,
    attachment_name TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TIMESTAMP NOT NULL,
    approved_by TEXT,
    approved_at TIMESTAMP,
    CHECK (from_date <= to_date)
);

CREATE INDEX IF NOT EXISTS od_requests_student ON od_requests (student_email);

CREATE TABLE IF NOT EXISTS attendance (
    student_email TEXT NOT NULL,
    date DATE NOT NULL,
    student_name TEXT NOT NULL,
    student_department TEXT NOT NULL,
    student_section TEXT NOT NULL,
    status TEXT NOT NULL,
    event_id TEXT,
    event_name TEXT,
    event_venue TEXT,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL,
    marked_by TEXT NOT NULL,
    PRIMARY KEY (student_email, date)
);
";

/// A [`Store`](crate::store::Store) backed by a `sqlite3` database.
pub struct SqliteStore {
    db: SqliteConnection,
}

impl SqliteStore {
    /// Opens the database at `database_url` (a path, or `:memory:`).
    ///
    /// Writers that find the database locked wait up to `busy_timeout` before
    /// failing with a retryable error.
    pub fn connect(database_url: &str, busy_timeout: Duration) -> OdResult<Self> {
        let mut db = SqliteConnection::establish(database_url)?;
        db.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            busy_timeout.as_millis()
        ))?;

        debug!(database_url, "connected to store");
        Ok(Self { db })
    }

    /// Opens a fresh database that only lives as long as the store.
    pub fn in_memory() -> OdResult<Self> {
        let mut store = Self::connect(":memory:", Duration::ZERO)?;
        store.run_migrations()?;
        Ok(store)
    }

    pub fn run_migrations(&mut self) -> OdResult<()> {
        self.db.batch_execute(MIGRATIONS)?;
        Ok(())
    }
}

/// How an [`OdRequest`] is laid out in the `od_requests` table.
#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = od_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct OdRequestRow {
    id: String,
    student_email: String,
    student_name: String,
    student_department: String,
    student_section: String,
    event_id: Option<String>,
    event_name: String,
    from_date: NaiveDate,
    to_date: NaiveDate,
    attachment_data: Option<String>,
    attachment_mime: Option<String>,
    attachment_name: Option<String>,
    status: OdStatus,
    created_at: NaiveDateTime,
    approved_by: Option<String>,
    approved_at: Option<NaiveDateTime>,
}

impl From<&OdRequest> for OdRequestRow {
    fn from(request: &OdRequest) -> Self {
        let attachment = request.attachment.as_ref();
        Self {
            id: request.id.clone(),
            student_email: request.student_email.clone(),
            student_name: request.student_name.clone(),
            student_department: request.student_department.clone(),
            student_section: request.student_section.clone(),
            event_id: request.event_id.clone(),
            event_name: request.event_name.clone(),
            from_date: request.from_date,
            to_date: request.to_date,
            attachment_data: attachment.map(|a| a.data.clone()),
            attachment_mime: attachment.map(|a| a.mime_type.clone()),
            attachment_name: attachment.map(|a| a.file_name.clone()),
            status: request.status,
            created_at: request.created_at,
            approved_by: request.approved_by.clone(),
            approved_at: request.approved_at,
        }
    }
}

impl From<OdRequestRow> for OdRequest {
    fn from(row: OdRequestRow) -> Self {
        let attachment = row.attachment_data.map(|data| Attachment {
            data,
            mime_type: row.attachment_mime.unwrap_or_default(),
            file_name: row.attachment_name.unwrap_or_default(),
        });

        Self {
            id: row.id,
            student_email: row.student_email,
            student_name: row.student_name,
            student_department: row.student_department,
            student_section: row.student_section,
            event_id: row.event_id,
            event_name: row.event_name,
            from_date: row.from_date,
            to_date: row.to_date,
            attachment,
            status: row.status,
            created_at: row.created_at,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
        }
    }
}

impl DirectoryStore for SqliteStore {
    fn get_user(&mut self, user_email: &str) -> OdResult<Option<User>> {
        users::table
            .find(user_email)
            .select(User::as_select())
            .first(&mut self.db)
            .optional()
            .map_err(Into::into)
    }

    fn list_users(&mut self, filter: &UserFilter) -> OdResult<Vec<User>> {
        let mut query = users::table.select(User::as_select()).into_boxed();

        if let Some(role) = filter.role {
            query = query.filter(users::role.eq(role));
        }
        if let Some(department) = filter.department.as_deref() {
            query = query.filter(users::department.eq(department));
        }
        if let Some(section) = filter.section.as_deref() {
            query = query.filter(users::section.eq(section));
        }
        if let Some(year) = filter.year.as_deref() {
            query = query.filter(users::year.eq(year));
        }

        query
            .order(users::name.asc())
            .load(&mut self.db)
            .map_err(Into::into)
    }

    fn upsert_user(&mut self, user: &User) -> OdResult<()> {
        diesel::replace_into(users::table)
            .values(user)
            .execute(&mut self.db)?;
        Ok(())
    }

    fn set_credential_state(&mut self, user_email: &str, state: CredentialState) -> OdResult<()> {
        let updated = diesel::update(users::table.find(user_email))
            .set(users::credential_state.eq(state))
            .execute(&mut self.db)?;

        if updated == 0 {
            return Err(OdError::not_found("user", user_email));
        }
        Ok(())
    }

    fn delete_user(&mut self, user_email: &str) -> OdResult<()> {
        let deleted = diesel::delete(users::table.find(user_email)).execute(&mut self.db)?;
        if deleted == 0 {
            return Err(OdError::not_found("user", user_email));
        }
        Ok(())
    }
}

impl EventCatalog for SqliteStore {
    fn create_event(&mut self, event: &Event) -> OdResult<String> {
        diesel::insert_into(events::table)
            .values(event)
            .execute(&mut self.db)?;
        Ok(event.id.clone())
    }

    fn get_event(&mut self, event_id: &str) -> OdResult<Option<Event>> {
        events::table
            .find(event_id)
            .select(Event::as_select())
            .first(&mut self.db)
            .optional()
            .map_err(Into::into)
    }

    fn list_events(&mut self) -> OdResult<Vec<Event>> {
        events::table
            .select(Event::as_select())
            .order((events::created_at.desc(), events::id.asc()))
            .load(&mut self.db)
            .map_err(Into::into)
    }

    fn delete_event(&mut self, event_id: &str) -> OdResult<()> {
        let deleted = diesel::delete(events::table.find(event_id)).execute(&mut self.db)?;
        if deleted == 0 {
            return Err(OdError::not_found("event", event_id));
        }
        Ok(())
    }
}

impl OdLedger for SqliteStore {
    fn create_request(&mut self, request: &OdRequest) -> OdResult<String> {
        diesel::insert_into(od_requests::table)
            .values(OdRequestRow::from(request))
            .execute(&mut self.db)?;
        Ok(request.id.clone())
    }

    fn get_request(&mut self, request_id: &str) -> OdResult<Option<OdRequest>> {
        let row = od_requests::table
            .find(request_id)
            .select(OdRequestRow::as_select())
            .first(&mut self.db)
            .optional()?;
        Ok(row.map(OdRequest::from))
    }

    fn list_requests(&mut self, filter: &RequestFilter) -> OdResult<Vec<OdRequest>> {
        let mut query = od_requests::table
            .select(OdRequestRow::as_select())
            .into_boxed();

        if let Some(email) = filter.student_email.as_deref() {
            query = query.filter(od_requests::student_email.eq(email));
        }
        if let Some(status) = filter.status {
            query = query.filter(od_requests::status.eq(status));
        }
        if let Some(event_name) = filter.event_name.as_deref() {
            query = query.filter(od_requests::event_name.eq(event_name));
        }
        if let Some(department) = filter.department.as_deref() {
            query = query.filter(od_requests::student_department.eq(department));
        }
        if let Some(section) = filter.section.as_deref() {
            query = query.filter(od_requests::student_section.eq(section));
        }

        let rows = query
            .order((od_requests::created_at.asc(), od_requests::id.asc()))
            .load(&mut self.db)?;
        Ok(rows.into_iter().map(OdRequest::from).collect())
    }

    fn set_status(
        &mut self,
        request_id: &str,
        new_status: OdStatus,
        actor: &str,
        at: NaiveDateTime,
    ) -> OdResult<bool> {
        // The status guard makes the decision a single compare-and-set, so two
        // teachers deciding the same request cannot both succeed.
        let updated = diesel::update(
            od_requests::table
                .filter(od_requests::id.eq(request_id))
                .filter(od_requests::status.eq(OdStatus::Pending)),
        )
        .set((
            od_requests::status.eq(new_status),
            od_requests::approved_by.eq(Some(actor)),
            od_requests::approved_at.eq(Some(at)),
        ))
        .execute(&mut self.db)?;

        Ok(updated == 1)
    }
}

impl AttendanceLedger for SqliteStore {
    fn find_record(
        &mut self,
        email: &str,
        on: NaiveDate,
    ) -> OdResult<Option<AttendanceRecord>> {
        attendance::table
            .find((email, on))
            .select(AttendanceRecord::as_select())
            .first(&mut self.db)
            .optional()
            .map_err(Into::into)
    }

    fn upsert_record(&mut self, record: &AttendanceRecord) -> OdResult<()> {
        // If the record already exists, this simply replaces it.
        diesel::replace_into(attendance::table)
            .values(record)
            .execute(&mut self.db)?;
        Ok(())
    }

    fn insert_missing(&mut self, records: &[AttendanceRecord]) -> OdResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        // Inserts every record, but if a record for that student and date already
        // exists, does nothing for it.
        diesel::insert_or_ignore_into(attendance::table)
            .values(records)
            .execute(&mut self.db)
            .map_err(Into::into)
    }

    fn list_records(&mut self, filter: &RecordFilter) -> OdResult<Vec<AttendanceRecord>> {
        let mut query = attendance::table
            .select(AttendanceRecord::as_select())
            .into_boxed();

        if let Some(email) = filter.student_email.as_deref() {
            query = query.filter(attendance::student_email.eq(email));
        }
        if let Some(on) = filter.date {
            query = query.filter(attendance::date.eq(on));
        }
        if let Some(department) = filter.department.as_deref() {
            query = query.filter(attendance::student_department.eq(department));
        }
        if let Some(section) = filter.section.as_deref() {
            query = query.filter(attendance::student_section.eq(section));
        }

        query
            .order((attendance::date.asc(), attendance::student_name.asc()))
            .load(&mut self.db)
            .map_err(Into::into)
    }
}
