use crate::approval::{self, Decision};
use crate::bulk::{self, BulkMark, BulkOutcome};
use crate::eligibility;
use crate::error::{OdError, OdResult, ValidationError};
use crate::models::{
    Attachment, AttendanceRecord, AttendanceStatus, CredentialState, Event, NewEvent,
    NewOdRequest, OdRequest, OdStatus, Principal, Role, User,
};
use crate::reconcile::{self, EnrichedRecord, Reconciler};
use crate::roster::{self, RosterKind};
use crate::settings::Settings;
use crate::store::sqlite::SqliteStore;
use crate::store::{RecordFilter, RequestFilter, Store, UserFilter};
use crate::validate;
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::io::Read;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where the manager gets the current time from.
pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Event name recorded on a request whose event could not be found.
pub const UNKNOWN_EVENT: &str = "Unknown Event";

/// Confines a listing to a teacher's department and section, where they have one.
fn narrow_to_teacher(
    actor: &Principal,
    department: &mut Option<String>,
    section: &mut Option<String>,
) {
    if actor.role != Role::Teacher {
        return;
    }
    if !actor.department.is_empty() {
        *department = Some(actor.department.clone());
    }
    if !actor.section.is_empty() {
        *section = Some(actor.section.clone());
    }
}

/// Refuses a teacher assigned to a department or section other than the student's.
fn check_teaches(actor: &Principal, department: &str, section: &str) -> OdResult<()> {
    let outside = |scope: &str, of_student: &str| !scope.is_empty() && scope != of_student;
    if actor.role == Role::Teacher
        && (outside(&actor.department, department) || outside(&actor.section, section))
    {
        return Err(OdError::Forbidden(format!(
            "{} does not teach {department} {section}",
            actor.email
        )));
    }
    Ok(())
}

/// Admins pass, anyone else must be a teacher.
fn require_staff(actor: &Principal) -> OdResult<()> {
    if actor.role == Role::Admin {
        return Ok(());
    }
    actor.require_role(Role::Teacher)
}

/// The result of importing a roster.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Emails of the users created or updated, in roster order.
    pub imported: Vec<String>,
    pub rejected: Vec<ValidationError>,
    /// Every email the roster named, including those on rejected rows.
    pub seen: Vec<String>,
}

/// The manager for events, OD requests and attendance.
///
/// Operations take the acting [`Principal`] and only show or change what it may.
pub struct OdManager<S> {
    store: S,
    clock: Clock,
    attachment_max_mb: usize,
}

impl OdManager<SqliteStore> {
    /// Connects to the database named in `settings`, creating its tables if needed.
    pub fn connect(settings: &Settings) -> OdResult<Self> {
        let mut store = SqliteStore::connect(&settings.database_url, settings.busy_timeout())?;
        store.run_migrations()?;

        Ok(Self::new(store).with_attachment_limit(settings.attachment_max_mb))
    }
}

impl<S: Store> OdManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: local_now,
            attachment_max_mb: validate::DEFAULT_ATTACHMENT_MAX_MB,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_attachment_limit(mut self, max_mb: usize) -> Self {
        self.attachment_max_mb = max_mb;
        self
    }

    pub fn store(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Looks up the user behind `email` to act as.
    pub fn principal(&mut self, email: &str) -> OdResult<Principal> {
        self.user(email).map(|user| Principal::from(&user))
    }

    pub fn user(&mut self, email: &str) -> OdResult<User> {
        let email = email.trim().to_lowercase();
        self.store
            .get_user(&email)?
            .ok_or_else(|| OdError::not_found("user", email))
    }

    /// Users matching `filter`. Students only ever see themselves and teachers
    /// only their own department and section.
    pub fn users(&mut self, actor: &Principal, filter: &UserFilter) -> OdResult<Vec<User>> {
        if actor.role == Role::Student {
            let me = self.user(&actor.email)?;
            return Ok(if filter.matches(&me) { vec![me] } else { Vec::new() });
        }

        let mut filter = filter.clone();
        narrow_to_teacher(actor, &mut filter.department, &mut filter.section);
        self.store.list_users(&filter)
    }

    /// Creates or updates every valid user of a CSV roster.
    pub fn import_users<R: Read>(
        &mut self,
        actor: &Principal,
        reader: R,
        kind: RosterKind,
    ) -> OdResult<ImportReport> {
        actor.require_role(Role::Admin)?;

        let parsed = roster::parse(reader, kind)?;
        let mut report = ImportReport {
            imported: Vec::with_capacity(parsed.users.len()),
            rejected: parsed.rejected,
            seen: parsed.emails,
        };

        for user in parsed.users {
            self.store.upsert_user(&user)?;
            report.imported.push(user.email);
        }

        info!(
            imported = report.imported.len(),
            rejected = report.rejected.len(),
            ?kind,
            "imported roster"
        );
        Ok(report)
    }

    /// Users of the roster's role that the roster never named. Rows that were
    /// rejected still count as naming their user.
    pub fn absent_from_roster(
        &mut self,
        actor: &Principal,
        kind: RosterKind,
        report: &ImportReport,
    ) -> OdResult<Vec<User>> {
        actor.require_role(Role::Admin)?;

        let filter = UserFilter {
            role: Some(kind.role()),
            ..UserFilter::default()
        };
        Ok(self
            .store
            .list_users(&filter)?
            .into_iter()
            .filter(|user| !report.seen.contains(&user.email))
            .collect())
    }

    /// Removes a user from the directory. Their requests and attendance keep the
    /// copies of their name, department and section.
    pub fn delete_user(&mut self, actor: &Principal, email: &str) -> OdResult<()> {
        actor.require_role(Role::Admin)?;
        let user = self.user(email)?;
        self.store.delete_user(&user.email)?;

        warn!(email = %user.email, by = %actor.email, "user deleted");
        Ok(())
    }

    /// Records that the acting user has replaced their temporary password.
    ///
    /// Checking the old password and storing the new one belong to the
    /// authentication provider; this only enforces strength and flips the flag.
    pub fn set_credentials(&mut self, actor: &Principal, new_password: &str) -> OdResult<()> {
        validate::password(new_password)?;
        let user = self.user(&actor.email)?;
        self.store
            .set_credential_state(&user.email, CredentialState::Set)?;

        info!(email = %user.email, "credentials set");
        Ok(())
    }

    pub fn create_event(&mut self, actor: &Principal, new: NewEvent) -> OdResult<Event> {
        require_staff(actor)?;

        let name = validate::required("name", &new.name)?.to_string();
        let from_date = new.from_date.ok_or(ValidationError::MissingField("from date"))?;
        let to_date = new.to_date.ok_or(ValidationError::MissingField("to date"))?;
        validate::date_range(&from_date, &to_date)?;

        let organizer = new
            .organizer
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(actor.email.as_str())
            .to_string();

        let event = Event {
            id: Uuid::new_v4().to_string(),
            name,
            description: new.description.filter(|d| !d.trim().is_empty()),
            venue: new.venue.filter(|v| !v.trim().is_empty()),
            organizer,
            from_date,
            to_date,
            created_by: actor.email.clone(),
            created_at: self.now(),
        };
        self.store.create_event(&event)?;

        info!(id = %event.id, name = %event.name, by = %actor.email, "event created");
        Ok(event)
    }

    /// All events, newest first. The catalog is open to every user.
    pub fn events(&mut self, actor: &Principal) -> OdResult<Vec<Event>> {
        debug!(by = %actor.email, "listing events");
        self.store.list_events()
    }

    /// Deletes an event. Only admins and the teacher who created it may do so.
    ///
    /// Requests and attendance that point at the event keep their copies of its
    /// name and are labelled from those afterwards.
    pub fn delete_event(&mut self, actor: &Principal, id: &str) -> OdResult<()> {
        let event = self
            .store
            .get_event(id)?
            .ok_or_else(|| OdError::not_found("event", id))?;

        let allowed = actor.role == Role::Admin
            || (actor.role == Role::Teacher && event.created_by == actor.email);
        if !allowed {
            return Err(OdError::Forbidden(format!(
                "{} may not delete event `{}`",
                actor.email, event.name
            )));
        }

        self.store.delete_event(id)?;
        info!(id, by = %actor.email, "event deleted");
        Ok(())
    }

    /// Files an OD request for the acting student.
    pub fn submit_request(&mut self, actor: &Principal, new: NewOdRequest) -> OdResult<OdRequest> {
        actor.require_role(Role::Student)?;
        validate::date_range(&new.from_date, &new.to_date)?;
        let attachment = new
            .attachment
            .as_ref()
            .map(|upload| validate::attachment(upload, self.attachment_max_mb))
            .transpose()?;

        let student = self.user(&actor.email)?;

        let event_name = match new.event_id.as_deref() {
            Some(event_id) => match self.store.get_event(event_id)? {
                Some(event) => event.name,
                None => {
                    debug!(event_id, "requested event not in catalog");
                    UNKNOWN_EVENT.to_string()
                }
            },
            None => UNKNOWN_EVENT.to_string(),
        };

        let request = OdRequest {
            id: Uuid::new_v4().to_string(),
            student_email: student.email,
            student_name: student.name,
            student_department: student.department,
            student_section: student.section,
            event_id: new.event_id,
            event_name,
            from_date: new.from_date,
            to_date: new.to_date,
            attachment,
            status: OdStatus::Pending,
            created_at: self.now(),
            approved_by: None,
            approved_at: None,
        };
        self.store.create_request(&request)?;

        info!(
            id = %request.id,
            student = %request.student_email,
            from = %request.from_date,
            to = %request.to_date,
            "OD request submitted"
        );
        Ok(request)
    }

    /// Requests matching `filter`, oldest first. Students only see their own
    /// requests and teachers those of their department and section.
    pub fn requests(
        &mut self,
        actor: &Principal,
        filter: &RequestFilter,
    ) -> OdResult<Vec<OdRequest>> {
        let mut filter = filter.clone();
        if actor.role == Role::Student {
            filter.student_email = Some(actor.email.clone());
        }
        narrow_to_teacher(actor, &mut filter.department, &mut filter.section);
        self.store.list_requests(&filter)
    }

    /// The attachment of a request, with its decoded contents.
    ///
    /// Readable by the student who filed the request, a teacher of that
    /// student and admins.
    pub fn attachment(
        &mut self,
        actor: &Principal,
        request_id: &str,
    ) -> OdResult<(Attachment, Vec<u8>)> {
        let request = self
            .store
            .get_request(request_id)?
            .ok_or_else(|| OdError::not_found("OD request", request_id))?;

        match actor.role {
            Role::Admin => {}
            Role::Teacher => {
                check_teaches(actor, &request.student_department, &request.student_section)?;
            }
            Role::Student if request.student_email == actor.email => {}
            Role::Student => {
                return Err(OdError::Forbidden(format!(
                    "{} may not read another student's attachment",
                    actor.email
                )));
            }
        }

        let attachment = request
            .attachment
            .ok_or_else(|| OdError::not_found("attachment", request_id))?;
        let bytes = attachment.decode()?;

        debug!(id = request_id, file = %attachment.file_name, by = %actor.email, "attachment read");
        Ok((attachment, bytes))
    }

    /// Approves or rejects a pending request.
    ///
    /// A teacher assigned to a department or section may only decide requests
    /// of students in it.
    pub fn decide(
        &mut self,
        actor: &Principal,
        request_id: &str,
        decision: Decision,
    ) -> OdResult<OdRequest> {
        actor.require_role(Role::Teacher)?;

        let mut request = self
            .store
            .get_request(request_id)?
            .ok_or_else(|| OdError::not_found("OD request", request_id))?;

        check_teaches(actor, &request.student_department, &request.student_section)?;

        let at = self.now();
        approval::decide(&mut request, decision, actor, at)?;

        let target = decision.target();
        if !self.store.set_status(request_id, target, &actor.email, at)? {
            // Someone else decided it between our read and write.
            let current = self
                .store
                .get_request(request_id)?
                .map(|r| r.status)
                .ok_or_else(|| OdError::not_found("OD request", request_id))?;
            return Err(OdError::InvalidTransition {
                from: current,
                to: target,
            });
        }

        info!(id = request_id, status = %target, by = %actor.email, "OD request decided");
        Ok(request)
    }

    /// Lets a student mark their own attendance for a day that is not in the
    /// future. An existing record for that day is updated in place.
    pub fn mark_self(
        &mut self,
        actor: &Principal,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> OdResult<AttendanceRecord> {
        actor.require_role(Role::Student)?;
        if date > self.today() {
            return Err(ValidationError::FutureDate(date).into());
        }

        let now = self.now();
        let record = match self.store.find_record(&actor.email, date)? {
            Some(mut existing) => {
                existing.status = status;
                existing.updated_at = now;
                existing.marked_by = actor.email.clone();
                existing
            }
            None => {
                let student = self.user(&actor.email)?;
                bulk::new_record(&student, date, status, None, &actor.email, now)
            }
        };
        self.store.upsert_record(&record)?;

        info!(key = %record.key(), %status, "attendance marked");
        Ok(record)
    }

    /// Changes the status of an existing record of a student the teacher teaches.
    pub fn update_status(
        &mut self,
        actor: &Principal,
        student_email: &str,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> OdResult<AttendanceRecord> {
        actor.require_role(Role::Teacher)?;

        let student_email = student_email.trim().to_lowercase();
        let mut record = self
            .store
            .find_record(&student_email, date)?
            .ok_or_else(|| {
                let key = AttendanceRecord::key_for(&student_email, date);
                OdError::not_found("attendance record", key)
            })?;
        check_teaches(actor, &record.student_department, &record.student_section)?;
        record.status = status;
        record.updated_at = self.now();
        record.marked_by = actor.email.clone();
        self.store.upsert_record(&record)?;

        info!(key = %record.key(), %status, by = %actor.email, "attendance updated");
        Ok(record)
    }

    /// Gives every selected student without a record for the day a record with
    /// the requested status. Existing records are never changed, so repeating
    /// the same bulk-mark has no further effect.
    pub fn bulk_mark(&mut self, actor: &Principal, mark: &BulkMark) -> OdResult<BulkOutcome> {
        actor.require_role(Role::Teacher)?;

        let date = mark.date.unwrap_or_else(|| self.today());
        let filter = UserFilter {
            role: Some(Role::Student),
            ..mark.filter.clone()
        };
        let students = self.store.list_users(&filter)?;

        let event = match &mark.event {
            Some(selector) => {
                let events = self.store.list_events()?;
                let found = bulk::select_event(&events, selector).cloned();
                if found.is_none() {
                    debug!(?selector, "bulk-mark event not found, marking without event");
                }
                found
            }
            None => None,
        };

        let records = bulk::plan(
            &students,
            date,
            mark.status,
            event.as_ref(),
            &actor.email,
            self.now(),
        );
        let created = self.store.insert_missing(&records)?;

        let outcome = BulkOutcome {
            date,
            matched: students.len(),
            created,
            skipped: students.len() - created,
        };
        info!(
            %date,
            status = %mark.status,
            matched = outcome.matched,
            created = outcome.created,
            skipped = outcome.skipped,
            by = %actor.email,
            "bulk attendance marked"
        );
        Ok(outcome)
    }

    /// Attendance records matching `filter`, each labelled with the event that
    /// explains it and ordered by date and student name.
    ///
    /// Students only see their own records and teachers those of their
    /// department and section.
    pub fn attendance_view(
        &mut self,
        actor: &Principal,
        filter: &RecordFilter,
    ) -> OdResult<Vec<EnrichedRecord>> {
        let mut filter = filter.clone();
        if actor.role == Role::Student {
            filter.student_email = Some(actor.email.clone());
        }
        narrow_to_teacher(actor, &mut filter.department, &mut filter.section);

        let records = self.store.list_records(&filter)?;
        for anomaly in reconcile::audit_duplicates(&records) {
            warn!(%anomaly, "duplicate attendance");
        }

        let events = self.store.list_events()?;
        let requests = self.store.list_requests(&RequestFilter {
            status: Some(OdStatus::Approved),
            ..RequestFilter::default()
        })?;
        let students = self.store.list_users(&UserFilter::students())?;

        let reconciler = Reconciler::new(&events, &requests);
        Ok(reconcile::enrich(records, &students, &reconciler))
    }

    /// Students currently on OD, within the acting teacher's department and
    /// section when they have one. With `event_name`, only students whose
    /// active request is for that event.
    pub fn active_od(
        &mut self,
        actor: &Principal,
        filter: &UserFilter,
        event_name: Option<&str>,
    ) -> OdResult<Vec<User>> {
        require_staff(actor)?;

        let mut filter = UserFilter {
            role: Some(Role::Student),
            ..filter.clone()
        };
        narrow_to_teacher(actor, &mut filter.department, &mut filter.section);

        let students = self.store.list_users(&filter)?;
        let requests = self.store.list_requests(&RequestFilter {
            event_name: event_name.map(str::to_string),
            ..RequestFilter::default()
        })?;
        let today = self.today();

        Ok(eligibility::active_od_roster(&students, &requests, &filter, today)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Reports every `(student, date)` with more than one attendance record,
    /// within a teacher's department and section.
    pub fn audit_attendance(&mut self, actor: &Principal) -> OdResult<Vec<OdError>> {
        require_staff(actor)?;

        let mut filter = RecordFilter::default();
        narrow_to_teacher(actor, &mut filter.department, &mut filter.section);
        let records = self.store.list_records(&filter)?;
        let anomalies = reconcile::audit_duplicates(&records);
        for anomaly in &anomalies {
            warn!(%anomaly, "duplicate attendance");
        }
        Ok(anomalies)
    }
}
