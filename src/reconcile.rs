//! Works out why a student was (or wasn't) in class on a given day.
//!
//! An attendance record is labelled with the event that explains it, taken from
//! the first of these that applies:
//!
//! 1. the event the record itself points at, if the catalog still has it (or,
//!    if it was deleted, the event name the record copied when it was written);
//! 2. the first approved OD request of the same student whose date range contains
//!    the record's date, in the order the requests are given;
//! 3. otherwise `("Regular Class", "Classroom")`.
//!
//! Missing events are expected: the catalog, the OD ledger and the attendance
//! ledger are read independently and may disagree.

use crate::error::OdError;
use crate::models::{AttendanceRecord, AttendanceStatus, Event, OdRequest, OdStatus, User};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

pub const REGULAR_CLASS: &str = "Regular Class";
pub const CLASSROOM: &str = "Classroom";
pub const EVENT_VENUE: &str = "Event Venue";

/// Where a [`SessionLabel`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    /// The event the attendance record links to.
    RecordEvent,
    /// The event details copied onto the record, its event having been deleted.
    RecordSnapshot,
    /// An approved OD request covering the record's date.
    OdRequest,
    RegularClass,
}

/// The event name and venue shown next to an attendance record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLabel {
    pub event_name: String,
    pub venue: String,
    pub source: LabelSource,
}

impl SessionLabel {
    fn new(event_name: &str, venue: Option<&str>, source: LabelSource) -> Self {
        Self {
            event_name: event_name.to_string(),
            venue: non_blank(venue).unwrap_or(EVENT_VENUE).to_string(),
            source,
        }
    }

    pub fn regular_class() -> Self {
        Self {
            event_name: REGULAR_CLASS.to_string(),
            venue: CLASSROOM.to_string(),
            source: LabelSource::RegularClass,
        }
    }

    fn from_event(event: &Event, source: LabelSource) -> Self {
        Self::new(&event.name, event.venue.as_deref(), source)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Labels attendance records against a snapshot of the event catalog and OD ledger.
pub struct Reconciler<'a> {
    events: HashMap<&'a str, &'a Event>,
    by_name: HashMap<&'a str, &'a Event>,
    requests: &'a [OdRequest],
}

impl<'a> Reconciler<'a> {
    /// `requests` are searched in the order given; when two approved requests of the
    /// same student cover the same day, the earlier one in the slice wins.
    pub fn new(events: &'a [Event], requests: &'a [OdRequest]) -> Self {
        let mut by_name = HashMap::new();
        for event in events {
            by_name.entry(event.name.as_str()).or_insert(event);
        }

        Self {
            events: events.iter().map(|e| (e.id.as_str(), e)).collect(),
            by_name,
            requests,
        }
    }

    pub fn event(&self, id: &str) -> Option<&'a Event> {
        self.events.get(id).copied()
    }

    /// The first approved request of `student_email` that covers `date`.
    pub fn covering_request(&self, student_email: &str, date: NaiveDate) -> Option<&'a OdRequest> {
        let mut matches = self.requests.iter().filter(|request| {
            request.student_email == student_email
                && request.status == OdStatus::Approved
                && request.covers(date)
        });

        let first = matches.next()?;
        let others = matches.count();
        if others > 0 {
            debug!(
                student = student_email,
                %date,
                chosen = %first.id,
                others,
                "overlapping approved OD requests, using the first"
            );
        }

        Some(first)
    }

    pub fn label(&self, record: &AttendanceRecord) -> SessionLabel {
        if let Some(event_id) = record.event_id.as_deref() {
            if let Some(event) = self.event(event_id) {
                return SessionLabel::from_event(event, LabelSource::RecordEvent);
            }
            if let Some(name) = non_blank(record.event_name.as_deref()) {
                debug!(event_id, "attendance event missing, using the record's copy");
                return SessionLabel::new(
                    name,
                    record.event_venue.as_deref(),
                    LabelSource::RecordSnapshot,
                );
            }
        }

        self.covering_request(&record.student_email, record.date)
            .and_then(|request| self.label_for_request(request))
            .unwrap_or_else(SessionLabel::regular_class)
    }

    fn label_for_request(&self, request: &OdRequest) -> Option<SessionLabel> {
        if let Some(event) = request.event_id.as_deref().and_then(|id| self.event(id)) {
            return Some(SessionLabel::from_event(event, LabelSource::OdRequest));
        }

        let name = non_blank(Some(request.event_name.as_str()))?;
        // Only unlinked requests are matched to the catalog by name; a linked
        // request whose event is gone keeps the default venue.
        let venue = match request.event_id {
            None => self.by_name.get(name).and_then(|e| e.venue.as_deref()),
            Some(_) => None,
        };
        Some(SessionLabel::new(name, venue, LabelSource::OdRequest))
    }
}

/// An attendance record together with what it was for and the student's year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRecord {
    pub record: AttendanceRecord,
    pub label: SessionLabel,
    /// From the directory, `-` when the student is no longer listed.
    pub student_year: String,
}

/// Labels `records` and joins in each student's year from `students`.
///
/// The record's own copy of the student's name, department and section is kept
/// as is, even when the directory has since changed.
pub fn enrich(
    records: Vec<AttendanceRecord>,
    students: &[User],
    reconciler: &Reconciler<'_>,
) -> Vec<EnrichedRecord> {
    let years: HashMap<&str, &str> = students
        .iter()
        .map(|s| (s.email.as_str(), s.year.as_str()))
        .collect();

    records
        .into_iter()
        .map(|record| EnrichedRecord {
            label: reconciler.label(&record),
            student_year: years
                .get(record.student_email.as_str())
                .map(|y| y.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record,
        })
        .collect()
}

/// Head counts for a set of attendance records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    /// Share of present records, rounded to the nearest whole percent.
    pub percent_present: u32,
}

impl AttendanceStats {
    pub fn of<'r>(records: impl IntoIterator<Item = &'r AttendanceRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total += 1;
            match record.status {
                AttendanceStatus::Present => stats.present += 1,
                AttendanceStatus::Absent => stats.absent += 1,
            }
        }
        if stats.total > 0 {
            stats.percent_present =
                ((stats.present as f64 / stats.total as f64) * 100.0).round() as u32;
        }
        stats
    }
}

/// Finds `(student, date)` pairs that have more than one record.
///
/// Such duplicates can only come from writers that bypass the keyed upsert, e.g.
/// data copied in from elsewhere. They are reported rather than merged, since
/// there is no right answer when the duplicates disagree on status.
pub fn audit_duplicates(records: &[AttendanceRecord]) -> Vec<OdError> {
    let mut counts: HashMap<(&str, NaiveDate), usize> = HashMap::new();
    for record in records {
        *counts
            .entry((record.student_email.as_str(), record.date))
            .or_insert(0) += 1;
    }

    let mut anomalies: Vec<OdError> = counts
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|((email, date), count)| OdError::ConcurrencyAnomaly {
            student_email: email.to_string(),
            date,
            count,
        })
        .collect();
    anomalies.sort_by_key(|anomaly| anomaly.to_string());
    anomalies
}
