//! Which students are currently on OD.
//!
//! A student is on OD if any of their requests is still pending, or is approved
//! and has not yet ended. Everything here takes `today` as an argument so that it
//! can be evaluated for any day.

use crate::models::{OdRequest, OdStatus, User};
use crate::store::UserFilter;
use chrono::NaiveDate;

/// Whether `request` keeps its student on the active-OD roster on `today`.
pub fn is_active(request: &OdRequest, today: NaiveDate) -> bool {
    match request.status {
        OdStatus::Pending => true,
        OdStatus::Approved => request.to_date >= today,
        OdStatus::Rejected => false,
    }
}

/// Whether any of `requests` keeps the student on the active-OD roster on `today`.
///
/// The requests are assumed to belong to a single student.
pub fn has_active_od<'r>(
    requests: impl IntoIterator<Item = &'r OdRequest>,
    today: NaiveDate,
) -> bool {
    requests.into_iter().any(|request| is_active(request, today))
}

/// The students matching `filter` that are on OD on `today`, in the order given.
pub fn active_od_roster<'u>(
    students: &'u [User],
    requests: &[OdRequest],
    filter: &UserFilter,
    today: NaiveDate,
) -> Vec<&'u User> {
    students
        .iter()
        .filter(|student| filter.matches(student))
        .filter(|student| {
            let own = requests
                .iter()
                .filter(|request| request.student_email == student.email);
            has_active_od(own, today)
        })
        .collect()
}
