use crate::models::{Event, OdRequest, User};
use crate::reconcile::{AttendanceStats, EnrichedRecord};
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct UserRow {
    email: String,
    name: String,
    role: String,
    department: String,
    section: String,
    year: String,
    credentials: String,
}

#[derive(Tabled)]
struct EventRow {
    id: String,
    name: String,
    venue: String,
    organizer: String,
    from: String,
    to: String,
}

#[derive(Tabled)]
struct RequestRow {
    id: String,
    student: String,
    department: String,
    section: String,
    event: String,
    from: String,
    to: String,
    status: String,
    decided_by: String,
    attachment: String,
}

#[derive(Tabled)]
struct AttendanceRow {
    date: String,
    student: String,
    year: String,
    department: String,
    section: String,
    status: String,
    event: String,
    venue: String,
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

/// Renders a list of rows in the house style.
fn render<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

pub fn users_table(users: &[User]) -> String {
    render(
        users
            .iter()
            .map(|user| UserRow {
                email: user.email.clone(),
                name: user.name.clone(),
                role: user.role.to_string(),
                department: user.department.clone(),
                section: user.section.clone(),
                year: user.year.clone(),
                credentials: user.credential_state.to_string(),
            })
            .collect(),
    )
}

pub fn events_table(events: &[Event]) -> String {
    render(
        events
            .iter()
            .map(|event| EventRow {
                id: event.id.clone(),
                name: event.name.clone(),
                venue: or_dash(event.venue.as_deref()),
                organizer: event.organizer.clone(),
                from: event.from_date.format("%Y-%m-%d %H:%M").to_string(),
                to: event.to_date.format("%Y-%m-%d %H:%M").to_string(),
            })
            .collect(),
    )
}

pub fn requests_table(requests: &[OdRequest]) -> String {
    render(
        requests
            .iter()
            .map(|request| RequestRow {
                id: request.id.clone(),
                student: request.student_name.clone(),
                department: request.student_department.clone(),
                section: request.student_section.clone(),
                event: request.event_name.clone(),
                from: request.from_date.to_string(),
                to: request.to_date.to_string(),
                status: request.status.to_string(),
                decided_by: or_dash(request.approved_by.as_deref()),
                attachment: or_dash(request.attachment.as_ref().map(|a| a.file_name.as_str())),
            })
            .collect(),
    )
}

/// The attendance table, labelled with the event or class behind each record.
pub fn attendance_table(records: &[EnrichedRecord]) -> String {
    render(
        records
            .iter()
            .map(|enriched| AttendanceRow {
                date: enriched.record.date.to_string(),
                student: enriched.record.student_name.clone(),
                year: enriched.student_year.clone(),
                department: enriched.record.student_department.clone(),
                section: enriched.record.student_section.clone(),
                status: enriched.record.status.to_string(),
                event: enriched.label.event_name.clone(),
                venue: enriched.label.venue.clone(),
            })
            .collect(),
    )
}

/// Pretty prints attendance records followed by their head counts.
pub fn show_attendance(records: &[EnrichedRecord]) {
    let stats = AttendanceStats::of(records.iter().map(|enriched| &enriched.record));

    println!("Attendance:\n{}", attendance_table(records));
    println!(
        "{} records: {} present, {} absent ({}% present)",
        stats.total, stats.present, stats.absent, stats.percent_present
    );
}
