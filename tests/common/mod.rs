#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use odzen::manager::OdManager;
use odzen::models::{CredentialState, Event, OdRequest, OdStatus, Principal, Role, User};
use odzen::store::Store;

/// 2024-03-10 09:00, the "now" of every test.
pub fn fixed_now() -> NaiveDateTime {
    day(10).and_hms_opt(9, 0, 0).unwrap()
}

/// A day of March 2024.
pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

pub fn user(email: &str, name: &str, role: Role, department: &str, section: &str) -> User {
    User {
        email: email.to_string(),
        name: name.to_string(),
        role,
        department: department.to_string(),
        section: section.to_string(),
        year: "2".to_string(),
        credential_state: CredentialState::Temporary,
    }
}

/// The people every scenario starts with.
pub struct Cast {
    pub admin: Principal,
    pub teacher: Principal,
    pub other_teacher: Principal,
    pub ana: Principal,
    pub ben: Principal,
    pub cy: Principal,
}

/// Seeds an admin, a CSE/A teacher, an ECE/B teacher and three CSE/A students.
pub fn seed<S: Store>(manager: &mut OdManager<S>) -> Cast {
    let users = [
        user("admin@college.edu", "Admin", Role::Admin, "", ""),
        user("t@college.edu", "Tara Iyer", Role::Teacher, "CSE", "A"),
        user("u@college.edu", "Umar Said", Role::Teacher, "ECE", "B"),
        user("ana@college.edu", "Ana Lima", Role::Student, "CSE", "A"),
        user("ben@college.edu", "Ben Okafor", Role::Student, "CSE", "A"),
        user("cy@college.edu", "Cy Park", Role::Student, "CSE", "A"),
    ];
    for u in &users {
        manager.store().upsert_user(u).unwrap();
    }

    let principal = |i: usize| Principal::from(&users[i]);
    Cast {
        admin: principal(0),
        teacher: principal(1),
        other_teacher: principal(2),
        ana: principal(3),
        ben: principal(4),
        cy: principal(5),
    }
}

/// An approved OD request of Ana's, not linked to any event.
pub fn approved(
    id: &str,
    event_name: &str,
    from: u32,
    to: u32,
    created_at: NaiveDateTime,
) -> OdRequest {
    OdRequest {
        id: id.to_string(),
        student_email: "ana@college.edu".to_string(),
        student_name: "Ana Lima".to_string(),
        student_department: "CSE".to_string(),
        student_section: "A".to_string(),
        event_id: None,
        event_name: event_name.to_string(),
        from_date: day(from),
        to_date: day(to),
        attachment: None,
        status: OdStatus::Approved,
        created_at,
        approved_by: Some("t@college.edu".to_string()),
        approved_at: Some(created_at),
    }
}

/// A one-day event created by the CSE/A teacher at `created_at`.
pub fn catalog_event(id: &str, name: &str, created_at: NaiveDateTime) -> Event {
    Event {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        venue: None,
        organizer: "t@college.edu".to_string(),
        from_date: day(12).and_hms_opt(9, 0, 0).unwrap(),
        to_date: day(12).and_hms_opt(17, 0, 0).unwrap(),
        created_by: "t@college.edu".to_string(),
        created_at,
    }
}
