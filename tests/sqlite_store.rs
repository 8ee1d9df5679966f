mod common;

use chrono::Duration;
use common::{approved, catalog_event, day, fixed_now, seed, user};
use odzen::approval::Decision;
use odzen::bulk::{self, BulkMark};
use odzen::manager::OdManager;
use odzen::models::{AttendanceStatus, NewAttachment, NewOdRequest, OdStatus, Role};
use odzen::settings::Settings;
use odzen::store::sqlite::SqliteStore;
use odzen::store::{
    AttendanceLedger, DirectoryStore, EventCatalog, OdLedger, RecordFilter, RequestFilter,
};
use tempfile::TempDir;

fn settings(dir: &TempDir) -> Settings {
    Settings {
        database_url: dir.path().join("od.sqlite3").to_string_lossy().into_owned(),
        ..Settings::default()
    }
}

fn open(settings: &Settings) -> OdManager<SqliteStore> {
    OdManager::connect(settings).unwrap().with_clock(fixed_now)
}

#[test]
fn bulk_mark_is_idempotent_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir);

    let mut manager = open(&settings);
    let cast = seed(&mut manager);
    manager
        .mark_self(&cast.ana, day(10), AttendanceStatus::Absent)
        .unwrap();

    let mark = BulkMark::new(AttendanceStatus::Present);
    let outcome = manager.bulk_mark(&cast.teacher, &mark).unwrap();
    assert_eq!((outcome.matched, outcome.created, outcome.skipped), (3, 2, 1));
    drop(manager);

    // A second process running the same bulk-mark changes nothing.
    let mut manager = open(&settings);
    let outcome = manager.bulk_mark(&cast.teacher, &mark).unwrap();
    assert_eq!(outcome.created, 0);

    let records = manager
        .store()
        .list_records(&RecordFilter::default())
        .unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].student_name, "Ana Lima");
    assert_eq!(records[0].status, AttendanceStatus::Absent);
}

#[test]
fn insert_missing_never_overwrites() {
    let mut store = SqliteStore::in_memory().unwrap();
    let ana = user("ana@college.edu", "Ana Lima", Role::Student, "CSE", "A");
    store.upsert_user(&ana).unwrap();

    let absent = bulk::new_record(
        &ana,
        day(4),
        AttendanceStatus::Absent,
        None,
        "ana@college.edu",
        fixed_now(),
    );
    store.upsert_record(&absent).unwrap();

    let mut present = absent.clone();
    present.status = AttendanceStatus::Present;
    assert_eq!(store.insert_missing(&[present.clone()]).unwrap(), 0);
    assert_eq!(
        store.find_record("ana@college.edu", day(4)).unwrap().unwrap().status,
        AttendanceStatus::Absent
    );

    store.upsert_record(&present).unwrap();
    assert_eq!(
        store.find_record("ana@college.edu", day(4)).unwrap(),
        Some(present)
    );
}

#[test]
fn status_update_only_applies_to_pending() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = open(&settings(&dir));
    let cast = seed(&mut manager);

    let submitted = manager
        .submit_request(
            &cast.ana,
            NewOdRequest {
                event_id: None,
                from_date: day(1),
                to_date: day(3),
                attachment: None,
            },
        )
        .unwrap();

    // Another teacher got there first.
    let store = manager.store();
    assert!(store
        .set_status(&submitted.id, OdStatus::Rejected, "u@college.edu", fixed_now())
        .unwrap());
    assert!(!store
        .set_status(&submitted.id, OdStatus::Approved, "t@college.edu", fixed_now())
        .unwrap());

    assert!(manager
        .decide(&cast.teacher, &submitted.id, Decision::Approve)
        .is_err());

    let requests = manager
        .requests(
            &cast.teacher,
            &RequestFilter {
                status: Some(OdStatus::Rejected),
                ..RequestFilter::default()
            },
        )
        .unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].approved_by.as_deref(), Some("u@college.edu"));
    assert_eq!(requests[0].from_date, day(1));
    assert_eq!(requests[0].created_at, fixed_now());
}

#[test]
fn inverted_ranges_are_refused_by_the_database() {
    let mut store = SqliteStore::in_memory().unwrap();
    let mut manager = OdManager::new(SqliteStore::in_memory().unwrap()).with_clock(fixed_now);
    let cast = seed(&mut manager);
    let mut request = manager
        .submit_request(
            &cast.ana,
            NewOdRequest {
                event_id: None,
                from_date: day(1),
                to_date: day(1),
                attachment: None,
            },
        )
        .unwrap();

    request.from_date = day(5);
    assert!(store.create_request(&request).is_err());
}

#[test]
fn attachments_survive_a_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir);
    let scan: Vec<u8> = (0..=255).collect();

    let mut manager = open(&settings);
    let cast = seed(&mut manager);
    let submitted = manager
        .submit_request(
            &cast.ana,
            NewOdRequest {
                event_id: None,
                from_date: day(2),
                to_date: day(2),
                attachment: Some(NewAttachment {
                    bytes: scan.clone(),
                    mime_type: "image/png".to_string(),
                    file_name: "scan.png".to_string(),
                }),
            },
        )
        .unwrap();
    drop(manager);

    let mut manager = open(&settings);
    let (attachment, bytes) = manager.attachment(&cast.teacher, &submitted.id).unwrap();
    assert_eq!(attachment.file_name, "scan.png");
    assert_eq!(attachment.mime_type, "image/png");
    assert_eq!(bytes, scan);
}

#[test]
fn ledger_and_catalog_order_ties_by_id() {
    let mut manager = OdManager::new(SqliteStore::in_memory().unwrap()).with_clock(fixed_now);
    let cast = seed(&mut manager);
    let earlier = fixed_now() - Duration::hours(1);

    let store = manager.store();
    store
        .create_request(&approved("b-expo", "Robotics Expo", 1, 5, fixed_now()))
        .unwrap();
    store
        .create_request(&approved("z-hack", "Hackathon", 3, 4, earlier))
        .unwrap();
    store
        .create_request(&approved("a-quiz", "Quiz Bowl", 3, 3, earlier))
        .unwrap();
    for (id, created_at) in [("c", earlier), ("b", fixed_now()), ("a", fixed_now())] {
        store
            .create_event(&catalog_event(id, "Seminar", created_at))
            .unwrap();
    }

    for d in [3, 4, 5] {
        manager
            .mark_self(&cast.ana, day(d), AttendanceStatus::Present)
            .unwrap();
    }
    let view = manager
        .attendance_view(&cast.teacher, &RecordFilter::default())
        .unwrap();
    let labels: Vec<&str> = view.iter().map(|r| r.label.event_name.as_str()).collect();
    assert_eq!(labels, ["Quiz Bowl", "Hackathon", "Robotics Expo"]);

    let ids: Vec<String> = manager
        .events(&cast.ana)
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, ["a", "b", "c"]);
}
