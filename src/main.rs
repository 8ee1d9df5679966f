use anyhow::{Context, Result, bail};
use clap::Parser;
use odzen::approval::Decision;
use odzen::cli::{self, Cli, Command};
use odzen::display;
use odzen::manager::OdManager;
use odzen::models::{NewAttachment, NewOdRequest, Principal};
use odzen::OdError;
use odzen::settings::Settings;
use odzen::store::RequestFilter;
use odzen::store::sqlite::SqliteStore;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load()?;
    odzen::init_tracing(&settings);

    let mut manager = OdManager::connect(&settings)
        .with_context(|| format!("failed to open {}", settings.database_url))?;

    let result = run(&mut manager, cli);
    if let Err(err) = &result {
        if err
            .downcast_ref::<OdError>()
            .is_some_and(OdError::is_retryable)
        {
            eprintln!("The database is busy or unavailable; try again shortly.");
        }
    }
    result
}

fn acting_as(manager: &mut OdManager<SqliteStore>, actor: Option<&str>) -> Result<Principal> {
    let Some(email) = actor else {
        bail!("this command needs `--as <email>`");
    };
    let principal = manager.principal(email)?;
    debug!(email = %principal.email, role = %principal.role, "acting as");
    Ok(principal)
}

fn run(manager: &mut OdManager<SqliteStore>, cli: Cli) -> Result<()> {
    let actor = cli.actor.as_deref();

    match cli.command {
        Command::ImportUsers { file, kind } => {
            let admin = acting_as(manager, actor)?;
            let reader = File::open(&file)
                .with_context(|| format!("failed to open {}", file.display()))?;
            let report = manager.import_users(&admin, reader, kind.into())?;

            println!("Imported {} users.", report.imported.len());
            for rejected in &report.rejected {
                println!("  skipped: {rejected}");
            }
        }
        Command::Users(args) => {
            let principal = acting_as(manager, actor)?;
            let users = manager.users(&principal, &args.into())?;
            println!("Users:\n{}", display::users_table(&users));
        }
        Command::DeleteUser { email } => {
            let admin = acting_as(manager, actor)?;
            manager.delete_user(&admin, &email)?;
            println!("Deleted user {email}.");
        }
        Command::CreateEvent(args) => {
            let creator = acting_as(manager, actor)?;
            let event = manager.create_event(&creator, args.into())?;
            println!("Created event `{}` with id {}.", event.name, event.id);
        }
        Command::Events => {
            let principal = acting_as(manager, actor)?;
            let events = manager.events(&principal)?;
            println!("Events:\n{}", display::events_table(&events));
        }
        Command::DeleteEvent { id } => {
            let principal = acting_as(manager, actor)?;
            manager.delete_event(&principal, &id)?;
            println!("Deleted event {id}.");
        }
        Command::SubmitOd(args) => {
            let student = acting_as(manager, actor)?;
            let attachment = match &args.attachment {
                Some(path) => Some(NewAttachment {
                    bytes: fs::read(path)
                        .with_context(|| format!("failed to read {}", path.display()))?,
                    mime_type: cli::mime_for(path).to_string(),
                    file_name: path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                }),
                None => None,
            };
            let request = manager.submit_request(
                &student,
                NewOdRequest {
                    event_id: args.event,
                    from_date: args.from,
                    to_date: args.to,
                    attachment,
                },
            )?;
            println!("Submitted OD request {} for {}.", request.id, request.event_name);
        }
        Command::Requests {
            student,
            status,
            event,
        } => {
            let principal = acting_as(manager, actor)?;
            let filter = RequestFilter {
                student_email: student,
                status,
                event_name: event,
                ..RequestFilter::default()
            };
            let requests = manager.requests(&principal, &filter)?;
            println!("OD requests:\n{}", display::requests_table(&requests));
        }
        Command::ShowAttachment { id, out } => {
            let principal = acting_as(manager, actor)?;
            let (attachment, bytes) = manager.attachment(&principal, &id)?;
            let out = match out {
                Some(path) => path,
                // Never let a stored name point outside the working directory.
                None => Path::new(&attachment.file_name)
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(format!("od-{id}"))),
            };
            fs::write(&out, &bytes)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Saved {} ({}, {} bytes) to {}.",
                attachment.file_name,
                attachment.mime_type,
                bytes.len(),
                out.display()
            );
        }
        Command::Approve { id } => {
            let teacher = acting_as(manager, actor)?;
            let request = manager.decide(&teacher, &id, Decision::Approve)?;
            println!("Approved OD for {} ({}).", request.student_name, request.event_name);
        }
        Command::Reject { id } => {
            let teacher = acting_as(manager, actor)?;
            let request = manager.decide(&teacher, &id, Decision::Reject)?;
            println!("Rejected OD for {} ({}).", request.student_name, request.event_name);
        }
        Command::Mark {
            status,
            date,
            student,
        } => {
            let principal = acting_as(manager, actor)?;
            let date = date.unwrap_or_else(|| manager.today());
            let record = match student {
                Some(email) => manager.update_status(&principal, &email, date, status)?,
                None => manager.mark_self(&principal, date, status)?,
            };
            println!("Marked {} {} on {}.", record.student_name, record.status, record.date);
        }
        Command::MarkAll(args) => {
            let teacher = acting_as(manager, actor)?;
            let outcome = manager.bulk_mark(&teacher, &args.into())?;
            println!(
                "{}: {} students matched, {} marked, {} already had a record.",
                outcome.date, outcome.matched, outcome.created, outcome.skipped
            );
        }
        Command::Attendance(args) => {
            let principal = acting_as(manager, actor)?;
            let records = manager.attendance_view(&principal, &args.into())?;
            display::show_attendance(&records);
        }
        Command::ActiveOd { filter, event } => {
            let principal = acting_as(manager, actor)?;
            let students = manager.active_od(&principal, &filter.into(), event.as_deref())?;
            println!("Students on OD:\n{}", display::users_table(&students));
        }
        Command::SetPassword { password } => {
            let principal = acting_as(manager, actor)?;
            manager.set_credentials(&principal, &password)?;
            println!("Password set for {}.", principal.email);
        }
        Command::Audit => {
            let principal = acting_as(manager, actor)?;
            let anomalies = manager.audit_attendance(&principal)?;
            if anomalies.is_empty() {
                println!("No duplicate attendance records.");
            }
            for anomaly in anomalies {
                println!("{anomaly}");
            }
        }
    }

    Ok(())
}
